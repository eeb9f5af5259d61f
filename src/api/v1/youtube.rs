use std::fs::File;

use rocket::http::{ContentType, RawStr};
use rocket::request::{FromRequest, Outcome};
use rocket::{Request, State};
use rocket_contrib::json::Json;

use crate::app::App;
use crate::logging::RequestLog;
use crate::streaming::{ForwardResponse, RangeResponse};

use super::{codes, ApiResult};

#[derive(Deserialize)]
pub struct FetchRequest {
	apikey:     String,
	id:         String,
	addhistory: Option<bool>,
}

#[derive(Serialize)]
struct FetchBody {
	url: String,
}

/// Carries the fetch response body plus the `ytfetcher-id` header that
/// hands the client its opaque token.
struct FetchSuccess {
	url:   String,
	token: Option<String>,
}

impl<'r> rocket::response::Responder<'r> for FetchSuccess {
	fn respond_to(self, request: &Request) -> rocket::response::Result<'r> {
		let mut response = Json(FetchBody { url: self.url }).respond_to(request)?;
		if let Some(token) = self.token {
			response.set_raw_header("ytfetcher-id", token);
		}
		Ok(response)
	}
}

#[post("/fetch", data = "<input>")]
pub fn fetch(log: RequestLog, input: Json<FetchRequest>, app: State<&App>) -> Result<FetchSuccess, ApiResult<()>> {
	if !app.users.is_verified(&input.apikey) {
		return Err(ApiResult::err(codes::INVALID, "/api/v1/youtube/fetch"));
	}

	match app.youtube.fetch(&input.id) {
		Ok(outcome) => {
			if input.addhistory.unwrap_or(false) {
				if let Err(err) = app.history.append(&input.apikey, &input.id) {
					warn!(log, "failed to append fetch history: {}", err);
				}
			}
			Ok(match outcome {
				crate::youtube::FetchOutcome::Ready(token) => FetchSuccess {
					url:   token.clone(),
					token: Some(token),
				},
				crate::youtube::FetchOutcome::Proxy(url) => FetchSuccess { url, token: None },
			})
		}
		Err(err) => {
			warn!(log, "fetch failed: {}", err; "id" => &input.id);
			Err(ApiResult::err(codes::FETCH_FAILED, "/api/v1/youtube/fetch"))
		}
	}
}

#[derive(Deserialize)]
pub struct SearchRequest {
	apikey:      String,
	searchquery: String,
}

#[post("/search", data = "<input>")]
pub fn search(
	log: RequestLog,
	input: Json<SearchRequest>,
	app: State<&App>,
) -> Result<Json<Vec<crate::youtube::extractor::MetadataRecord>>, ApiResult<()>> {
	if !app.users.is_verified(&input.apikey) {
		return Err(ApiResult::err(codes::INVALID, "/api/v1/youtube/search"));
	}

	app.youtube.search(&input.searchquery).map(Json).map_err(|err| {
		warn!(log, "search failed: {}", err; "query" => &input.searchquery);
		ApiResult::err(codes::SEARCH_FAILED, "/api/v1/youtube/search")
	})
}

#[derive(Deserialize)]
pub struct GetInfoRequest {
	apikey: String,
	id:     String,
}

#[post("/getinfo", data = "<input>")]
pub fn get_info(
	log: RequestLog,
	input: Json<GetInfoRequest>,
	app: State<&App>,
) -> Result<Json<crate::youtube::extractor::MetadataRecord>, ApiResult<()>> {
	if !app.users.is_verified(&input.apikey) {
		return Err(ApiResult::err(codes::INVALID, "/api/v1/youtube/getinfo"));
	}

	app.youtube.get_info(&input.id).map(Json).map_err(|err| {
		warn!(log, "getinfo failed: {}", err; "id" => &input.id);
		ApiResult::err(codes::GET_INFO_FAILED, "/api/v1/youtube/getinfo")
	})
}

#[derive(Deserialize)]
pub struct GetChartsRequest {
	apikey: String,
}

#[post("/getcharts", data = "<input>")]
pub fn get_charts(
	log: RequestLog,
	input: Json<GetChartsRequest>,
	app: State<&App>,
) -> Result<Json<Vec<crate::youtube::extractor::MetadataRecord>>, ApiResult<()>> {
	if !app.users.is_verified(&input.apikey) {
		return Err(ApiResult::err(codes::INVALID, "/api/v1/youtube/getcharts"));
	}

	app.youtube.get_charts().map(Json).map_err(|err| {
		warn!(log, "getcharts failed: {}", err);
		ApiResult::err(codes::GET_CHARTS_FAILED, "/api/v1/youtube/getcharts")
	})
}

/// Request guard for the raw `Range` header, absent on most clients'
/// first request for a resource.
pub struct RangeHeader(pub Option<String>);

impl<'a, 'r> FromRequest<'a, 'r> for RangeHeader {
	type Error = ();

	fn from_request(request: &'a Request<'r>) -> Outcome<Self, Self::Error> {
		Outcome::Success(RangeHeader(request.headers().get_one("Range").map(String::from)))
	}
}

pub enum SongResponse {
	Range(RangeResponse),
	Forward(ForwardResponse),
	NotFound,
}

impl<'r> rocket::response::Responder<'r> for SongResponse {
	fn respond_to(self, request: &Request) -> rocket::response::Result<'r> {
		match self {
			SongResponse::Range(r) => r.respond_to(request),
			SongResponse::Forward(r) => r.respond_to(request),
			SongResponse::NotFound => ApiResult::<()>::err(codes::GET_FAILED, "/api/v1/youtube/get").respond_to(request),
		}
	}
}

/// Upstream hostname substring that selects the forward-proxy path
/// instead of local file serving.
const UPSTREAM_CDN_HINT: &str = "googlevideo";

#[get("/get?<id>&<url>")]
pub fn get(log: RequestLog, id: &RawStr, url: Option<String>, range: RangeHeader, app: State<&App>) -> SongResponse {
	if let Some(url) = &url {
		if url.contains(UPSTREAM_CDN_HINT) {
			return match ForwardResponse::fetch(&rocket::http::Method::Get, url, range.0.as_deref()) {
				Ok(response) => SongResponse::Forward(response),
				Err(err) => {
					warn!(log, "forward failed: {}", err; "url" => url);
					SongResponse::NotFound
				}
			};
		}
	}

	let token = id.percent_decode_lossy().into_owned();
	let song = match app.youtube.get_song(&token) {
		Ok(song) => song,
		Err(err) => {
			debug!(log, "get failed: {}", err; "token" => &token);
			return SongResponse::NotFound;
		}
	};

	let reader = match song.open_reader() {
		Ok(reader) => reader,
		Err(err) => {
			debug!(log, "song not ready: {}", err; "id" => &song.id);
			return SongResponse::NotFound;
		}
	};

	let content_type = match reader.path.extension().and_then(|e| e.to_str()) {
		Some("webm") => ContentType::new("audio", "webm"),
		Some("opus") => ContentType::new("audio", "opus"),
		_ => ContentType::new("audio", "ogg"),
	};

	let file = match File::open(&reader.path) {
		Ok(file) => file,
		Err(err) => {
			warn!(log, "failed to open cached file: {}", err);
			return SongResponse::NotFound;
		}
	};

	match RangeResponse::from_file(file, range.0.as_deref(), content_type) {
		Ok(response) => SongResponse::Range(response),
		Err(err) => {
			warn!(log, "failed to build range response: {}", err);
			SongResponse::NotFound
		}
	}
}
