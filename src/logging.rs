use slog::Logger;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::RawStr;
use rocket::request::{FromFormValue, FromParam, FromRequest, Outcome, State};
use rocket::{Data, Request, Response};

use crate::app::App;
use crate::util;

/// Wrapper for a [slog::Logger] usable as a `rocket` request guard.
pub struct RequestLog {
	log: Logger,
}

impl RequestLog {
	pub fn wrap(log: Logger) -> RequestLog {
		RequestLog { log }
	}
}

impl std::ops::Deref for RequestLog {
	type Target = Logger;

	fn deref(&self) -> &Self::Target {
		&self.log
	}
}

impl<'a, 'r> FromRequest<'a, 'r> for RequestLog {
	type Error = ();

	fn from_request(request: &'a Request<'r>) -> Outcome<Self, Self::Error> {
		let log = request.local_cache(|| -> Logger { panic!("request logger has not been registered") });
		Outcome::Success(RequestLog::wrap(log.clone()))
	}
}

/// Correlation id attached to every request and echoed as a response
/// header.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RequestId {
	uuid: uuid::Uuid,
}

impl RequestId {
	pub fn new() -> RequestId {
		use rand::Rng;
		use uuid::{Builder, Variant, Version};
		let rand = rand::thread_rng().gen();
		let uuid = Builder::from_bytes(rand)
			.set_variant(Variant::RFC4122)
			.set_version(Version::Random)
			.build();
		RequestId { uuid }
	}

	pub fn parse<S: AsRef<str>>(s: S) -> util::Result<RequestId> {
		let uuid = uuid::Uuid::parse_str(s.as_ref())?;
		Ok(RequestId { uuid })
	}

	pub fn nil() -> RequestId {
		RequestId { uuid: uuid::Uuid::nil() }
	}
}

impl std::fmt::Display for RequestId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.uuid.to_simple())
	}
}

impl<'a, 'r> FromRequest<'a, 'r> for RequestId {
	type Error = ();

	fn from_request(request: &'a Request<'r>) -> Outcome<Self, Self::Error> {
		Outcome::Success(*request.local_cache(RequestId::nil))
	}
}

impl<'v> FromFormValue<'v> for RequestId {
	type Error = &'v RawStr;

	fn from_form_value(form_value: &'v RawStr) -> std::result::Result<Self, Self::Error> {
		RequestId::parse(form_value).map_err(|_| form_value)
	}

	#[inline(always)]
	fn default() -> Option<Self> {
		None
	}
}

impl<'a> FromParam<'a> for RequestId {
	type Error = &'a RawStr;

	fn from_param(param: &'a RawStr) -> std::result::Result<Self, Self::Error> {
		RequestId::parse(param).map_err(|_| param)
	}
}

/// Fairing that attaches a per-request [slog::Logger] and sets the
/// `X-Request-Id`/`X-Response-Time` response headers.
#[derive(Copy, Clone)]
pub struct ServerLogger {}

impl Fairing for ServerLogger {
	fn info(&self) -> Info {
		Info {
			name: "Request Logger",
			kind: Kind::Request | Kind::Response,
		}
	}

	fn on_request(&self, request: &mut Request, _data: &Data) {
		let request_id = RequestId::new();
		let app: State<&'static App> = request.guard::<State<&App>>().unwrap();

		let target = format!(
			"{} {} ({})",
			request.method(),
			percent_encoding::percent_decode_str(&request.uri().to_string()).decode_utf8_lossy(),
			request_id,
		);

		let client = match request.client_ip() {
			Some(ip) => format!("{}", ip),
			None => String::from("unknown"),
		};

		request.local_cache(|| request_id);

		let logger = app.log.new(o!("client" => client, "target" => target));
		request.local_cache(|| logger);

		time!(t_request);
		request.local_cache(|| t_request);
	}

	fn on_response(&self, request: &Request, response: &mut Response) {
		time!(t_none);

		let request_id = request.guard::<RequestId>().unwrap();
		response.set_raw_header("X-Request-Id", format!("{}", request_id));

		let t_request = *request.local_cache(|| t_none);
		if t_request != t_none {
			response.set_raw_header("X-Response-Time", format!("{}", t_request));
		}

		let log = request.local_cache(|| -> Logger { panic!("request logger has not been registered") });
		debug!(log, "{} {} -> {}", request.method(), request.uri(), response.status());
	}
}
