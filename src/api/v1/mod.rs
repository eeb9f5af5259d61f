//! Versioned JSON API. A successful call returns its own payload shape;
//! a failed call always returns the `{statuscode, path}` envelope with a
//! `404` status, matching the original error-code surface.

pub mod youtube;

use rocket::http::Status;
use rocket::response::{Responder, Response, Result as RocketResult};
use rocket::Request;
use rocket_contrib::json::Json;

pub mod codes {
	pub const OK: i32 = 0;
	pub const INVALID: i32 = 1;
	pub const FETCH_FAILED: i32 = 11;
	pub const SEARCH_FAILED: i32 = 12;
	pub const GET_FAILED: i32 = 13;
	pub const GET_INFO_FAILED: i32 = 14;
	pub const GET_CHARTS_FAILED: i32 = 15;
	pub const ADD_HISTORY_FAILED: i32 = 17;
}

#[derive(Serialize)]
pub struct StatusResponse {
	pub statuscode: i32,
	pub path:       String,
}

/// Either the handler's own success payload, or a failure code paired
/// with the request path that failed.
pub enum ApiResult<T> {
	Ok(T),
	Err(i32, String),
}

impl<T> ApiResult<T> {
	pub fn err(code: i32, path: impl Into<String>) -> ApiResult<T> {
		ApiResult::Err(code, path.into())
	}
}

impl<'r, T: serde::Serialize> Responder<'r> for ApiResult<T> {
	fn respond_to(self, request: &Request) -> RocketResult<'r> {
		match self {
			ApiResult::Ok(value) => Json(value).respond_to(request),
			ApiResult::Err(statuscode, path) => {
				let body = Json(StatusResponse { statuscode, path });
				Response::build_from(body.respond_to(request)?).status(Status::NotFound).ok()
			}
		}
	}
}
