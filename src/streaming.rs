//! HTTP range-request handling for the single binary streaming route.
//!
//! Three response shapes share one clamping algorithm: bytes held in
//! memory, a local file, and a reverse-proxied upstream response emitted
//! while a song is still downloading.

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::time::Duration;

use rocket::http::{ContentType, Status};
use rocket::response::{Responder, Response, Result as RocketResult};
use rocket::Request;

use crate::util::Result;

/// A parsed, clamped byte range, inclusive on both ends.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ByteRange {
	pub start: u64,
	pub end:   u64,
}

/// Parses a `Range: bytes=<start>-[<end>]` header against a known content
/// length, applying the clamping rules: an out-of-bounds start clamps to
/// the last byte; a missing or out-of-bounds end clamps to the last byte;
/// an end before start clamps up to start.
pub fn parse_range(header: &str, length: u64) -> Option<ByteRange> {
	let spec = header.strip_prefix("bytes=")?;
	let (start_str, end_str) = spec.split_once('-')?;

	if length == 0 {
		return Some(ByteRange { start: 0, end: 0 });
	}

	let mut start: u64 = start_str.parse().unwrap_or(0);
	if start >= length {
		start = length - 1;
	}

	let mut end: u64 = if end_str.is_empty() {
		length - 1
	} else {
		end_str.parse().unwrap_or(length - 1)
	};
	if end >= length {
		end = length - 1;
	}
	if end < start {
		end = start;
	}

	Some(ByteRange { start, end })
}

enum Source {
	File(File),
	Bytes(Vec<u8>),
}

/// A range-capable response over either an in-memory buffer or a file.
pub struct RangeResponse {
	source:       Source,
	length:       u64,
	range:        Option<ByteRange>,
	content_type: ContentType,
}

impl RangeResponse {
	pub fn from_file(mut file: File, range_header: Option<&str>, content_type: ContentType) -> Result<RangeResponse> {
		let length = file.metadata()?.len();
		let range = range_header.and_then(|h| parse_range(h, length));
		if let Some(r) = range {
			file.seek(SeekFrom::Start(r.start))?;
		}
		Ok(RangeResponse {
			source: Source::File(file),
			length,
			range,
			content_type,
		})
	}

	pub fn from_bytes(data: Vec<u8>, range_header: Option<&str>, content_type: ContentType) -> RangeResponse {
		let length = data.len() as u64;
		let range = range_header.and_then(|h| parse_range(h, length));
		RangeResponse {
			source: Source::Bytes(data),
			length,
			range,
			content_type,
		}
	}
}

impl<'r> Responder<'r> for RangeResponse {
	fn respond_to(self, _request: &Request) -> RocketResult<'r> {
		let mut builder = Response::build();
		builder.header(self.content_type);
		builder.raw_header("Accept-Ranges", "bytes");

		match self.range {
			Some(range) => {
				let size = range.end - range.start + 1;
				builder.status(Status::PartialContent);
				builder.raw_header("Content-Range", format!("bytes {}-{}/{}", range.start, range.end, self.length));
				builder.raw_header("Content-Length", size.to_string());
				match self.source {
					Source::File(file) => {
						builder.streamed_body(file.take(size));
					}
					Source::Bytes(data) => {
						let start = range.start as usize;
						let end = range.end as usize;
						builder.sized_body(Cursor::new(data[start..=end].to_vec()));
					}
				}
			}
			None => {
				builder.status(Status::Ok);
				builder.raw_header("Content-Length", self.length.to_string());
				match self.source {
					Source::File(file) => {
						builder.streamed_body(file);
					}
					Source::Bytes(data) => {
						builder.sized_body(Cursor::new(data));
					}
				}
			}
		}

		Ok(builder.finalize())
	}
}

/// Replays a client request to an upstream URL and pipes the response back
/// unchanged, used while a song is still `Downloading` and only the CDN
/// has a playable copy.
pub struct ForwardResponse {
	upstream: reqwest::blocking::Response,
}

impl ForwardResponse {
	pub fn fetch(method: &rocket::http::Method, url: &str, range_header: Option<&str>) -> Result<ForwardResponse> {
		let client = reqwest::blocking::Client::builder().timeout(Duration::from_secs(30)).build()?;

		let mut request = client.request(to_reqwest_method(method), url);
		if let Some(range) = range_header {
			request = request.header(reqwest::header::RANGE, range);
		}

		let upstream = request.send()?;
		Ok(ForwardResponse { upstream })
	}
}

fn to_reqwest_method(method: &rocket::http::Method) -> reqwest::Method {
	use rocket::http::Method::*;
	match method {
		Get => reqwest::Method::GET,
		Head => reqwest::Method::HEAD,
		Post => reqwest::Method::POST,
		Put => reqwest::Method::PUT,
		Delete => reqwest::Method::DELETE,
		Options => reqwest::Method::OPTIONS,
		Patch => reqwest::Method::PATCH,
		_ => reqwest::Method::GET,
	}
}

impl<'r> Responder<'r> for ForwardResponse {
	fn respond_to(self, _request: &Request) -> RocketResult<'r> {
		let status = self.upstream.status();
		let mut builder = Response::build();
		builder.status(Status::new(status.as_u16(), status.canonical_reason().unwrap_or("")));

		for (name, value) in self.upstream.headers() {
			if let Ok(value) = value.to_str() {
				builder.raw_header(name.to_string(), value.to_string());
			}
		}

		builder.streamed_body(self.upstream);
		Ok(builder.finalize())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_no_range_returns_none() {
		assert!(parse_range("not-a-range", 100).is_none());
	}

	#[test]
	fn test_single_byte_ranges() {
		let r = parse_range("bytes=0-0", 100).unwrap();
		assert_eq!(r, ByteRange { start: 0, end: 0 });

		let r = parse_range("bytes=99-", 100).unwrap();
		assert_eq!(r, ByteRange { start: 99, end: 99 });
	}

	#[test]
	fn test_out_of_bounds_start_clamps_to_last_byte() {
		let r = parse_range("bytes=105-", 100).unwrap();
		assert_eq!(r, ByteRange { start: 99, end: 99 });
	}

	#[test]
	fn test_end_before_start_clamps_to_start() {
		let r = parse_range("bytes=5-3", 100).unwrap();
		assert_eq!(r, ByteRange { start: 5, end: 5 });
	}

	#[test]
	fn test_open_ended_range_clamps_to_last_byte() {
		let r = parse_range("bytes=10-", 100).unwrap();
		assert_eq!(r, ByteRange { start: 10, end: 99 });
	}
}
