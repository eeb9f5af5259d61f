use std::time::Duration;

use slog::Logger;

use super::{Extractor, MetadataRecord};
use crate::util::{check_response, Error, Result};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Extracts metadata, search results and charts through the official
/// third-party JSON API. Requires an API key; construction is skipped
/// entirely by the caller when none is configured.
pub struct ApiExtractor {
	client: reqwest::blocking::Client,
	key:    String,
}

impl ApiExtractor {
	pub fn new(key: impl Into<String>) -> ApiExtractor {
		let client = reqwest::blocking::Client::builder()
			.timeout(Duration::from_secs(15))
			.build()
			.expect("failed to build http client");
		ApiExtractor { client, key: key.into() }
	}

	fn get_json(&self, log: &Logger, path: &str, query: &[(&str, &str)]) -> Result<serde_json::Value> {
		let mut request = self.client.get(&format!("{}/{}", API_BASE, path)).query(&[("key", self.key.as_str())]);
		request = request.query(query);
		let response = request.send()?;
		check_response(log, &response)?;
		Ok(response.json()?)
	}

	fn parse_video_item(item: &serde_json::Value) -> Option<MetadataRecord> {
		let id = item["id"].as_str()?.to_string();
		let snippet = &item["snippet"];
		let title = snippet["title"].as_str()?.to_string();
		let thumbnail = snippet["thumbnails"]["high"]["url"]
			.as_str()
			.or_else(|| snippet["thumbnails"]["default"]["url"].as_str())
			.unwrap_or("")
			.to_string();
		let duration = item["contentDetails"]["duration"].as_str().unwrap_or("PT0S");
		let duration_seconds = parse_iso8601_duration(duration);
		Some(MetadataRecord::new(id, title, thumbnail, duration_seconds))
	}
}

/// Parses a YouTube-style ISO-8601 duration (`PT4M13S`) into seconds.
fn parse_iso8601_duration(input: &str) -> u64 {
	let mut total: u64 = 0;
	let mut number = String::new();
	let mut in_time_part = false;

	for c in input.chars() {
		match c {
			'P' => continue,
			'T' => {
				in_time_part = true;
				continue;
			}
			'0'..='9' => number.push(c),
			'H' if in_time_part => {
				total += number.parse::<u64>().unwrap_or(0) * 3_600;
				number.clear();
			}
			'M' if in_time_part => {
				total += number.parse::<u64>().unwrap_or(0) * 60;
				number.clear();
			}
			'S' if in_time_part => {
				total += number.parse::<u64>().unwrap_or(0);
				number.clear();
			}
			_ => {
				number.clear();
			}
		}
	}

	total
}

impl Extractor for ApiExtractor {
	fn name(&self) -> &'static str {
		"api"
	}

	fn metadata(&self, log: &Logger, id: &str) -> Result<MetadataRecord> {
		let body = self.get_json(log, "videos", &[("part", "snippet,contentDetails"), ("id", id)])?;
		let items = body["items"].as_array().ok_or_else(|| Error::from("malformed api response"))?;
		let item = items.get(0).ok_or_else(|| Error::from("video not found"))?;
		Self::parse_video_item(item).ok_or_else(|| Error::from("malformed video item"))
	}

	fn search(&self, log: &Logger, query: &str) -> Result<Vec<String>> {
		let body = self.get_json(
			log,
			"search",
			&[("part", "id"), ("q", query), ("type", "video"), ("maxResults", "10")],
		)?;
		let items = body["items"].as_array().ok_or_else(|| Error::from("malformed api response"))?;
		let ids: Vec<String> = items.iter().filter_map(|item| item["id"]["videoId"].as_str()).map(String::from).collect();
		if ids.is_empty() {
			Err(Error::from("no search results from api"))
		} else {
			Ok(ids)
		}
	}

	fn charts(&self, log: &Logger) -> Result<Vec<String>> {
		let body = self.get_json(
			log,
			"videos",
			&[("part", "id"), ("chart", "mostPopular"), ("maxResults", "25")],
		)?;
		let items = body["items"].as_array().ok_or_else(|| Error::from("malformed api response"))?;
		let ids: Vec<String> = items.iter().filter_map(|item| item["id"].as_str()).map(String::from).collect();
		if ids.is_empty() {
			Err(Error::from("no chart results from api"))
		} else {
			Ok(ids)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_iso8601_duration() {
		assert_eq!(parse_iso8601_duration("PT4M13S"), 253);
		assert_eq!(parse_iso8601_duration("PT1H2M3S"), 3_723);
		assert_eq!(parse_iso8601_duration("PT30S"), 30);
		assert_eq!(parse_iso8601_duration("PT0S"), 0);
	}
}
