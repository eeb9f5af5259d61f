use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use itertools::Itertools;
use regex::Regex;
use scraper::{Html, Selector};
use slog::Logger;

use super::{Extractor, MetadataRecord, ResolvedStream};
use crate::util::{check_response, Error, Result};

lazy_static! {
	static ref WATCH_LINK: Regex = Regex::new(r#"href="/watch\?v=([a-zA-Z0-9_-]{11})""#).unwrap();
	static ref PLAYER_CONFIG: Regex = Regex::new(r"ytInitialPlayerResponse\s*=\s*(\{.*?\});").unwrap();
	static ref PLAYER_SCRIPT_URL: Regex = Regex::new(r#""jsUrl":"([^"]+)""#).unwrap();
	static ref DESCRAMBLE_FN: Regex =
		Regex::new(r#"[a-zA-Z0-9$]{2,4}=function\(a\)\{a=a\.split\(""\);(.*?)return a\.join\(""\)\}"#).unwrap();
	static ref DESCRAMBLE_CALL: Regex = Regex::new(r#"([a-zA-Z0-9$]{2,4})\.([a-zA-Z0-9$]{2,4})\(a(?:,(\d+))?\)"#).unwrap();
	static ref HELPER_METHOD: Regex = Regex::new(r#"([a-zA-Z0-9$]{2,4}):function\(([^)]*)\)\{([^}]*)\}"#).unwrap();
}

/// Extracts metadata, search results and stream urls by scraping the
/// public watch and search result pages directly, without an API key.
pub struct ScrapeExtractor {
	client: reqwest::blocking::Client,
	/// Token-operation programs recovered from a player script, keyed by
	/// the script's url. Extraction requires fetching and parsing the
	/// (large, minified) script, so this is done at most once per script.
	cipher_cache: Mutex<HashMap<String, Vec<CipherOp>>>,
}

impl ScrapeExtractor {
	pub fn new() -> ScrapeExtractor {
		let client = reqwest::blocking::Client::builder()
			.timeout(Duration::from_secs(20))
			.build()
			.expect("failed to build http client");
		ScrapeExtractor {
			client,
			cipher_cache: Mutex::new(HashMap::new()),
		}
	}

	fn fetch(&self, log: &Logger, url: &str) -> Result<String> {
		let response = self.client.get(url).send()?;
		check_response(log, &response)?;
		Ok(response.text()?)
	}

	fn parse_player_response(html: &str) -> Result<serde_json::Value> {
		let captures = PLAYER_CONFIG
			.captures(html)
			.ok_or_else(|| Error::from("could not find player response in page"))?;
		let json = &captures[1];
		Ok(serde_json::from_str(json)?)
	}

	/// Applies the token-operation program recovered from `script_url` to
	/// `signature`, fetching and parsing the script on first use and
	/// memoizing the program for every later call with the same url.
	fn decipher_signature(&self, log: &Logger, script_url: &str, signature: &str) -> Result<String> {
		let cached = self.cipher_cache.lock().unwrap().get(script_url).cloned();
		let ops = match cached {
			Some(ops) => ops,
			None => {
				debug!(log, "fetching player script for signature cipher"; "script" => script_url);
				let script = self.fetch(log, script_url)?;
				let ops = parse_cipher_program(&script)?;
				self.cipher_cache.lock().unwrap().insert(script_url.to_string(), ops.clone());
				ops
			}
		};
		Ok(apply_cipher(&ops, signature))
	}
}

#[derive(Clone)]
struct Format {
	url:        String,
	encoding:   String,
	bitrate:    u64,
	audio_only: bool,
}

/// Picks the best audio-only format: best-bitrate vorbis, falling back to
/// worst-bitrate opus, falling back to any audio-only format.
fn select_format(formats: &[Format]) -> Option<&Format> {
	let audio_only: Vec<&Format> = formats.iter().filter(|f| f.audio_only).collect();

	if let Some(best) = audio_only
		.iter()
		.filter(|f| f.encoding == "vorbis")
		.sorted_by_key(|f| std::cmp::Reverse(f.bitrate))
		.next()
	{
		return Some(best);
	}

	if let Some(worst) = audio_only
		.iter()
		.filter(|f| f.encoding == "opus")
		.sorted_by_key(|f| f.bitrate)
		.next()
	{
		return Some(worst);
	}

	audio_only.into_iter().next()
}

/// A single token operation applied while descrambling a ciphered
/// signature: swap the first character with the one at an offset,
/// reverse the whole string, or drop a prefix of a given length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CipherOp {
	Swap(usize),
	Reverse,
	Splice(usize),
}

fn apply_cipher(ops: &[CipherOp], signature: &str) -> String {
	let mut chars: Vec<char> = signature.chars().collect();
	for op in ops {
		match *op {
			CipherOp::Reverse => chars.reverse(),
			CipherOp::Splice(n) => {
				let n = n.min(chars.len());
				chars.drain(0..n);
			}
			CipherOp::Swap(n) => {
				if !chars.is_empty() {
					let n = n % chars.len();
					chars.swap(0, n);
				}
			}
		}
	}
	chars.into_iter().collect()
}

/// Resolves the player-script url (`jsUrl`) embedded in a watch page, the
/// starting point for recovering that page's token-operation program.
fn extract_player_script_url(html: &str) -> Option<String> {
	let path = &PLAYER_SCRIPT_URL.captures(html)?[1];
	if path.starts_with("http") {
		Some(path.to_string())
	} else {
		Some(format!("https://www.youtube.com{}", path))
	}
}

/// Recovers the sequence of token operations a player script applies to
/// descramble a signature.
///
/// The script defines a small helper object of one-line functions (swap,
/// reverse, splice) and a descramble function that calls them in a fixed
/// order; we classify each helper by what its body does, then read off
/// the call order from the descramble function to get the program.
fn parse_cipher_program(script: &str) -> Result<Vec<CipherOp>> {
	let main_body = &DESCRAMBLE_FN
		.captures(script)
		.ok_or_else(|| Error::from("could not locate descramble function"))?[1];

	let object_name = &DESCRAMBLE_CALL
		.captures(main_body)
		.ok_or_else(|| Error::from("could not locate descramble helper object"))?[1];

	let object_src = extract_object_literal(script, object_name)?;
	let methods = classify_helper_methods(object_src);

	let mut ops = Vec::new();
	for call in DESCRAMBLE_CALL.captures_iter(main_body) {
		let method = &call[2];
		let arg: usize = call.get(3).and_then(|m| m.as_str().parse().ok()).unwrap_or(0);
		match methods.get(method) {
			Some(CipherOpKind::Reverse) => ops.push(CipherOp::Reverse),
			Some(CipherOpKind::Splice) => ops.push(CipherOp::Splice(arg)),
			Some(CipherOpKind::Swap) => ops.push(CipherOp::Swap(arg)),
			None => {}
		}
	}

	if ops.is_empty() {
		Err(Error::from("descramble program had no recognized operations"))
	} else {
		Ok(ops)
	}
}

fn extract_object_literal<'a>(script: &'a str, name: &str) -> Result<&'a str> {
	let marker = format!("var {}=", name);
	let start = script.find(&marker).ok_or_else(|| Error::from("descramble helper object not found"))? + marker.len();
	let rest = &script[start..];
	let end = rest.find("};").ok_or_else(|| Error::from("descramble helper object not terminated"))?;
	Ok(&rest[..end])
}

#[derive(Clone, Copy)]
enum CipherOpKind {
	Swap,
	Reverse,
	Splice,
}

fn classify_helper_methods(object_src: &str) -> HashMap<String, CipherOpKind> {
	let mut methods = HashMap::new();
	for capture in HELPER_METHOD.captures_iter(object_src) {
		let name = capture[1].to_string();
		let params = &capture[2];
		let body = &capture[3];
		let kind = if body.contains(".reverse(") {
			CipherOpKind::Reverse
		} else if body.contains(".splice(") {
			CipherOpKind::Splice
		} else if params.splitn(2, ',').count() == 2 && body.contains('%') {
			CipherOpKind::Swap
		} else {
			continue;
		};
		methods.insert(name, kind);
	}
	methods
}

/// Splits a `signatureCipher`/`cipher` query string into its `s` (ciphered
/// signature), `sp` (parameter name the deciphered signature is appended
/// as) and `url` (base stream url) fields.
fn parse_cipher_params(cipher: &str) -> HashMap<String, String> {
	cipher
		.split('&')
		.filter_map(|pair| {
			let mut parts = pair.splitn(2, '=');
			let key = parts.next()?;
			let value = parts.next().unwrap_or("");
			let value = percent_encoding::percent_decode_str(value).decode_utf8_lossy().into_owned();
			Some((key.to_string(), value))
		})
		.collect()
}

impl Extractor for ScrapeExtractor {
	fn name(&self) -> &'static str {
		"scrape"
	}

	fn metadata(&self, log: &Logger, id: &str) -> Result<MetadataRecord> {
		let url = format!("https://www.youtube.com/watch?v={}", id);
		let html = self.fetch(log, &url)?;
		let player = Self::parse_player_response(&html)?;

		let details = &player["videoDetails"];
		let title = details["title"]
			.as_str()
			.ok_or_else(|| Error::from("missing title in player response"))?;
		let duration_seconds: u64 = details["lengthSeconds"]
			.as_str()
			.and_then(|s| s.parse().ok())
			.unwrap_or(0);
		let thumbnail = details["thumbnail"]["thumbnails"]
			.as_array()
			.and_then(|list| list.last())
			.and_then(|t| t["url"].as_str())
			.unwrap_or("")
			.to_string();

		Ok(MetadataRecord::new(id, title, thumbnail, duration_seconds))
	}

	fn search(&self, log: &Logger, query: &str) -> Result<Vec<String>> {
		let url = format!(
			"https://www.youtube.com/results?search_query={}",
			percent_encoding::utf8_percent_encode(query, percent_encoding::NON_ALPHANUMERIC)
		);
		let html = self.fetch(log, &url)?;

		let mut seen = std::collections::HashSet::new();
		let mut ids = Vec::new();
		for captures in WATCH_LINK.captures_iter(&html) {
			let id = captures[1].to_string();
			if seen.insert(id.clone()) {
				ids.push(id);
				if ids.len() >= 10 {
					break;
				}
			}
		}

		if ids.is_empty() {
			Err(Error::from("no search results found in page"))
		} else {
			Ok(ids)
		}
	}

	fn resolve(&self, log: &Logger, id: &str) -> Result<ResolvedStream> {
		let url = format!("https://www.youtube.com/watch?v={}", id);
		let html = self.fetch(log, &url)?;
		let player = Self::parse_player_response(&html)?;
		let script_url = extract_player_script_url(&html);

		let duration_seconds: u64 = player["videoDetails"]["lengthSeconds"]
			.as_str()
			.and_then(|s| s.parse().ok())
			.unwrap_or(0);

		let empty = Vec::new();
		let adaptive = player["streamingData"]["adaptiveFormats"].as_array().unwrap_or(&empty);

		let formats: Vec<Format> = adaptive
			.iter()
			.filter_map(|f| {
				let mime = f["mimeType"].as_str()?;
				let audio_only = mime.starts_with("audio/");
				let encoding = if mime.contains("opus") {
					"opus"
				} else if mime.contains("vorbis") {
					"vorbis"
				} else {
					"unknown"
				};
				let bitrate = f["bitrate"].as_u64().unwrap_or(0);

				let url = if let Some(plain) = f["url"].as_str() {
					plain.to_string()
				} else {
					let cipher = f["signatureCipher"].as_str().or_else(|| f["cipher"].as_str())?;
					let params = parse_cipher_params(cipher);
					let base_url = params.get("url")?.clone();
					let signature = params.get("s")?;
					let sp = params.get("sp").cloned().unwrap_or_else(|| "signature".to_string());
					let script_url = script_url.as_ref()?;

					let deciphered = match self.decipher_signature(log, script_url, signature) {
						Ok(deciphered) => deciphered,
						Err(err) => {
							debug!(log, "could not decipher signature: {}", err; "id" => id);
							return None;
						}
					};

					let separator = if base_url.contains('?') { '&' } else { '?' };
					format!(
						"{}{}{}={}",
						base_url,
						separator,
						sp,
						percent_encoding::utf8_percent_encode(&deciphered, percent_encoding::NON_ALPHANUMERIC)
					)
				};

				Some(Format {
					url,
					encoding: encoding.to_string(),
					bitrate,
					audio_only,
				})
			})
			.collect();

		let format = select_format(&formats).ok_or_else(|| Error::from("no usable audio format"))?;

		debug!(log, "selected format"; "encoding" => &format.encoding, "bitrate" => format.bitrate);

		Ok(ResolvedStream {
			url:              format.url.clone(),
			extension:        if format.encoding == "opus" { "webm".to_string() } else { "ogg".to_string() },
			duration_seconds,
		})
	}
}

/// Parses a search results page into the set of distinct `/watch?v=` ids,
/// exposed separately for use by a selector-based scrape of the result
/// thumbnails and titles when the player response alone is insufficient.
#[allow(dead_code)]
fn thumbnail_urls(html: &str) -> Vec<String> {
	let document = Html::parse_document(html);
	let selector = Selector::parse("img").unwrap();
	document
		.select(&selector)
		.filter_map(|el| el.value().attr("src"))
		.map(|s| s.to_string())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_select_format_prefers_vorbis() {
		let formats = vec![
			Format {
				url:        "opus-url".to_string(),
				encoding:   "opus".to_string(),
				bitrate:    64_000,
				audio_only: true,
			},
			Format {
				url:        "vorbis-url".to_string(),
				encoding:   "vorbis".to_string(),
				bitrate:    128_000,
				audio_only: true,
			},
		];
		let best = select_format(&formats).unwrap();
		assert_eq!(best.url, "vorbis-url");
	}

	#[test]
	fn test_select_format_falls_back_to_worst_opus() {
		let formats = vec![
			Format {
				url:        "opus-hi".to_string(),
				encoding:   "opus".to_string(),
				bitrate:    160_000,
				audio_only: true,
			},
			Format {
				url:        "opus-lo".to_string(),
				encoding:   "opus".to_string(),
				bitrate:    48_000,
				audio_only: true,
			},
		];
		let best = select_format(&formats).unwrap();
		assert_eq!(best.url, "opus-lo");
	}

	#[test]
	fn test_select_format_ignores_video_only() {
		let formats = vec![Format {
			url:        "video-url".to_string(),
			encoding:   "avc1".to_string(),
			bitrate:    2_000_000,
			audio_only: false,
		}];
		assert!(select_format(&formats).is_none());
	}

	#[test]
	fn test_watch_link_regex() {
		let html = r#"<a href="/watch?v=dQw4w9WgXcQ">title</a>"#;
		let captures = WATCH_LINK.captures(html).unwrap();
		assert_eq!(&captures[1], "dQw4w9WgXcQ");
	}

	#[test]
	fn test_extract_player_script_url_resolves_relative_path() {
		let html = r#"{"jsUrl":"/s/player/abc123/player_ias.vflset/en_US/base.js"}"#;
		let url = extract_player_script_url(html).unwrap();
		assert_eq!(url, "https://www.youtube.com/s/player/abc123/player_ias.vflset/en_US/base.js");
	}

	const SAMPLE_PLAYER_SCRIPT: &str = r#"
		var Zx={
			aa:function(a){a.reverse()},
			bb:function(a,b){a.splice(0,b)},
			cc:function(a,b){var c=a[0];a[0]=a[b%a.length];a[b%a.length]=c}
		};
		yt.ii=function(a){a=a.split("");Zx.bb(a,2);Zx.aa(a);Zx.cc(a,3);return a.join("")};
	"#;

	#[test]
	fn test_parse_cipher_program_reads_call_order() {
		let ops = parse_cipher_program(SAMPLE_PLAYER_SCRIPT).unwrap();
		assert_eq!(ops, vec![CipherOp::Splice(2), CipherOp::Reverse, CipherOp::Swap(3)]);
	}

	#[test]
	fn test_apply_cipher_matches_reference_program() {
		let ops = parse_cipher_program(SAMPLE_PLAYER_SCRIPT).unwrap();
		// "ABCDEFGH" -splice(2)-> "CDEFGH" -reverse-> "HGFEDC" -swap(3)-> "EGFHDC"
		assert_eq!(apply_cipher(&ops, "ABCDEFGH"), "EGFHDC");
	}

	#[test]
	fn test_parse_cipher_params_decodes_query_string() {
		let params = parse_cipher_params("s=AB%3DCD&sp=signature&url=https%3A%2F%2Fexample.com%2Fstream");
		assert_eq!(params.get("s").unwrap(), "AB=CD");
		assert_eq!(params.get("sp").unwrap(), "signature");
		assert_eq!(params.get("url").unwrap(), "https://example.com/stream");
	}
}
