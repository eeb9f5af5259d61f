use std::path::{Path, PathBuf};
use std::process::Command;

use slog::Logger;

use super::{Extractor, MetadataRecord, ResolvedStream};
use crate::util::Error;
use crate::util::Result;

/// Extracts metadata, search results and audio by shelling out to an
/// external extractor binary (and, for the final download, an external
/// muxer) rather than talking HTTP directly.
///
/// This is the last resort in the fallback chain: it is also the only
/// backend that actually writes the cached audio file to disk.
pub struct SubprocessExtractor {
	extractor_bin: PathBuf,
	muxer_bin:     PathBuf,
}

impl SubprocessExtractor {
	pub fn new(extractor_bin: impl Into<PathBuf>, muxer_bin: impl Into<PathBuf>) -> SubprocessExtractor {
		SubprocessExtractor {
			extractor_bin: extractor_bin.into(),
			muxer_bin:     muxer_bin.into(),
		}
	}

	fn run_json(&self, log: &Logger, args: &[&str]) -> Result<serde_json::Value> {
		let output = Command::new(&self.extractor_bin).args(args).output()?;
		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(Error::from(format!("extractor exited with {}: {}", output.status, stderr)));
		}
		let stdout = String::from_utf8_lossy(&output.stdout);
		debug!(log, "extractor subprocess output"; "bytes" => stdout.len());
		let line = stdout.lines().next().ok_or_else(|| Error::from("extractor produced no output"))?;
		Ok(serde_json::from_str(line)?)
	}

	fn parse_metadata(value: &serde_json::Value) -> Result<MetadataRecord> {
		let id = value["id"].as_str().ok_or_else(|| Error::from("missing id"))?;
		let title = value["title"].as_str().unwrap_or("");
		let thumbnail = value["thumbnail"].as_str().unwrap_or("");
		let duration_seconds = value["duration"].as_u64().unwrap_or(0);
		Ok(MetadataRecord::new(id, title, thumbnail, duration_seconds))
	}
}

impl Extractor for SubprocessExtractor {
	fn name(&self) -> &'static str {
		"subprocess"
	}

	fn metadata(&self, log: &Logger, id: &str) -> Result<MetadataRecord> {
		let value = self.run_json(log, &["-j", id])?;
		Self::parse_metadata(&value)
	}

	fn search(&self, log: &Logger, query: &str) -> Result<Vec<String>> {
		let pattern = format!("ytsearch10:{}", query);
		let output = Command::new(&self.extractor_bin).args(&["-j", &pattern]).output()?;
		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(Error::from(format!("extractor exited with {}: {}", output.status, stderr)));
		}
		let stdout = String::from_utf8_lossy(&output.stdout);
		let mut ids = Vec::new();
		for line in stdout.lines() {
			if let Ok(value) = serde_json::from_str::<serde_json::Value>(line) {
				if let Some(id) = value["id"].as_str() {
					ids.push(id.to_string());
				}
			}
		}
		debug!(log, "subprocess search"; "count" => ids.len());
		if ids.is_empty() {
			Err(Error::from("no search results from subprocess"))
		} else {
			Ok(ids)
		}
	}

	fn charts(&self, log: &Logger) -> Result<Vec<String>> {
		let output = Command::new(&self.extractor_bin).args(&["-j", "ytcharts:"]).output()?;
		if !output.status.success() {
			return Err(Error::from("subprocess charts unavailable"));
		}
		let stdout = String::from_utf8_lossy(&output.stdout);
		let ids: Vec<String> = stdout
			.lines()
			.filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
			.filter_map(|v| v["id"].as_str().map(String::from))
			.collect();
		debug!(log, "subprocess charts"; "count" => ids.len());
		if ids.is_empty() {
			Err(Error::from("no chart results from subprocess"))
		} else {
			Ok(ids)
		}
	}

	fn resolve(&self, log: &Logger, id: &str) -> Result<ResolvedStream> {
		let output = Command::new(&self.extractor_bin).args(&["-f", "bestaudio", "-g", id]).output()?;
		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(Error::from(format!("extractor exited with {}: {}", output.status, stderr)));
		}
		let url = String::from_utf8_lossy(&output.stdout).lines().next().unwrap_or("").trim().to_string();
		if url.is_empty() {
			return Err(Error::from("extractor returned no stream url"));
		}

		let duration_seconds = self.metadata(log, id).map(|m| m.duration_seconds).unwrap_or(0);

		Ok(ResolvedStream {
			url,
			extension: "opus".to_string(),
			duration_seconds,
		})
	}

	/// Downloads the raw bestaudio stream via the extractor binary, then
	/// hands it to the muxer binary to repackage as a single `.opus` file.
	/// The extractor never transcodes on its own; that split is what lets
	/// the muxer step be swapped independently of the extraction backend.
	fn download(&self, log: &Logger, id: &str, dest_dir: &Path) -> Result<PathBuf> {
		std::fs::create_dir_all(dest_dir)?;
		let raw_template = dest_dir.join(format!("{}.raw.%(ext)s", id));

		time!(t_download);
		let output = Command::new(&self.extractor_bin)
			.args(&["-f", "bestaudio"])
			.arg("-o")
			.arg(&raw_template)
			.arg(id)
			.output()?;

		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr);
			return Err(Error::from(format!("download exited with {}: {}", output.status, stderr)));
		}

		let raw_path = ["webm", "m4a", "opus", "mp4", "ogg"]
			.iter()
			.map(|ext| dest_dir.join(format!("{}.raw.{}", id, ext)))
			.find(|candidate| candidate.exists())
			.ok_or_else(|| Error::from("downloaded raw file not found"))?;

		info!(log, "raw download finished"; "id" => id, t_download);

		let final_path = dest_dir.join(format!("{}.opus", id));

		time!(t_mux);
		let mux_output = Command::new(&self.muxer_bin)
			.args(&["-y", "-i"])
			.arg(&raw_path)
			.args(&["-vn", "-c:a", "libopus"])
			.arg(&final_path)
			.output()?;

		let _ = std::fs::remove_file(&raw_path);

		if !mux_output.status.success() {
			let stderr = String::from_utf8_lossy(&mux_output.stderr);
			return Err(Error::from(format!("muxer exited with {}: {}", mux_output.status, stderr)));
		}
		if !final_path.exists() {
			return Err(Error::from("muxed file not found after extraction"));
		}

		info!(log, "mux finished"; "id" => id, t_mux);

		Ok(final_path)
	}
}
