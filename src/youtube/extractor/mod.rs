//! Fallback chain over the three backends that can resolve a video id into
//! metadata, search results or a playable stream: an HTML page-scrape, a
//! third-party JSON API, and an external extractor subprocess.
//!
//! Not every backend supports every capability; an unsupported capability
//! simply returns an error and the chain moves to the next backend.

mod api;
mod scrape;
mod subprocess;

pub use self::api::ApiExtractor;
pub use self::scrape::ScrapeExtractor;
pub use self::subprocess::SubprocessExtractor;

use slog::Logger;
use std::path::{Path, PathBuf};

use crate::util::{Error, Result};

/// A resolved piece of metadata for a single video id.
#[derive(Clone, Debug, Serialize)]
pub struct MetadataRecord {
	pub title:            String,
	pub id:                String,
	pub thumbnail:        String,
	pub duration_seconds: u64,
	pub duration:         String,
}

impl MetadataRecord {
	pub fn new(id: impl Into<String>, title: impl Into<String>, thumbnail: impl Into<String>, duration_seconds: u64) -> MetadataRecord {
		MetadataRecord {
			title: title.into(),
			id: id.into(),
			thumbnail: thumbnail.into(),
			duration_seconds,
			duration: crate::base::format_minutes_seconds(duration_seconds),
		}
	}
}

/// A resolved playable stream for a video id, before it has been downloaded.
pub struct ResolvedStream {
	pub url:              String,
	pub extension:        String,
	pub duration_seconds: u64,
}

/// Common interface implemented by each extraction backend.
///
/// Default methods report the capability as unsupported; a backend only
/// overrides what it can actually do.
pub trait Extractor: Send + Sync {
	fn name(&self) -> &'static str;

	fn metadata(&self, _log: &Logger, _id: &str) -> Result<MetadataRecord> {
		Err(unsupported(self.name(), "metadata"))
	}

	fn search(&self, _log: &Logger, _query: &str) -> Result<Vec<String>> {
		Err(unsupported(self.name(), "search"))
	}

	fn charts(&self, _log: &Logger) -> Result<Vec<String>> {
		Err(unsupported(self.name(), "charts"))
	}

	fn resolve(&self, _log: &Logger, _id: &str) -> Result<ResolvedStream> {
		Err(unsupported(self.name(), "resolve"))
	}

	/// Downloads and muxes the given id's audio to `dest_dir`, returning
	/// the final file path. Only the subprocess backend implements this.
	fn download(&self, _log: &Logger, _id: &str, _dest_dir: &Path) -> Result<PathBuf> {
		Err(unsupported(self.name(), "download"))
	}
}

fn unsupported(backend: &str, capability: &str) -> Error {
	Error::from(format!("{} does not support {}", backend, capability))
}

/// Orchestrates the ordered fallback over a list of backends.
pub struct ExtractorChain {
	backends: Vec<Box<dyn Extractor>>,
}

impl ExtractorChain {
	pub fn new(backends: Vec<Box<dyn Extractor>>) -> ExtractorChain {
		ExtractorChain { backends }
	}

	pub fn metadata(&self, log: &Logger, id: &str) -> Result<MetadataRecord> {
		self.try_each(log, "metadata", |b| b.metadata(log, id))
	}

	pub fn search(&self, log: &Logger, query: &str) -> Result<Vec<String>> {
		self.try_each(log, "search", |b| b.search(log, query))
	}

	pub fn charts(&self, log: &Logger) -> Result<Vec<String>> {
		self.try_each(log, "charts", |b| b.charts(log))
	}

	pub fn resolve(&self, log: &Logger, id: &str) -> Result<ResolvedStream> {
		self.try_each(log, "resolve", |b| b.resolve(log, id))
	}

	/// The download step has no fallback: only the subprocess backend can
	/// perform it, so the chain just forwards to whichever backend in its
	/// list implements it.
	pub fn download(&self, log: &Logger, id: &str, dest_dir: &Path) -> Result<PathBuf> {
		self.try_each(log, "download", |b| b.download(log, id, dest_dir))
	}

	fn try_each<T>(&self, log: &Logger, op: &str, mut call: impl FnMut(&dyn Extractor) -> Result<T>) -> Result<T> {
		let mut last_err = None;
		for backend in &self.backends {
			match call(backend.as_ref()) {
				Ok(value) => return Ok(value),
				Err(err) => {
					debug!(log, "{} backend failed {}: {}", backend.name(), op, err);
					last_err = Some(err);
				}
			}
		}
		Err(last_err.unwrap_or_else(|| Error::from(format!("no backend available for {}", op))))
	}
}
