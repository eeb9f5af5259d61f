//! The media-fetch and caching subsystem: resolves third-party video ids
//! into cached audio files, search results, per-id metadata and a daily
//! chart, all behind single-flight, bounded, ranked caches.

pub mod extractor;

mod charts_cache;
mod metadata_cache;
mod search_cache;
mod song;
mod song_cache;

pub use self::charts_cache::ChartsCache;
pub use self::metadata_cache::MetadataCache;
pub use self::search_cache::{normalize_query, SearchCache};
pub use self::song::{Song, SongReader, SongState};
pub use self::song_cache::{FetchOutcome, SongCache};

use std::path::PathBuf;
use std::sync::Arc;

use slog::Logger;

use crate::crypto::Codec;
use crate::util::Result;

use self::extractor::{ExtractorChain, MetadataRecord};

/// Facade combining the song, metadata, search and charts caches behind
/// the operations the HTTP layer actually calls.
pub struct YoutubeService {
	pub songs:    SongCache,
	pub metadata: Arc<MetadataCache>,
	pub search:   SearchCache,
	pub charts:   ChartsCache,
}

impl YoutubeService {
	pub fn new(log: Logger, chain: ExtractorChain, codec: Arc<Codec>, media_dir: PathBuf) -> YoutubeService {
		let chain = Arc::new(chain);
		let metadata = Arc::new(MetadataCache::new(log.new(o!("cache" => "metadata")), chain.clone()));
		let search = SearchCache::new(log.new(o!("cache" => "search")), chain.clone(), metadata.clone());
		let charts = ChartsCache::new(log.new(o!("cache" => "charts")), chain.clone(), metadata.clone());
		let songs = SongCache::new(log.new(o!("cache" => "songs")), chain, codec, media_dir);

		YoutubeService {
			songs,
			metadata,
			search,
			charts,
		}
	}

	pub fn fetch(&self, id: &str) -> Result<FetchOutcome> {
		self.songs.fetch(id)
	}

	pub fn get_song(&self, token: &str) -> Result<Arc<Song>> {
		self.songs.get(token)
	}

	pub fn get_info(&self, id: &str) -> Result<MetadataRecord> {
		self.metadata.get(id)
	}

	pub fn search(&self, query: &str) -> Result<Vec<MetadataRecord>> {
		self.search.get(query)
	}

	pub fn get_charts(&self) -> Result<Vec<MetadataRecord>> {
		self.charts.get()
	}
}
