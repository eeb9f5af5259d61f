use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use std::thread;

use slog::Logger;

use crate::cache::{DedupMap, RankedBound, MAX_ENTRIES};
use crate::crypto::Codec;
use crate::util::{Error, Result};

use super::extractor::ExtractorChain;
use super::song::{Song, SongReader, SongState};

/// Either a locally cached file the client should be told to fetch through
/// its opaque token, or an upstream URL to proxy to while the local copy is
/// still being written.
pub enum FetchOutcome {
	Ready(String),
	Proxy(String),
}

/// Orchestrates dedup, ranking and the extractor chain for cached audio
/// files. Owns the cache-wide delete gate that the lock-ordering discipline
/// requires eviction to take before touching any song's file.
pub struct SongCache {
	dedup:       DedupMap<String, Song>,
	bound:       RankedBound<String>,
	delete_gate: Arc<RwLock<()>>,
	chain:       Arc<ExtractorChain>,
	codec:       Arc<Codec>,
	media_dir:   PathBuf,
	log:         Logger,
}

impl SongCache {
	pub fn new(log: Logger, chain: Arc<ExtractorChain>, codec: Arc<Codec>, media_dir: PathBuf) -> SongCache {
		let cache = SongCache {
			dedup: DedupMap::new(),
			bound: RankedBound::new(),
			delete_gate: Arc::new(RwLock::new(())),
			chain,
			codec,
			media_dir,
			log,
		};
		cache.bootstrap();
		cache
	}

	/// Scans the media directory and materializes one `Ready` song per
	/// file found, so a restarted process still serves what it already
	/// downloaded.
	fn bootstrap(&self) {
		let entries = match std::fs::read_dir(&self.media_dir) {
			Ok(entries) => entries,
			Err(_) => return,
		};

		for entry in entries.flatten() {
			let path = entry.path();
			let id = match path.file_stem().and_then(|s| s.to_str()) {
				Some(id) => id.to_string(),
				None => continue,
			};
			let song = Arc::new(Song::from_existing_file(id.clone(), path));
			let (_, was_present) = self.dedup.load_or_store(id.clone(), || song.clone());
			if !was_present {
				self.bound.insert(id, song.access_count());
			}
		}

		info!(self.log, "bootstrapped song cache"; "count" => self.bound.size());
	}

	/// Implements the fetch algorithm: dedup, resolve (first caller only),
	/// re-rank, evict on overflow.
	pub fn fetch(&self, raw_id: &str) -> Result<FetchOutcome> {
		let raw_id = raw_id.trim().to_string();
		if raw_id.is_empty() {
			return Err(Error::from("empty id"));
		}

		let (song, _was_present) = self.dedup.load_or_store(raw_id.clone(), || Arc::new(Song::new(raw_id.clone())));
		song.bump_access();

		let outcome = self.resolve(&song)?;

		self.bound.delete(&raw_id);
		self.bound.insert(raw_id.clone(), song.access_count());

		if self.bound.size() > MAX_ENTRIES {
			self.evict_lowest();
		}

		Ok(outcome)
	}

	/// Looks up a song by its opaque token, for the streaming endpoint.
	pub fn get(&self, token: &str) -> Result<Arc<Song>> {
		let raw_id = self.codec.decrypt(token)?;
		self.dedup.get(&raw_id).ok_or_else(|| Error::from("song not found"))
	}

	fn resolve(&self, song: &Arc<Song>) -> Result<FetchOutcome> {
		match song.state() {
			SongState::Ready => Ok(FetchOutcome::Ready(song.token(&self.codec)?)),

			SongState::Downloading => {
				let (url, expired) = song
					.stream_url()
					.ok_or_else(|| Error::from("downloading song has no stream url"))?;
				if expired {
					let resolved = self.chain.resolve(&self.log, &song.id)?;
					song.refresh_stream_url(resolved.url.clone());
					Ok(FetchOutcome::Proxy(resolved.url))
				} else {
					Ok(FetchOutcome::Proxy(url))
				}
			}

			SongState::Pending => {
				if song.begin_resolving() {
					match self.chain.resolve(&self.log, &song.id) {
						Ok(resolved) => {
							song.set_downloading(resolved.url.clone());
							self.spawn_download(song.clone(), resolved.extension, resolved.duration_seconds);
							Ok(FetchOutcome::Proxy(resolved.url))
						}
						Err(err) => {
							song.revert_to_pending();
							self.dedup.remove(&song.id);
							self.bound.delete(&song.id);
							Err(err)
						}
					}
				} else {
					// Lost the race to become the resolver: another caller
					// is already resolving, wait for it to settle.
					song.wait_while_resolving();
					self.resolve(song)
				}
			}

			SongState::Resolving => {
				// A concurrent caller is mid-resolution; block until it
				// transitions to `Downloading` or reverts to `Pending`
				// instead of spinning the thread.
				song.wait_while_resolving();
				self.resolve(song)
			}

			SongState::Deleted => Err(Error::from("song was evicted")),
		}
	}

	/// Background download: holds the cache-wide delete gate for read so
	/// a concurrent eviction cannot remove the file out from under it.
	fn spawn_download(&self, song: Arc<Song>, _extension: String, duration_seconds: u64) {
		let chain = self.chain.clone();
		let media_dir = self.media_dir.clone();
		let delete_gate = self.delete_gate.clone();
		let log = self.log.new(o!("id" => song.id.clone()));

		// Videos longer than 20 minutes are served by proxy only; the
		// pipeline never attempts to write them to disk.
		if duration_seconds > 20 * 60 {
			info!(log, "skipping local download for long video"; "seconds" => duration_seconds);
			return;
		}

		thread::spawn(move || {
			time!(t_download);
			// Held for the whole download so a concurrent eviction pass
			// cannot remove the song's slot while the file is mid-write.
			let _read_gate = delete_gate.read().unwrap();
			match chain.download(&log, &song.id, &media_dir) {
				Ok(path) => {
					if song.set_ready(path) {
						info!(log, "song is ready"; t_download);
					} else {
						info!(log, "song was evicted mid-download, discarding");
					}
				}
				Err(err) => {
					warn!(log, "download failed: {}", err);
					song.revert_to_pending();
				}
			}
		});
	}

	fn evict_lowest(&self) {
		if let Some(key) = self.bound.get_lowest() {
			let _write_gate = self.delete_gate.write().unwrap();
			self.bound.delete(&key);
			if let Some(song) = self.dedup.remove(&key) {
				match song.state() {
					SongState::Downloading => {
						song.request_evict_while_downloading();
					}
					_ => {
						if let Err(err) = song.delete() {
							warn!(self.log, "failed to delete evicted song: {}", err);
						}
					}
				}
			}
		}
	}

	pub fn size(&self) -> usize {
		self.bound.size()
	}
}

pub use super::song::{Song as CachedSong, SongReader as CachedSongReader};
