use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, RwLock, RwLockReadGuard};
use std::time::{Duration, Instant};

use crate::crypto::Codec;
use crate::util::{Error, Result};

/// Lifetime of an upstream stream URL handed out by the extractor chain.
const STREAM_URL_TTL: Duration = Duration::from_secs(60 * 60);

/// State of a single cached audio artifact.
///
/// Transitions: `Pending -> Resolving -> Downloading -> Ready -> Deleted`.
/// `Resolving` may revert to `Pending` on extractor failure, so a later
/// fetch can retry. `Downloading` may jump directly to `Deleted` if the
/// song is evicted before the local file finishes writing. `Deleted` is
/// absorbing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SongState {
	Pending,
	Resolving,
	Downloading,
	Ready,
	Deleted,
}

struct StreamInfo {
	url:        String,
	expires_at: Instant,
}

struct Inner {
	state:      SongState,
	file_path:  Option<PathBuf>,
	stream:     Option<StreamInfo>,
	/// set once a concurrent eviction asked a still-downloading song to
	/// die; the download task checks this before committing `Ready`.
	evict_when_done: bool,
}

/// A single cached audio artifact tracked by the song cache.
pub struct Song {
	pub id: String,

	inner: Mutex<Inner>,
	/// Signaled whenever `inner.state` leaves `Resolving`, so callers that
	/// lost the race to resolve can block instead of spinning.
	resolved:     Condvar,
	file_gate:    RwLock<()>,
	access_count: AtomicU64,
	token:        Mutex<Option<String>>,
}

/// A live, range-capable handle to a `Ready` song's file.
pub struct SongReader<'a> {
	pub path: PathBuf,
	_guard:   RwLockReadGuard<'a, ()>,
}

impl Song {
	/// A fresh, never-fetched song.
	pub fn new(id: impl Into<String>) -> Song {
		Song {
			id:           id.into(),
			inner:        Mutex::new(Inner {
				state:           SongState::Pending,
				file_path:       None,
				stream:          None,
				evict_when_done: false,
			}),
			resolved:     Condvar::new(),
			file_gate:    RwLock::new(()),
			access_count: AtomicU64::new(0),
			token:        Mutex::new(None),
		}
	}

	/// A song materialized directly as `Ready` from a file discovered on
	/// disk at startup.
	pub fn from_existing_file(id: impl Into<String>, path: PathBuf) -> Song {
		Song {
			id:           id.into(),
			inner:        Mutex::new(Inner {
				state:           SongState::Ready,
				file_path:       Some(path),
				stream:          None,
				evict_when_done: false,
			}),
			resolved:     Condvar::new(),
			file_gate:    RwLock::new(()),
			access_count: AtomicU64::new(1),
			token:        Mutex::new(None),
		}
	}

	pub fn state(&self) -> SongState {
		self.inner.lock().unwrap().state
	}

	pub fn bump_access(&self) -> u64 {
		self.access_count.fetch_add(1, Ordering::SeqCst) + 1
	}

	pub fn access_count(&self) -> u64 {
		self.access_count.load(Ordering::SeqCst)
	}

	/// Attempts to move this song from `Pending` to `Resolving`.
	///
	/// Returns `true` for exactly one caller: the one responsible for
	/// running the extractor chain.
	pub fn begin_resolving(&self) -> bool {
		let mut inner = self.inner.lock().unwrap();
		if inner.state == SongState::Pending {
			inner.state = SongState::Resolving;
			true
		} else {
			false
		}
	}

	/// Reverts a failed resolution back to `Pending`, allowing a retry.
	pub fn revert_to_pending(&self) {
		let mut inner = self.inner.lock().unwrap();
		if inner.state == SongState::Resolving {
			inner.state = SongState::Pending;
			self.resolved.notify_all();
		}
	}

	/// Records the resolved upstream URL and moves to `Downloading`.
	pub fn set_downloading(&self, url: String) {
		let mut inner = self.inner.lock().unwrap();
		inner.stream = Some(StreamInfo {
			url,
			expires_at: Instant::now() + STREAM_URL_TTL,
		});
		inner.state = SongState::Downloading;
		self.resolved.notify_all();
	}

	/// Blocks the calling thread until this song leaves `Resolving`,
	/// returning the state it settled into. Callers that lose the race to
	/// resolve wait here instead of spinning.
	pub fn wait_while_resolving(&self) -> SongState {
		let inner = self.inner.lock().unwrap();
		let inner = self.resolved.wait_while(inner, |inner| inner.state == SongState::Resolving).unwrap();
		inner.state
	}

	/// Returns `(url, expired)` for the currently known upstream URL, if
	/// the song has resolved one.
	pub fn stream_url(&self) -> Option<(String, bool)> {
		let inner = self.inner.lock().unwrap();
		inner.stream.as_ref().map(|s| (s.url.clone(), Instant::now() >= s.expires_at))
	}

	/// Replaces the upstream URL after a refresh, keeping the TTL window.
	pub fn refresh_stream_url(&self, url: String) {
		let mut inner = self.inner.lock().unwrap();
		inner.stream = Some(StreamInfo {
			url,
			expires_at: Instant::now() + STREAM_URL_TTL,
		});
	}

	/// Finishes the download, moving to `Ready` unless a concurrent
	/// eviction already requested this song be deleted.
	///
	/// Returns `true` if the song is now `Ready`.
	pub fn set_ready(&self, path: PathBuf) -> bool {
		let mut inner = self.inner.lock().unwrap();
		if inner.evict_when_done {
			drop(inner);
			let _ = std::fs::remove_file(&path);
			let mut inner = self.inner.lock().unwrap();
			inner.state = SongState::Deleted;
			false
		} else {
			inner.file_path = Some(path);
			inner.state = SongState::Ready;
			true
		}
	}

	/// Called by eviction when the song is still `Downloading`: flags it
	/// so the download task deletes its output instead of publishing it.
	///
	/// Returns `true` if the song was `Downloading` (the caller does not
	/// need to remove a file itself; the download task will).
	pub fn request_evict_while_downloading(&self) -> bool {
		let mut inner = self.inner.lock().unwrap();
		if inner.state == SongState::Downloading {
			inner.evict_when_done = true;
			true
		} else {
			false
		}
	}

	/// Opens a range-capable reader over the cached file.
	///
	/// Fails unless the song is currently `Ready`.
	pub fn open_reader(&self) -> Result<SongReader> {
		let guard = self.file_gate.read().unwrap();
		let inner = self.inner.lock().unwrap();
		if inner.state != SongState::Ready {
			return Err(Error::from("song is not ready"));
		}
		let path = inner
			.file_path
			.clone()
			.ok_or_else(|| Error::from("ready song has no file"))?;
		Ok(SongReader { path, _guard: guard })
	}

	/// Deletes this song's file (if any) and marks it `Deleted`.
	///
	/// Blocks until any in-flight reader finishes.
	pub fn delete(&self) -> Result<()> {
		let _guard = self.file_gate.write().unwrap();
		let mut inner = self.inner.lock().unwrap();
		if let Some(path) = inner.file_path.take() {
			std::fs::remove_file(&path)?;
		}
		inner.state = SongState::Deleted;
		Ok(())
	}

	/// Lazily computes and memoizes this song's opaque token.
	pub fn token(&self, codec: &Codec) -> Result<String> {
		let mut token = self.token.lock().unwrap();
		if let Some(value) = token.as_ref() {
			return Ok(value.clone());
		}
		let value = codec.encrypt(&self.id)?;
		*token = Some(value.clone());
		Ok(value)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_pending_to_downloading_to_ready() {
		let song = Song::new("abcdefghijk");
		assert!(song.begin_resolving());
		assert!(!song.begin_resolving(), "only one caller may win resolving");

		song.set_downloading("http://upstream/abc".to_string());
		assert_eq!(song.state(), SongState::Downloading);

		assert!(song.set_ready(PathBuf::from("/tmp/does-not-matter.ogg")));
		assert_eq!(song.state(), SongState::Ready);
	}

	#[test]
	fn test_revert_to_pending_allows_retry() {
		let song = Song::new("abcdefghijk");
		assert!(song.begin_resolving());
		song.revert_to_pending();
		assert_eq!(song.state(), SongState::Pending);
		assert!(song.begin_resolving());
	}

	#[test]
	fn test_eviction_while_downloading_prevents_ready() {
		let song = Song::new("abcdefghijk");
		song.begin_resolving();
		song.set_downloading("http://upstream/abc".to_string());
		assert!(song.request_evict_while_downloading());

		let tmp = std::env::temp_dir().join("ytfetcher-test-evict.ogg");
		std::fs::write(&tmp, b"data").unwrap();
		assert!(!song.set_ready(tmp.clone()));
		assert_eq!(song.state(), SongState::Deleted);
		assert!(!tmp.exists());
	}

	#[test]
	fn test_open_reader_requires_ready() {
		let song = Song::new("abcdefghijk");
		assert!(song.open_reader().is_err());
	}

	#[test]
	fn test_wait_while_resolving_unblocks_on_transition() {
		use std::sync::Arc;
		use std::thread;
		use std::time::Duration;

		let song = Arc::new(Song::new("abcdefghijk"));
		assert!(song.begin_resolving());

		let waiter = {
			let song = song.clone();
			thread::spawn(move || song.wait_while_resolving())
		};

		thread::sleep(Duration::from_millis(20));
		song.set_downloading("http://upstream/abc".to_string());

		assert_eq!(waiter.join().unwrap(), SongState::Downloading);
	}

	#[test]
	fn test_token_is_memoized() {
		let codec = Codec::new();
		let song = Song::new("abcdefghijk");
		let a = song.token(&codec).unwrap();
		let b = song.token(&codec).unwrap();
		assert_eq!(a, b);
	}
}
