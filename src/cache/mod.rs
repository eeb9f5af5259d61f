//! Generic building blocks shared by the song, search, metadata and chart
//! caches: a bounded, access-ranked index, a single-flight map, and the
//! resolution slot that lets single-flight release the map's lock while
//! the actual (slow) resolution work runs.

mod dedup_map;
pub use self::dedup_map::DedupMap;

mod ranked_bound;
pub use self::ranked_bound::RankedBound;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::util::{Condition, Error, Result};

/// Maximum number of entries retained by any of the bounded caches.
pub const MAX_ENTRIES: usize = 1000;

/// A placeholder inserted into a [DedupMap] by the winning caller, published
/// once the (possibly slow) resolution finishes.
///
/// Losing callers block on [wait] instead of on the map's own lock, so
/// unrelated keys are never serialized behind one key's network call.
pub struct Slot<T: Clone> {
	done:         Condition,
	result:       Mutex<Option<std::result::Result<T, String>>>,
	access_count: AtomicU64,
}

impl<T: Clone> Slot<T> {
	pub fn new() -> Slot<T> {
		Slot {
			done:         Condition::default(),
			result:       Mutex::new(None),
			access_count: AtomicU64::new(0),
		}
	}

	pub fn bump_access(&self) -> u64 {
		self.access_count.fetch_add(1, Ordering::SeqCst) + 1
	}

	pub fn access_count(&self) -> u64 {
		self.access_count.load(Ordering::SeqCst)
	}

	pub fn publish(&self, value: T) {
		*self.result.lock().unwrap() = Some(Ok(value));
		self.done.trigger();
	}

	pub fn fail(&self, message: String) {
		*self.result.lock().unwrap() = Some(Err(message));
		self.done.trigger();
	}

	/// Blocks until the winning caller publishes a result or a failure,
	/// returning immediately if that has already happened.
	pub fn wait(&self) -> Result<T> {
		self.done.wait();
		match &*self.result.lock().unwrap() {
			Some(Ok(value)) => Ok(value.clone()),
			Some(Err(message)) => Err(Error::from(message.clone())),
			None => Err(Error::from("resolution slot was never published")),
		}
	}
}
