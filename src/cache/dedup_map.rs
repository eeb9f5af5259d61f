use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Insert-or-fetch primitive.
///
/// Guarantees that, for a given key, at most one `factory` call ever runs:
/// concurrent callers racing on an absent key all observe the same instance,
/// and only one of them is told it was the one to create it.
///
/// `factory` is expected to be cheap — it constructs a placeholder value
/// (a `Pending` song, an empty search slot); the actual resolution work runs
/// afterwards, outside of this map's lock, serialized instead by a gate
/// owned by the returned value itself.
pub struct DedupMap<K: Eq + Hash, V> {
	entries: Mutex<HashMap<K, Arc<V>>>,
}

impl<K: Clone + Eq + Hash, V> DedupMap<K, V> {
	pub fn new() -> DedupMap<K, V> {
		DedupMap {
			entries: Mutex::new(HashMap::new()),
		}
	}

	/// Returns the entry for `key`, creating it with `factory` if absent.
	///
	/// The boolean is `true` if an entry already existed for `key`.
	pub fn load_or_store<F: FnOnce() -> Arc<V>>(&self, key: K, factory: F) -> (Arc<V>, bool) {
		let mut entries = self.entries.lock().unwrap();
		if let Some(value) = entries.get(&key) {
			return (value.clone(), true);
		}
		let value = factory();
		entries.insert(key, value.clone());
		(value, false)
	}

	/// Returns the entry for `key`, if present, without creating one.
	pub fn get(&self, key: &K) -> Option<Arc<V>> {
		self.entries.lock().unwrap().get(key).cloned()
	}

	/// Removes `key`, returning the removed entry if any.
	pub fn remove(&self, key: &K) -> Option<Arc<V>> {
		self.entries.lock().unwrap().remove(key)
	}

	pub fn len(&self) -> usize {
		self.entries.lock().unwrap().len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::sync::Barrier;
	use std::thread;

	#[test]
	fn test_single_factory_invocation() {
		let map: DedupMap<&str, AtomicUsize> = DedupMap::new();
		let calls = Arc::new(AtomicUsize::new(0));
		let barrier = Arc::new(Barrier::new(8));

		thread::scope(|scope| {
			for _ in 0..8 {
				let map = &map;
				let calls = calls.clone();
				let barrier = barrier.clone();
				scope.spawn(move || {
					barrier.wait();
					let (value, _was_present) = map.load_or_store("id", || {
						calls.fetch_add(1, Ordering::SeqCst);
						Arc::new(AtomicUsize::new(0))
					});
					value.fetch_add(1, Ordering::SeqCst);
				});
			}
		});

		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(map.get(&"id").unwrap().load(Ordering::SeqCst), 8);
	}

	#[test]
	fn test_remove_allows_retry() {
		let map: DedupMap<&str, usize> = DedupMap::new();
		let (_, was_present) = map.load_or_store("id", || Arc::new(1));
		assert!(!was_present);
		map.remove(&"id");
		let (_, was_present) = map.load_or_store("id", || Arc::new(2));
		assert!(!was_present);
	}
}
