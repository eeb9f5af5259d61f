use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::hash::Hash;
use std::sync::Mutex;

use fnv::FnvHashMap;

/// A bounded container ordered by an access count, used to decide which
/// entry to evict once a cache has grown past its capacity.
///
/// Insert and delete are both `O(log n)` amortized: a stale heap entry left
/// behind by a re-insert or a delete is discarded lazily, the next time it
/// would be returned by [get_lowest].
pub struct RankedBound<K: Clone + Eq + Hash> {
	store: Mutex<Store<K>>,
}

struct Store<K: Clone + Eq + Hash> {
	heap: BinaryHeap<Entry<K>>,
	live: FnvHashMap<K, Slot>,
	seq:  u64,
}

#[derive(Copy, Clone)]
struct Slot {
	count:      u64,
	generation: u64,
}

struct Entry<K> {
	count:      u64,
	seq:        u64,
	generation: u64,
	key:        K,
}

impl<K> PartialEq for Entry<K> {
	fn eq(&self, other: &Self) -> bool {
		self.count == other.count && self.seq == other.seq
	}
}

impl<K> Eq for Entry<K> {}

impl<K> PartialOrd for Entry<K> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl<K> Ord for Entry<K> {
	/// Reversed so that [BinaryHeap], a max-heap, surfaces the entry with
	/// the *lowest* count at its top; among equal counts, the entry with
	/// the smallest sequence number (the oldest) is surfaced first.
	fn cmp(&self, other: &Self) -> Ordering {
		other.count.cmp(&self.count).then_with(|| other.seq.cmp(&self.seq))
	}
}

impl<K: Clone + Eq + Hash> RankedBound<K> {
	pub fn new() -> RankedBound<K> {
		RankedBound {
			store: Mutex::new(Store {
				heap: BinaryHeap::new(),
				live: FnvHashMap::default(),
				seq:  0,
			}),
		}
	}

	/// Inserts or re-indexes `key` at the given access count.
	///
	/// If `key` is already present it is superseded: any outstanding heap
	/// entry for its previous count becomes a tombstone.
	pub fn insert(&self, key: K, count: u64) {
		let mut store = self.store.lock().unwrap();
		store.seq += 1;
		let seq = store.seq;
		let generation = store.live.get(&key).map(|slot| slot.generation + 1).unwrap_or(1);
		store.live.insert(key.clone(), Slot { count, generation });
		store.heap.push(Entry {
			count,
			seq,
			generation,
			key,
		});
	}

	/// Removes `key`, returning whether it was present.
	pub fn delete(&self, key: &K) -> bool {
		let mut store = self.store.lock().unwrap();
		store.live.remove(key).is_some()
	}

	/// Returns the key with the lowest access count currently tracked, if
	/// any, breaking ties by insertion order.
	pub fn get_lowest(&self) -> Option<K> {
		let mut store = self.store.lock().unwrap();
		loop {
			let is_live = match store.heap.peek() {
				None => return None,
				Some(entry) => match store.live.get(&entry.key) {
					Some(slot) => slot.generation == entry.generation,
					None => false,
				},
			};
			if is_live {
				return store.heap.peek().map(|entry| entry.key.clone());
			}
			store.heap.pop();
		}
	}

	/// Number of live entries currently tracked.
	pub fn size(&self) -> usize {
		self.store.lock().unwrap().live.len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_lowest_by_count() {
		let bound = RankedBound::new();
		bound.insert("a", 5);
		bound.insert("b", 1);
		bound.insert("c", 3);
		assert_eq!(bound.get_lowest(), Some("b"));
	}

	#[test]
	fn test_ties_broken_by_insertion_order() {
		let bound = RankedBound::new();
		bound.insert("first", 1);
		bound.insert("second", 1);
		assert_eq!(bound.get_lowest(), Some("first"));
	}

	#[test]
	fn test_reinsert_updates_rank() {
		let bound = RankedBound::new();
		bound.insert("a", 1);
		bound.insert("b", 2);
		bound.delete(&"a");
		bound.insert("a", 10);
		assert_eq!(bound.get_lowest(), Some("b"));
		assert_eq!(bound.size(), 2);
	}

	#[test]
	fn test_delete_removes_entry() {
		let bound = RankedBound::new();
		bound.insert("a", 1);
		assert!(bound.delete(&"a"));
		assert!(!bound.delete(&"a"));
		assert_eq!(bound.get_lowest(), None);
		assert_eq!(bound.size(), 0);
	}
}
