use std::sync::Arc;

use crossbeam::channel::unbounded;
use slog::Logger;

use crate::cache::{DedupMap, RankedBound, Slot, MAX_ENTRIES};
use crate::util::{normalize_whitespace, Error, Result};

use super::extractor::{ExtractorChain, MetadataRecord};
use super::metadata_cache::MetadataCache;

/// Number of worker threads used to resolve a search result's ids
/// concurrently through the metadata cache.
const MAX_WORKERS: usize = 10;

/// Bounded, single-flight cache of search results keyed by a normalized
/// query string.
pub struct SearchCache {
	dedup:    DedupMap<String, Slot<Vec<MetadataRecord>>>,
	bound:    RankedBound<String>,
	chain:    Arc<ExtractorChain>,
	metadata: Arc<MetadataCache>,
	log:      Logger,
}

/// Normalizes a search query: lower-case, whitespace-collapsed, words
/// sorted lexicographically, so equivalent queries share a cache entry.
pub fn normalize_query(query: &str) -> String {
	let collapsed = normalize_whitespace(&query.to_lowercase());
	let mut words: Vec<&str> = collapsed.split(' ').filter(|w| !w.is_empty()).collect();
	words.sort();
	words.join(" ")
}

impl SearchCache {
	pub fn new(log: Logger, chain: Arc<ExtractorChain>, metadata: Arc<MetadataCache>) -> SearchCache {
		SearchCache {
			dedup: DedupMap::new(),
			bound: RankedBound::new(),
			chain,
			metadata,
			log,
		}
	}

	pub fn get(&self, query: &str) -> Result<Vec<MetadataRecord>> {
		let key = normalize_query(query);
		if key.is_empty() {
			return Err(Error::from("empty search query"));
		}

		let (slot, was_present) = self.dedup.load_or_store(key.clone(), || Arc::new(Slot::new()));

		if was_present {
			let results = slot.wait()?;
			slot.bump_access();
			self.reindex(&key, slot.access_count());
			return Ok(results);
		}

		match self.resolve(query) {
			Ok(results) => {
				slot.publish(results.clone());
				slot.bump_access();
				self.reindex(&key, slot.access_count());
				if self.bound.size() > MAX_ENTRIES {
					self.evict_lowest();
				}
				Ok(results)
			}
			Err(err) => {
				slot.fail(err.to_string());
				self.dedup.remove(&key);
				self.bound.delete(&key);
				Err(err)
			}
		}
	}

	fn resolve(&self, query: &str) -> Result<Vec<MetadataRecord>> {
		let ids = self.chain.search(&self.log, query)?;
		Ok(self.resolve_ids(ids))
	}

	/// Resolves a list of ids into metadata records concurrently, sharing
	/// the per-id dedup and eviction policy of the metadata cache. Ids
	/// that fail to resolve are skipped rather than failing the whole
	/// search.
	fn resolve_ids(&self, ids: Vec<String>) -> Vec<MetadataRecord> {
		let (job_tx, job_rx) = unbounded::<String>();
		let (result_tx, result_rx) = unbounded::<Option<MetadataRecord>>();

		let worker_count = ids.len().min(MAX_WORKERS).max(1);
		for id in &ids {
			job_tx.send(id.clone()).ok();
		}
		drop(job_tx);

		let mut handles = Vec::with_capacity(worker_count);
		for _ in 0..worker_count {
			let job_rx = job_rx.clone();
			let result_tx = result_tx.clone();
			let metadata = self.metadata.clone();
			let log = self.log.clone();
			handles.push(std::thread::spawn(move || {
				while let Ok(id) = job_rx.recv() {
					let record = metadata.get(&id).ok();
					if record.is_none() {
						debug!(log, "could not resolve search result"; "id" => &id);
					}
					result_tx.send(record).ok();
				}
			}));
		}
		drop(result_tx);

		for handle in handles {
			handle.join().ok();
		}

		let mut by_id = std::collections::HashMap::new();
		for record in result_rx.try_iter().flatten() {
			by_id.insert(record.id.clone(), record);
		}

		// Preserve the extractor's ranking order.
		ids.into_iter().filter_map(|id| by_id.remove(&id)).collect()
	}

	fn reindex(&self, key: &str, count: u64) {
		self.bound.delete(&key.to_string());
		self.bound.insert(key.to_string(), count);
	}

	fn evict_lowest(&self) {
		if let Some(key) = self.bound.get_lowest() {
			self.bound.delete(&key);
			self.dedup.remove(&key);
		}
	}

	pub fn size(&self) -> usize {
		self.bound.size()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_normalize_query_equivalence() {
		assert_eq!(normalize_query("Foo  BAR"), normalize_query("bar foo"));
		assert_eq!(normalize_query("  Hello   World  "), "hello world");
	}
}
