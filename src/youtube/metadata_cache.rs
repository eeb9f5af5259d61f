use std::sync::Arc;

use slog::Logger;

use crate::cache::{DedupMap, RankedBound, Slot, MAX_ENTRIES};
use crate::util::{Error, Result};

use super::extractor::{ExtractorChain, MetadataRecord};

/// Bounded, single-flight cache of per-id metadata records.
pub struct MetadataCache {
	dedup: DedupMap<String, Slot<MetadataRecord>>,
	bound: RankedBound<String>,
	chain: Arc<ExtractorChain>,
	log:   Logger,
}

impl MetadataCache {
	pub fn new(log: Logger, chain: Arc<ExtractorChain>) -> MetadataCache {
		MetadataCache {
			dedup: DedupMap::new(),
			bound: RankedBound::new(),
			chain,
			log,
		}
	}

	pub fn get(&self, id: &str) -> Result<MetadataRecord> {
		let id = id.trim().to_string();
		if id.is_empty() {
			return Err(Error::from("empty id"));
		}

		let (slot, was_present) = self.dedup.load_or_store(id.clone(), || Arc::new(Slot::new()));

		if was_present {
			let record = slot.wait()?;
			slot.bump_access();
			self.reindex(&id, slot.access_count());
			return Ok(record);
		}

		match self.chain.metadata(&self.log, &id) {
			Ok(record) => {
				slot.publish(record.clone());
				slot.bump_access();
				self.reindex(&id, slot.access_count());
				if self.bound.size() > MAX_ENTRIES {
					self.evict_lowest();
				}
				Ok(record)
			}
			Err(err) => {
				slot.fail(err.to_string());
				self.dedup.remove(&id);
				self.bound.delete(&id);
				Err(err)
			}
		}
	}

	fn reindex(&self, id: &str, count: u64) {
		self.bound.delete(&id.to_string());
		self.bound.insert(id.to_string(), count);
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
