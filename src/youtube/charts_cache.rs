use std::sync::{Arc, RwLock};

use slog::Logger;

use crate::util::{DateTime, Result};

use super::extractor::{ExtractorChain, MetadataRecord};
use super::metadata_cache::MetadataCache;

struct Slot {
	results: Vec<MetadataRecord>,
	day:     i32,
}

/// Single-entry, day-bucketed cache for the charts endpoint.
pub struct ChartsCache {
	slot:     RwLock<Option<Slot>>,
	chain:    Arc<ExtractorChain>,
	metadata: Arc<MetadataCache>,
	log:      Logger,
}

impl ChartsCache {
	pub fn new(log: Logger, chain: Arc<ExtractorChain>, metadata: Arc<MetadataCache>) -> ChartsCache {
		ChartsCache {
			slot: RwLock::new(None),
			chain,
			metadata,
			log,
		}
	}

	pub fn get(&self) -> Result<Vec<MetadataRecord>> {
		let today = DateTime::now().local_day();

		{
			let slot = self.slot.read().unwrap();
			if let Some(slot) = slot.as_ref() {
				if slot.day == today {
					return Ok(slot.results.clone());
				}
			}
		}

		let mut slot = self.slot.write().unwrap();
		if let Some(slot) = slot.as_ref() {
			if slot.day == today {
				return Ok(slot.results.clone());
			}
		}

		let ids = self.chain.charts(&self.log)?;
		let mut results = Vec::with_capacity(ids.len());
		for id in ids {
			match self.metadata.get(&id) {
				Ok(record) => results.push(record),
				Err(err) => debug!(self.log, "skipping unresolved chart entry: {}", err; "id" => &id),
			}
		}

		*slot = Some(Slot { results: results.clone(), day: today });
		Ok(results)
	}
}
