//! Minimal JSON-file-backed collaborators: the API-key registry consulted
//! by every JSON endpoint, and the append-only fetch history log.
//!
//! Authoring, playlists and a relational catalog are out of scope; this is
//! only the boundary the core needs in order to compile and run.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use crate::util::{self, DateTime};

#[derive(Clone, Serialize, Deserialize)]
pub struct UserRecord {
	pub api_key:  String,
	pub name:     String,
	pub verified: bool,
}

/// Registry of known API keys, loaded once at startup from a JSON file.
pub struct UsersStore {
	users: RwLock<HashMap<String, UserRecord>>,
}

impl UsersStore {
	pub fn load(path: &PathBuf) -> util::Result<UsersStore> {
		let users: Vec<UserRecord> = util::read_json(path)?.unwrap_or_default();
		let map = users.into_iter().map(|u| (u.api_key.clone(), u)).collect();
		Ok(UsersStore { users: RwLock::new(map) })
	}

	/// Returns whether `api_key` belongs to a verified user.
	pub fn is_verified(&self, api_key: &str) -> bool {
		self.users.read().unwrap().get(api_key).map(|u| u.verified).unwrap_or(false)
	}
}

#[derive(Serialize)]
struct FetchHistoryEntry {
	api_key:   String,
	raw_id:    String,
	timestamp: DateTime,
}

/// Append-only log of fetch requests, written when a client opts in with
/// `addhistory: true`.
pub struct HistoryLog {
	path: PathBuf,
}

impl HistoryLog {
	pub fn new(path: PathBuf) -> HistoryLog {
		HistoryLog { path }
	}

	pub fn append(&self, api_key: &str, raw_id: &str) -> util::Result<()> {
		let entry = FetchHistoryEntry {
			api_key:   api_key.to_string(),
			raw_id:    raw_id.to_string(),
			timestamp: DateTime::now(),
		};
		let line = serde_json::to_string(&entry)?;
		util::append_line(&self.path, &line)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unknown_key_is_unverified() {
		let store = UsersStore {
			users: RwLock::new(HashMap::new()),
		};
		assert!(!store.is_verified("missing"));
	}

	#[test]
	fn test_verified_flag_is_respected() {
		let mut map = HashMap::new();
		map.insert(
			"abc".to_string(),
			UserRecord {
				api_key:  "abc".to_string(),
				name:     "tester".to_string(),
				verified: true,
			},
		);
		let store = UsersStore { users: RwLock::new(map) };
		assert!(store.is_verified("abc"));
	}
}
