use std::path::PathBuf;

/// Runtime configuration, parsed from command line flags.
///
/// There is no config file: the service is meant to be started by a process
/// supervisor that passes flags directly, in the spirit of the original
/// `-p`/`-yt` flag pair.
pub struct Config {
	pub port:         u16,
	pub media_dir:    PathBuf,
	pub users_file:   PathBuf,
	pub history_file: PathBuf,
	pub api_key:      Option<String>,
}

impl Default for Config {
	fn default() -> Config {
		Config {
			port:         6713,
			media_dir:    PathBuf::from("files/youtube"),
			users_file:   PathBuf::from("files/users.json"),
			history_file: PathBuf::from("files/history.log"),
			api_key:      None,
		}
	}
}

impl Config {
	/// Parses `--port`, `--media-dir`, `--users-file`, `--history-file` and
	/// `--api-key` out of the given argument list, falling back to
	/// defaults for anything not given.
	pub fn parse(args: impl Iterator<Item = String>) -> Config {
		let mut config = Config::default();
		let mut args = args.peekable();

		while let Some(arg) = args.next() {
			let value = |args: &mut std::iter::Peekable<_>| args.next();
			match arg.as_str() {
				"--port" => {
					if let Some(v) = value(&mut args) {
						if let Ok(port) = v.parse() {
							config.port = port;
						}
					}
				}
				"--media-dir" => {
					if let Some(v) = value(&mut args) {
						config.media_dir = PathBuf::from(v);
					}
				}
				"--users-file" => {
					if let Some(v) = value(&mut args) {
						config.users_file = PathBuf::from(v);
					}
				}
				"--history-file" => {
					if let Some(v) = value(&mut args) {
						config.history_file = PathBuf::from(v);
					}
				}
				"--api-key" => {
					if let Some(v) = value(&mut args) {
						config.api_key = Some(v);
					}
				}
				_ => {}
			}
		}

		config
	}

	/// Creates the media and database directories, aborting the process on
	/// failure: running with a half-initialized data directory is worse
	/// than not starting at all.
	pub fn prepare_directories(&self) {
		if let Err(err) = std::fs::create_dir_all(&self.media_dir) {
			eprintln!("could not create media directory {}: {}", self.media_dir.display(), err);
			std::process::exit(1);
		}
		if let Some(parent) = self.users_file.parent() {
			if let Err(err) = std::fs::create_dir_all(parent) {
				eprintln!("could not create data directory {}: {}", parent.display(), err);
				std::process::exit(1);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_overrides_defaults() {
		let args = vec!["--port".to_string(), "9000".to_string(), "--api-key".to_string(), "k".to_string()];
		let config = Config::parse(args.into_iter());
		assert_eq!(config.port, 9000);
		assert_eq!(config.api_key.as_deref(), Some("k"));
		assert_eq!(config.media_dir, PathBuf::from("files/youtube"));
	}

	#[test]
	fn test_parse_ignores_unknown_flags() {
		let args = vec!["--bogus".to_string(), "value".to_string()];
		let config = Config::parse(args.into_iter());
		assert_eq!(config.port, 6713);
	}
}
