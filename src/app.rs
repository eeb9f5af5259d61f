use std::sync::Arc;

use slog::Logger;

use crate::config::Config;
use crate::crypto::Codec;
use crate::database::{HistoryLog, UsersStore};
use crate::youtube::extractor::{ApiExtractor, Extractor, ExtractorChain, ScrapeExtractor, SubprocessExtractor};
use crate::youtube::YoutubeService;

/// Maintains the global application state: configuration, the logging
/// root, the media cache, and the user/history collaborators.
pub struct App {
	pub log:     Logger,
	pub config:  Config,
	pub youtube: YoutubeService,
	pub users:   UsersStore,
	pub history: HistoryLog,

	_compat_log_guard: slog_scope::GlobalLoggerGuard,
}

impl App {
	/// Initializes the application state and returns the static [App]
	/// instance. Initialization is idempotent: later calls return the
	/// already-built instance.
	pub fn get() -> &'static App {
		lazy_static! {
			static ref APP: App = App::init();
		}
		&APP
	}

	fn init() -> App {
		use slog::Drain;

		let term = slog_term::term_compact();
		let term = std::sync::Mutex::new(term);
		let log = Logger::root(term.fuse(), o!());

		let compat_log_guard = slog_scope::set_global_logger(log.clone());
		slog_stdlog::init().expect("failed to initialize log compatibility shim");

		let config = Config::parse(std::env::args().skip(1));
		config.prepare_directories();

		time!(t_init);
		info!(log, "starting ytfetcher"; "port" => config.port);

		let codec = Arc::new(Codec::new());

		let mut backends: Vec<Box<dyn Extractor>> = vec![Box::new(ScrapeExtractor::new())];
		if let Some(key) = &config.api_key {
			backends.push(Box::new(ApiExtractor::new(key.clone())));
		} else {
			warn!(log, "no third-party api key configured, that backend is disabled");
		}
		backends.push(Box::new(SubprocessExtractor::new("youtube-dl", "ffmpeg")));
		let chain = ExtractorChain::new(backends);

		let youtube = YoutubeService::new(log.new(o!("component" => "youtube")), chain, codec, config.media_dir.clone());

		let users = UsersStore::load(&config.users_file).unwrap_or_else(|err| {
			eprintln!("could not load users file {}: {}", config.users_file.display(), err);
			std::process::exit(1);
		});

		let history = HistoryLog::new(config.history_file.clone());

		let app = App {
			log: log.clone(),
			config,
			youtube,
			users,
			history,
			_compat_log_guard: compat_log_guard,
		};

		trace!(app.log, "application initialized"; t_init);
		app
	}
}
