use rocket::config::{Config as RocketConfig, Environment};

use crate::api::v1::youtube;
use crate::app::App;
use crate::logging::ServerLogger;

pub fn launch(app: &'static App) {
	let rocket_config = RocketConfig::build(Environment::active().unwrap_or(Environment::Production))
		.port(app.config.port)
		.finalize()
		.unwrap_or_else(|err| {
			eprintln!("invalid server configuration: {}", err);
			std::process::exit(1);
		});

	rocket::custom(rocket_config)
		.attach(ServerLogger {})
		.manage(app)
		.mount(
			"/api/v1/youtube",
			routes![
				youtube::fetch,
				youtube::search,
				youtube::get_info,
				youtube::get_charts,
				youtube::get,
			],
		)
		.launch();
}
