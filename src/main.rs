#![feature(proc_macro_hygiene, decl_macro)]

#[macro_use]
extern crate serde;
extern crate serde_json;

#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate rocket;
extern crate rocket_contrib;

#[macro_use]
extern crate slog;
extern crate slog_scope;
extern crate slog_stdlog;
extern crate slog_term;

extern crate chrono;
extern crate fnv;
extern crate itertools;
extern crate rand;
extern crate regex;
extern crate uuid;

extern crate percent_encoding;
extern crate reqwest;
extern crate scraper;

extern crate data_encoding;

extern crate aes;
extern crate cfb_mode;
extern crate ring;

extern crate crossbeam;

#[macro_use]
mod base;

mod api;
mod app;
mod cache;
mod config;
mod crypto;
mod database;
mod logging;
mod server;
mod streaming;
mod util;
mod youtube;

use app::App;

fn main() {
	let app = App::get();
	server::launch(app);
}
