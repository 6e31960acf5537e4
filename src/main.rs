use std::path::Path;
use std::process;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use streaming_backend::config::AppConfig;
use streaming_backend::database::Database;
use streaming_backend::web;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config_file = match std::env::args_os().nth(1) {
        Some(path) => path,
        None => {
            error!("usage: streaming-backend <config.toml>");
            process::exit(2);
        }
    };
    let config = match AppConfig::load(Path::new(&config_file)) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "error reading config");
            process::exit(1);
        }
    };

    // The blocking postgres client must not be created inside the runtime.
    let database = match Database::open(&config.database) {
        Ok(database) => database,
        Err(e) => {
            error!(error = %e, "error opening database");
            process::exit(1);
        }
    };
    let rocket = match web::rocket(&config, database) {
        Ok(rocket) => rocket,
        Err(e) => {
            error!(error = %e, "startup failed");
            process::exit(1);
        }
    };

    info!("starting server");
    if let Err(e) = rocket::execute(rocket.launch()) {
        error!(error = %e, "server error");
        process::exit(1);
    }
}
