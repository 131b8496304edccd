//! Realtime node entry point
//!
//! Run with:
//! ```bash
//! cargo run -p realtime-service --bin realtime-node
//! ```
//!
//! Configuration is loaded from environment variables.

use realtime_common::{try_init_tracing, try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // .env may set APP_ENV, so load it before choosing the log format
    let _ = dotenvy::dotenv();
    let production = std::env::var("APP_ENV").is_ok_and(|env| env.eq_ignore_ascii_case("production"));

    let init = if production {
        try_init_tracing_with_config(TracingConfig::production())
    } else {
        try_init_tracing()
    };
    if let Err(e) = init {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    if let Err(e) = run().await {
        error!(error = %e, "Realtime node failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    info!("Starting realtime node...");

    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(env = ?config.app.env, name = %config.app.name, "Configuration loaded");

    realtime_service::node::run(config).await
}
