//! Reference remote cache server.
//!
//! Serves the REST protocol spoken by `RemoteHttpCache` from an in-memory
//! store. See [`cache_relay::config`] for environment variables.

use cache_relay::{config, server, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_from_env()?;
    telemetry::init(&config.log_level, &config.log_format);
    config.print_summary();

    server::run(config).await
}
