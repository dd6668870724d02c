//! pwa-relay entry point.
//!
//! Boots the worker and serves host events on stdio. Logging goes to stderr
//! so it never interleaves with replies on stdout.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

use pwa_relay_client::Worker;
use pwa_relay_core::AppConfig;

mod error;
mod handler;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        cache = %config.cache_version,
        origin = %config.origin,
        db = %config.db_path.display(),
        "starting pwa-relay on stdio"
    );

    let worker = Arc::new(Worker::from_config(&config).await?);
    handler::serve(worker, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("pwa-relay stopped");
    Ok(())
}
