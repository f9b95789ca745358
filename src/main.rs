use anyhow::{Context, Result};
use futures_util::StreamExt;

use bridge_storage::logger::init_tracing;
use bridge_storage::{Storage, StorageConfig, StorageOptions};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = StorageConfig::from_env().context("Failed to load storage configuration")?;
    let options = StorageOptions::default().with_reconnect(config.reconnect);

    let storage = Storage::open(config.connection, options)
        .await
        .context("Failed to open storage")?;

    tracing::info!(
        uri = %storage.uri().redacted(),
        models = storage.models().len(),
        "storage ready"
    );

    let mut events = Box::pin(storage.events());

    if let Err(err) = storage.ensure_indexes().await {
        tracing::warn!("could not ensure indexes: {err}");
    }

    loop {
        tokio::select! {
            Some(event) = events.next() => {
                tracing::info!(?event, state = %storage.state(), "connection event");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}
