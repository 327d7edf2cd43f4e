use std::path::PathBuf;
use std::sync::Arc;

use historian::bus::InProcessBus;
use historian::database::fjall::FjallDatabase;
use historian::pool::SubscriptionPool;
use historian::provider::DatabaseProvider;
use historian::watch_group::GroupConfig;

/// Wires up one `DatabaseProvider` over a single `FjallDatabase`-backed
/// store and leaves it running. Everything that actually drives this
/// engine — the DSA link connection, the node action tree, config file
/// I/O — is a host application's job; this binary only demonstrates the
/// composition those hosts are expected to perform.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    historian::trace::init();

    let data_dir: PathBuf = std::env::var("HISTORIAN_DATA_DIR")
        .unwrap_or_else(|_| "./historian-data".to_string())
        .into();
    std::fs::create_dir_all(&data_dir)?;

    let bus = Arc::new(InProcessBus::new());
    let pool = SubscriptionPool::new(bus);
    let provider = DatabaseProvider::new(pool, move || FjallDatabase::open(&data_dir));

    provider
        .create_group("default", GroupConfig::default())
        .await?;
    tracing::info!("historian ready: group \"default\" is live");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
