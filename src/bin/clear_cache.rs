use anyhow::Result;
use std::sync::Arc;

use teneo_bootstrap::cache::{Cache, MemoryCache, RedisCache, StorageKeys};
use teneo_bootstrap::config::Config;

/// Drops the cached solution config and location so the next bootstrap refetches them
#[tokio::main]
async fn main() -> Result<()> {
    // Minimal stderr tracing
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load();
    let keys = StorageKeys::new(config.storage.storage_key.clone());

    let cache: Arc<dyn Cache> = match config.storage.backend.as_str() {
        "redis" => Arc::new(RedisCache::new_with_config(&config).await?),
        other => {
            tracing::warn!("Cache backend '{}' is not persistent - nothing to clear", other);
            Arc::new(MemoryCache::new())
        }
    };

    for key in [keys.config(), keys.location()] {
        if cache.exists(&key).await? {
            cache.delete(&key).await?;
            tracing::info!("Deleted {}", key);
        } else {
            tracing::info!("{} not cached", key);
        }
    }

    Ok(())
}
