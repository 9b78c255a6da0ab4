use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use teneo_bootstrap::config::Config;
use teneo_bootstrap::{BootstrapContext, Setup};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only the settings document
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();

    let config = Arc::new(Config::load());

    let page_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("TENEO_PAGE_URL").ok())
        .context("usage: teneo-bootstrap <page-url> (or set TENEO_PAGE_URL)")?;

    let ctx = BootstrapContext::from_config(config, &page_url).await?;
    let settings = Setup::new(ctx).init().await?;

    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
