//! # Transparency Log Hub
//!
//! Accepts signed security-event tokens over HTTP and commits each one to a
//! verifiable Merkle log.
//!
//! ## Environment
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `TL_CONFIG` | TOML configuration file |
//! | `TL_LISTEN_ADDR` | Gateway socket address |
//! | `TL_AUDIENCE` | Required `aud` value |
//! | `TL_STORAGE` | `memory` or `rocksdb` |
//! | `TL_DATA_DIR` | Storage directory |
//! | `TL_SIGNING_KEY` | Tree head signing key (hex) |
//! | `TL_CLIENTS_FILE` | Client registrations (JSON) |
//! | `TL_QUEUE_CAPACITY` | Ingestion queue size |
//! | `TL_RETRY_AFTER_SECS` | `Retry-After` on 429 |
//! | `RUST_LOG` | Log filter (default `info`) |

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tl_runtime::config::HubConfig;
use tl_runtime::HubRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = HubConfig::load().context("failed to load configuration")?;

    let runtime = HubRuntime::start(config).await?;
    info!(addr = %runtime.local_addr(), "Hub is running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;

    let stats = runtime.shutdown().await;
    info!(
        persisted = stats.persisted,
        duplicates = stats.duplicates,
        failures = stats.failures,
        "Hub stopped"
    );

    Ok(())
}
