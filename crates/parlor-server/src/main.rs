//! Parlor server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: game on 127.0.0.1:8080, admin on 127.0.0.1:8081
//! parlor-server
//!
//! # With a config document and overridden bind address
//! parlor-server --config config.json --bind 0.0.0.0:8080
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use parlor_core::MemoryDatabase;
use parlor_server::{Config, GameServer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Parlor game session server
#[derive(Parser, Debug)]
#[command(name = "parlor-server")]
#[command(about = "Room-based game session server")]
#[command(version)]
struct Args {
    /// Path to the JSON configuration document
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the game listener address
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.http_address = bind;
    }

    // Durable persistence is a collaborator; this build ships the in-memory
    // façade, so the postgres section of the config is informational only.
    tracing::warn!("persistence is in-memory; game records will not survive a restart");
    let db = Arc::new(MemoryDatabase::new());

    let server = GameServer::bind(config, db).await?;
    tracing::info!("parlor server starting on {}", server.local_addr()?);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, shutting down");
            shutdown.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
