//! Store node: the segment engine behind its HTTP surface.

use anyhow::Result;
use clap::Parser;
use segkv::common::StoreConfig;
use segkv::store::http::{create_router, DbState};
use segkv::store::Store;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "segkv-db")]
#[command(about = "segkv store node")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 8083)]
    port: u16,

    /// Data directory for segment files
    #[arg(long, default_value = "./db-data")]
    dir: PathBuf,

    /// Segment size budget in bytes
    #[arg(long, default_value_t = 1024 * 1024)]
    segment_size: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = StoreConfig {
        port: args.port,
        dir: args.dir,
        segment_size: args.segment_size,
    };
    config.validate()?;

    tracing::info!("starting store node on port {}", config.port);
    tracing::info!("data directory: {:?}", config.dir);
    tracing::info!("segment size: {} bytes", config.segment_size);

    let store = Arc::new(Store::open(&config.dir, config.segment_size)?);
    let app = create_router(DbState {
        store: store.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close()?;
    tracing::info!("store closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to install shutdown handler: {}", e);
    }
}

fn init_tracing(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
