//! Load balancer: health-probed pool, least-traffic selection, streaming
//! forwarder.

use anyhow::Result;
use clap::Parser;
use segkv::balancer::proxy::create_router;
use segkv::balancer::{Balancer, HttpHealthChecker, HttpRequestSender};
use segkv::common::BalancerConfig;
use std::sync::Arc;
use std::time::Duration;

/// Static backend pool; the prober derives the live subset.
const SERVERS_POOL: [&str; 3] = ["server1:8080", "server2:8080", "server3:8080"];

#[derive(Parser, Debug)]
#[command(name = "segkv-lb")]
#[command(about = "segkv load balancer")]
struct Args {
    /// Load balancer port
    #[arg(long, default_value_t = 8090)]
    port: u16,

    /// Request timeout in seconds
    #[arg(long = "timeout-sec", default_value_t = 3)]
    timeout_sec: u64,

    /// Whether backends support HTTPS
    #[arg(long)]
    https: bool,

    /// Whether to include tracing information in responses
    #[arg(long)]
    trace: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = BalancerConfig {
        port: args.port,
        timeout: Duration::from_secs(args.timeout_sec),
        use_https: args.https,
        trace: args.trace,
    };
    config.validate()?;

    let pool: Vec<String> = SERVERS_POOL.iter().map(|s| s.to_string()).collect();
    let checker = Arc::new(HttpHealthChecker::new(config.timeout));
    let balancer = Arc::new(Balancer::new(
        pool,
        checker,
        Arc::new(HttpRequestSender),
        config.clone(),
    ));

    tokio::spawn(balancer.clone().run_health_checks());

    tracing::info!("starting load balancer on port {}", config.port);
    tracing::info!("tracing support enabled: {}", config.trace);

    let app = create_router(balancer);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    axum::serve(listener, app).await?;
    Ok(())
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
