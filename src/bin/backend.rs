//! Backend application: load balancer target and store client.
//!
//! Serves the probe endpoint, a data endpoint proxied to the store, and a
//! few fixed-size endpoints used by the balancer scenarios. Failure and
//! latency are injectable through environment toggles.

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use clap::Parser;
use segkv::common::BackendConfig;
use serde::Deserialize;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Env toggle forcing /health to report failure.
const CONF_HEALTH_FAILURE: &str = "CONF_HEALTH_FAILURE";
/// Env toggle injecting a response delay (integer seconds in (0, 300)).
const CONF_RESPONSE_DELAY_SEC: &str = "CONF_RESPONSE_DELAY_SEC";

/// Key the seed record is written under at startup.
const SEED_KEY: &str = "segkv";

#[derive(Parser, Debug)]
#[command(name = "segkv-backend")]
#[command(about = "segkv backend application")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Base URL of the store node
    #[arg(long, default_value = "http://db:8083")]
    db_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone)]
struct AppState {
    db_url: String,
    client: reqwest::Client,
    report: Arc<Mutex<Vec<String>>>,
}

#[derive(Deserialize)]
struct DataQuery {
    key: Option<String>,
}

async fn health() -> Response {
    if std::env::var(CONF_HEALTH_FAILURE).as_deref() == Ok("true") {
        (StatusCode::INTERNAL_SERVER_ERROR, "FAILURE").into_response()
    } else {
        (StatusCode::OK, "OK").into_response()
    }
}

async fn maybe_delay() {
    if let Ok(raw) = std::env::var(CONF_RESPONSE_DELAY_SEC) {
        if let Ok(secs) = raw.parse::<u64>() {
            if secs > 0 && secs < 300 {
                tokio::time::sleep(Duration::from_secs(secs)).await;
            }
        }
    }
}

async fn some_data(State(state): State<AppState>, Query(query): Query<DataQuery>) -> Response {
    let Some(key) = query.key else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let url = format!("{}/db/{}", state.db_url, key);
    let resp = match state.client.get(&url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!("store request failed: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if !resp.status().is_success() {
        return resp.status().into_response();
    }

    maybe_delay().await;
    state
        .report
        .lock()
        .unwrap()
        .push(format!("GET /api/v1/some-data?key={}", key));

    match resp.json::<serde_json::Value>().await {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => {
            tracing::error!("store response was not JSON: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Fixed-size endpoint; /some, /some1 and /some2 all land here so the
/// balancer scenarios get equal response sizes.
async fn some(State(state): State<AppState>, uri: Uri) -> Response {
    maybe_delay().await;
    state.report.lock().unwrap().push(format!("GET {}", uri.path()));
    (StatusCode::OK, Json(json!(["1", "2"]))).into_response()
}

async fn report(State(state): State<AppState>) -> Response {
    let entries = state.report.lock().unwrap().clone();
    Json(entries).into_response()
}

/// Write one record at startup so the data path has something to read.
async fn seed_record(state: AppState) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let url = format!("{}/db/{}", state.db_url, SEED_KEY);
    match state
        .client
        .post(&url)
        .json(&json!({ "value": now.to_string() }))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => tracing::info!("seed record written"),
        Ok(resp) => tracing::error!("seed record rejected: {}", resp.status()),
        Err(e) => tracing::error!("seed record failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    let config = BackendConfig {
        port: args.port,
        db_url: args.db_url,
    };
    config.validate()?;

    let state = AppState {
        db_url: config.db_url.clone(),
        client: reqwest::Client::new(),
        report: Arc::new(Mutex::new(Vec::new())),
    };

    let app = Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/v1/some-data", axum::routing::get(some_data))
        .route("/some", axum::routing::get(some))
        .route("/some1", axum::routing::get(some))
        .route("/some2", axum::routing::get(some))
        .route("/report", axum::routing::get(report))
        .with_state(state.clone());

    tokio::spawn(seed_record(state));

    tracing::info!("starting backend on port {}", config.port);
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
