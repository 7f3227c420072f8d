//! Backend selection and request forwarding
//!
//! The balancer keeps a fixed pool, a probed healthy subset, and a
//! per-backend counter of forwarded response-body bytes. Selection picks
//! the healthy backend with the least traffic; forwarding streams the
//! upstream body to the client, counting the bytes as they pass.

use crate::balancer::health::{HealthChecker, PROBE_INTERVAL};
use crate::common::{BalancerConfig, Error, Result};
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures::TryStreamExt;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Process-wide HTTP client used by the default sender.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

/// Response header naming the backend that served a request.
pub const TRACE_HEADER: &str = "lb-from";

/// Dispatches an already-built upstream request.
#[async_trait::async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, req: reqwest::Request) -> Result<reqwest::Response>;
}

/// Default sender backed by the process-wide client.
pub struct HttpRequestSender;

#[async_trait::async_trait]
impl RequestSender for HttpRequestSender {
    async fn send(&self, req: reqwest::Request) -> Result<reqwest::Response> {
        HTTP_CLIENT
            .execute(req)
            .await
            .map_err(|e| Error::Upstream(e.to_string()))
    }
}

struct PoolState {
    healthy: Vec<String>,
    traffic: HashMap<String, u64>,
}

/// Least-traffic reverse proxy over a fixed backend pool.
pub struct Balancer {
    pool: Vec<String>,
    state: Arc<RwLock<PoolState>>,
    checker: Arc<dyn HealthChecker>,
    sender: Arc<dyn RequestSender>,
    config: BalancerConfig,
}

impl Balancer {
    /// All backends start out healthy; the prober corrects the list on its
    /// first round.
    pub fn new(
        pool: Vec<String>,
        checker: Arc<dyn HealthChecker>,
        sender: Arc<dyn RequestSender>,
        config: BalancerConfig,
    ) -> Self {
        let state = PoolState {
            healthy: pool.clone(),
            traffic: HashMap::new(),
        };
        Self {
            pool,
            state: Arc::new(RwLock::new(state)),
            checker,
            sender,
            config,
        }
    }

    fn scheme(&self) -> &'static str {
        if self.config.use_https {
            "https"
        } else {
            "http"
        }
    }

    /// Healthy backend with the least forwarded bytes; ties go to the one
    /// encountered first in healthy-list order.
    pub fn choose_backend(&self) -> Option<String> {
        let state = self.state.read().unwrap();
        let mut best: Option<(&String, u64)> = None;
        for addr in &state.healthy {
            let traffic = state.traffic.get(addr).copied().unwrap_or(0);
            if best.map_or(true, |(_, least)| traffic < least) {
                best = Some((addr, traffic));
            }
        }
        best.map(|(addr, _)| addr.clone())
    }

    /// One probe round over the whole pool; the healthy list is swapped in
    /// atomically under the write lock.
    pub async fn probe_all(&self) {
        let mut healthy = Vec::with_capacity(self.pool.len());
        for addr in &self.pool {
            let ok = self.checker.check(addr, self.config.use_https).await;
            tracing::info!("backend {} is {}", addr, if ok { "healthy" } else { "unhealthy" });
            if ok {
                healthy.push(addr.clone());
            }
        }
        self.state.write().unwrap().healthy = healthy;
    }

    /// Probe loop; runs until the process exits.
    pub async fn run_health_checks(self: Arc<Self>) {
        loop {
            tokio::time::sleep(PROBE_INTERVAL).await;
            tracing::debug!("starting health check round");
            self.probe_all().await;
        }
    }

    /// Forward a request to `dst`, streaming the response back and counting
    /// streamed body bytes into the backend's traffic counter.
    pub async fn forward(&self, dst: &str, req: Request) -> Result<Response> {
        let (parts, body) = req.into_parts();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}://{}{}", self.scheme(), dst, path_and_query);
        let target: reqwest::Url = url
            .parse()
            .map_err(|e| Error::Upstream(format!("bad upstream url {:?}: {}", url, e)))?;

        let mut fwd = reqwest::Request::new(parts.method, target);
        // The Host header is derived from the rewritten URL.
        let mut headers = parts.headers;
        headers.remove(header::HOST);
        *fwd.headers_mut() = headers;
        *fwd.timeout_mut() = Some(self.config.timeout);

        let body = axum::body::to_bytes(body, usize::MAX)
            .await
            .map_err(|e| Error::BadRequest(format!("failed to read request body: {}", e)))?;
        if !body.is_empty() {
            *fwd.body_mut() = Some(reqwest::Body::from(body));
        }

        let upstream = match self.sender.send(fwd).await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!("failed to get response from {}: {}", dst, e);
                return Err(e);
            }
        };

        let status = upstream.status();
        tracing::info!("fwd {} {}", status.as_u16(), url);

        let mut builder = Response::builder().status(status);
        if let Some(response_headers) = builder.headers_mut() {
            for (name, value) in upstream.headers() {
                response_headers.append(name.clone(), value.clone());
            }
            if self.config.trace {
                match HeaderValue::from_str(dst) {
                    Ok(value) => {
                        response_headers.insert(TRACE_HEADER, value);
                    }
                    Err(e) => tracing::warn!("invalid trace header value {:?}: {}", dst, e),
                }
            }
        }

        let state = self.state.clone();
        let backend = dst.to_string();
        let counted = upstream.bytes_stream().inspect_ok(move |chunk| {
            let mut state = state.write().unwrap();
            *state.traffic.entry(backend.clone()).or_insert(0) += chunk.len() as u64;
        });

        builder
            .body(Body::from_stream(counted))
            .map_err(|e| Error::Internal(format!("failed to build response: {}", e)))
    }
}

async fn handle(State(balancer): State<Arc<Balancer>>, req: Request) -> Response {
    let Some(backend) = balancer.choose_backend() else {
        let err = Error::NoHealthyBackends;
        return (err.to_http_status(), err.to_string()).into_response();
    };
    match balancer.forward(&backend, req).await {
        Ok(resp) => resp,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Router proxying every path and method through the balancer.
pub fn create_router(balancer: Arc<Balancer>) -> Router {
    Router::new().fallback(handle).with_state(balancer)
}
