//! HTTP surface for the store
//!
//! GET /db/:key returns the record as JSON; POST /db/:key appends a value.

use crate::common::Error;
use crate::store::Store;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared store state for HTTP handlers.
#[derive(Clone)]
pub struct DbState {
    pub store: Arc<Store>,
}

#[derive(Serialize)]
struct GetResponse {
    key: String,
    value: String,
}

#[derive(Deserialize)]
struct PutRequest {
    value: String,
}

async fn get_key(State(state): State<DbState>, Path(key): Path<String>) -> Response {
    match state.store.get(&key) {
        Ok(value) => (StatusCode::OK, Json(GetResponse { key, value })).into_response(),
        Err(e) => {
            if !matches!(e, Error::NotFound(_)) {
                tracing::error!("get {:?} failed: {}", key, e);
            }
            (e.to_http_status(), e.to_string()).into_response()
        }
    }
}

async fn put_key(State(state): State<DbState>, Path(key): Path<String>, body: Bytes) -> Response {
    let req: PutRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("bad request: {}", e)).into_response()
        }
    };
    match state.store.put(key, req.value).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => {
            tracing::error!("put failed: {}", e);
            (e.to_http_status(), e.to_string()).into_response()
        }
    }
}

/// Router exposing the store at /db/:key.
pub fn create_router(state: DbState) -> Router {
    Router::new()
        .route("/db/:key", get(get_key).post(put_key))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tempfile::tempdir;
    use tower::ServiceExt;

    fn test_app(dir: &std::path::Path) -> Router {
        let store = Arc::new(Store::open(dir, 1024).unwrap());
        create_router(DbState { store })
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let dir = tempdir().unwrap();
        let app = test_app(dir.path());

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/db/greeting")
                    .body(Body::from(r#"{"value":"hello"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/db/greeting")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["key"], "greeting");
        assert_eq!(json["value"], "hello");
    }

    #[tokio::test]
    async fn test_get_missing_returns_404() {
        let dir = tempdir().unwrap();
        let app = test_app(dir.path());

        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/db/absent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_returns_400() {
        let dir = tempdir().unwrap();
        let app = test_app(dir.path());

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/db/key")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
