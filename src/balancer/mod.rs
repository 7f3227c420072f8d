//! Traffic-dispatching load balancer
//!
//! - Periodic health probing over a fixed backend pool
//! - Least-forwarded-bytes backend selection
//! - Streaming reverse proxy with per-backend traffic accounting

pub mod health;
pub mod proxy;

pub use health::{HealthChecker, HttpHealthChecker};
pub use proxy::{Balancer, HttpRequestSender, RequestSender};
