//! # segkv
//!
//! A small distributed-service exercise in two cooperating processes:
//!
//! - **Store**: a log-structured key-value store with append-only segment
//!   files, in-memory indexes, a single mutation executor, rollover,
//!   compaction, and crash recovery, served over HTTP.
//! - **Load balancer**: a reverse proxy over a health-probed backend
//!   pool, picking the backend with the least forwarded bytes and
//!   streaming responses through with per-backend traffic accounting.
//!
//! ## Architecture
//!
//! ```text
//! client ──► segkv-lb ──► segkv-backend ──► segkv-db ──► current-data<N>
//!            (selector +   (LB target,       (segment     segment files
//!             forwarder)    KV client)        engine)
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the store node
//! segkv-db --port 8083 --dir ./db-data
//!
//! # Start a backend
//! segkv-backend --port 8080 --db-url http://localhost:8083
//!
//! # Start the load balancer
//! segkv-lb --port 8090 --timeout-sec 3 --trace
//! ```

pub mod balancer;
pub mod common;
pub mod store;

// Re-export commonly used types
pub use balancer::Balancer;
pub use common::{Error, Result};
pub use store::Store;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
