//! Configuration for segkv components

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Store node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// HTTP port
    #[serde(default = "default_store_port")]
    pub port: u16,

    /// Directory holding segment files
    pub dir: PathBuf,

    /// Per-segment size budget in bytes; exceeding it rolls the active
    /// segment over
    #[serde(default = "default_segment_size")]
    pub segment_size: u64,
}

fn default_store_port() -> u16 {
    8083
}
fn default_segment_size() -> u64 {
    1024 * 1024
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            port: default_store_port(),
            dir: PathBuf::from("./db-data"),
            segment_size: default_segment_size(),
        }
    }
}

impl StoreConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.dir.as_os_str().is_empty() {
            return Err(crate::Error::InvalidConfig("data directory is required".into()));
        }
        if self.segment_size == 0 {
            return Err(crate::Error::InvalidConfig("segment size must be positive".into()));
        }
        Ok(())
    }
}

/// Load balancer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalancerConfig {
    /// HTTP port
    #[serde(default = "default_lb_port")]
    pub port: u16,

    /// Per-request forwarding timeout; health probes reuse it
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Whether backends speak HTTPS
    #[serde(default)]
    pub use_https: bool,

    /// Whether to stamp responses with the serving backend
    #[serde(default)]
    pub trace: bool,
}

fn default_lb_port() -> u16 {
    8090
}
fn default_timeout() -> Duration {
    Duration::from_secs(3)
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            port: default_lb_port(),
            timeout: default_timeout(),
            use_https: false,
            trace: false,
        }
    }
}

impl BalancerConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.timeout.is_zero() {
            return Err(crate::Error::InvalidConfig("timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Backend application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// HTTP port
    #[serde(default = "default_backend_port")]
    pub port: u16,

    /// Base URL of the store node
    #[serde(default = "default_db_url")]
    pub db_url: String,
}

fn default_backend_port() -> u16 {
    8080
}
fn default_db_url() -> String {
    "http://db:8083".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            port: default_backend_port(),
            db_url: default_db_url(),
        }
    }
}

impl BackendConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.db_url.is_empty() {
            return Err(crate::Error::InvalidConfig("store URL is required".into()));
        }
        Ok(())
    }
}
