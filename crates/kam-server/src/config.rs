//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use kam::RegistryConfig;

/// Port the trial drivers expect the service on.
pub const DEFAULT_PORT: u16 = 8000;

/// Configuration for the KAM HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// SQLite database file. Parent directories are created on open.
    pub db_path: PathBuf,
    /// Requests with larger bodies are rejected with 413.
    pub max_body_bytes: usize,
    /// Requests running longer are answered with 408.
    pub request_timeout_ms: u64,
    pub registry: RegistryConfig,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            db_path: PathBuf::from("kam.db"),
            max_body_bytes: 64 * 1024,
            request_timeout_ms: 10_000,
            registry: RegistryConfig::default(),
        }
    }
}
