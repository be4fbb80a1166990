use std::path::PathBuf;
use std::time::Instant;

use crate::config::ServerConfig;

/// Main server state shared across all handlers
pub struct AppState {
    pub config: ServerConfig,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn figures_directory(&self) -> PathBuf {
        self.config.figures_directory()
    }
}
