//! Server configuration.

use std::path::Path;
use std::time::Duration;

use rallypoint_room::CoordinatorConfig;
use serde::{Deserialize, Serialize};

use crate::RallypointError;

/// Everything the server binary can be configured with.
///
/// Loaded from JSON; every field is optional.
///
/// ```json
/// {
///   "bind_addr": "0.0.0.0:8080",
///   "idle_timeout_secs": 30,
///   "coordinator": { "max_players": 6, "game_duration_secs": 90 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,

    /// A connection that sends nothing for this long is treated as
    /// disconnected. Clients keep it alive with `Heartbeat`.
    pub idle_timeout_secs: u64,

    /// Send an `Error` back for rejected score events instead of dropping
    /// them silently.
    pub report_score_rejections: bool,

    pub coordinator: CoordinatorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            idle_timeout_secs: 15,
            report_score_rejections: false,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_json(json: &str) -> Result<Self, RallypointError> {
        serde_json::from_str(json).map_err(|e| RallypointError::Config(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RallypointError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| RallypointError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.max(1))
    }
}
