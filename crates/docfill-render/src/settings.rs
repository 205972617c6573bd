//! Engine locations and time limits

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for the rendering engines, as read from the `[render]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// One-shot engine binary
    pub soffice: PathBuf,
    /// Client used to talk to a running listener
    pub unoconvert: PathBuf,
    pub daemon_host: String,
    pub daemon_port: u16,
    /// Try the listener before falling back to a one-shot run
    pub use_daemon: bool,
    /// Hard limit for PDF and HTML conversions
    pub timeout_secs: u64,
    /// Hard limit for normalization re-saves
    pub normalize_timeout_secs: u64,
    /// TCP connect timeout when probing the listener
    pub probe_timeout_ms: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            soffice: PathBuf::from("soffice"),
            unoconvert: PathBuf::from("unoconvert"),
            daemon_host: "127.0.0.1".to_string(),
            daemon_port: 2003,
            use_daemon: true,
            timeout_secs: 60,
            normalize_timeout_secs: 30,
            probe_timeout_ms: 500,
        }
    }
}

impl RenderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn normalize_timeout(&self) -> Duration {
        Duration::from_secs(self.normalize_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
