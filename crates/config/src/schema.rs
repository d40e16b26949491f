use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure parsed from `viewer.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Where the viewer connects and how it retries.
    pub connection: ConnectionConfig,
    /// Settings for the bundled metrics source.
    pub feeder: FeederConfig,
}

/// Viewer-side connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// WebSocket endpoint of the metrics source.
    pub url: String,
    /// First delay after a failed dial (milliseconds).
    pub backoff_initial_ms: u64,
    /// Upper bound for the doubling retry delay (milliseconds).
    pub backoff_max_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url:                "ws://localhost:8000".to_string(),
            backoff_initial_ms: 100,
            backoff_max_ms:     5_000,
        }
    }
}

/// Metrics source (feeder) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    /// Socket address the feeder listens on.
    pub listen: String,
    /// CSV file whose first column holds event timestamps in seconds.
    pub data_file: PathBuf,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            listen:    "127.0.0.1:8000".to_string(),
            data_file: PathBuf::from("sample_data.csv"),
        }
    }
}
