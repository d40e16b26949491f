pub mod schema;

pub use schema::{ConnectionConfig, FeederConfig, ViewerConfig};

use std::path::{Path, PathBuf};
use viewer_core::{Result, ViewerError};

/// Load configuration from a TOML file.  Returns `ViewerConfig::default()` if
/// the file doesn't exist so the viewer always has sensible defaults.
pub fn load(path: impl AsRef<Path>) -> Result<ViewerConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(ViewerConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| ViewerError::Config(format!("cannot read '{}': {e}", path.display())))?;

    parse(&raw)
}

/// Parse configuration from TOML text.
pub fn parse(raw: &str) -> Result<ViewerConfig> {
    toml::from_str(raw).map_err(|e| ViewerError::Config(format!("TOML parse error: {e}")))
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("telemetry-viewer").join("viewer.toml")
}
