//! Relay display configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nowplaying_core::{DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_PAYLOAD_LEN};

use crate::service::ServiceSettings;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Display panel settings.
    pub display: DisplayConfig,
    /// Service loop tuning.
    pub service: ServiceConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to accept senders on (IP:port).
    pub listen_address: String,
}

/// Display panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: u32,
    pub height: u32,
    /// Write a PNG of the screen here after every update. Empty disables.
    pub snapshot_path: String,
}

/// Service loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Seconds between idle reports while no sender is connected.
    pub idle_interval_secs: u64,
    /// Largest image payload accepted, in bytes.
    pub max_payload_len: usize,
    /// Seconds a sender gets to deliver one frame.
    pub read_timeout_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:32150".into(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            snapshot_path: String::new(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            idle_interval_secs: 100,
            max_payload_len: MAX_PAYLOAD_LEN,
            read_timeout_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl RelayConfig {
    /// Load from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write default config to a file.
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Settings for [`RelayService`](crate::service::RelayService).
    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            listen_address: self.network.listen_address.clone(),
            idle_interval: Duration::from_secs(self.service.idle_interval_secs.max(1)),
            max_payload_len: self.service.max_payload_len,
            read_timeout: Duration::from_secs(self.service.read_timeout_secs.max(1)),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&RelayConfig::default()).unwrap();
        assert!(text.contains("listen_address"));
        assert!(text.contains("idle_interval_secs"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: RelayConfig = toml::from_str("[display]\nsnapshot_path = \"screen.png\"\n").unwrap();
        assert_eq!(cfg.display.snapshot_path, "screen.png");
        assert_eq!((cfg.display.width, cfg.display.height), (320, 240));

        let settings = cfg.service_settings();
        assert_eq!(settings.listen_address, "0.0.0.0:32150");
        assert_eq!(settings.idle_interval, Duration::from_secs(100));
        assert_eq!(settings.max_payload_len, MAX_PAYLOAD_LEN);
        assert_eq!(settings.read_timeout, Duration::from_secs(5));
    }

    #[test]
    fn write_then_load() {
        let path = std::env::temp_dir().join(format!("np-relay-{}.toml", std::process::id()));
        RelayConfig::write_default(&path).unwrap();
        let cfg = RelayConfig::load(&path);
        assert_eq!(cfg.logging.level, "info");
        let _ = std::fs::remove_file(&path);
    }
}
