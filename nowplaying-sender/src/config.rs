//! Sender configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nowplaying_core::{DEFAULT_HEIGHT, DEFAULT_WIDTH, NormalizeOptions};

/// Top-level configuration for the sender.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Thumbnail canvas settings.
    pub image: ImageConfig,
    /// Local preview of the raw album art.
    pub preview: PreviewConfig,
    /// Logging.
    pub logging: LoggingConfig,
}

/// Network settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Relay display address (IP:port).
    pub relay_address: String,
    /// Connect + write timeout in milliseconds.
    pub timeout_ms: u64,
}

/// Thumbnail canvas settings. Must match the relay's display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    /// Scale art smaller than the canvas up to fill it.
    pub allow_upscale: bool,
}

/// Preview output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Write the latest raw thumbnail here. Empty disables the preview.
    pub path: String,
}

/// Logging.
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
            relay_address: "127.0.0.1:32150".into(),
            timeout_ms: 2000,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            allow_upscale: false,
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

impl SenderConfig {
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

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.network.timeout_ms.max(1))
    }

    /// Canvas settings for the thumbnail normalizer.
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            width: self.image.width.max(1),
            height: self.image.height.max(1),
            allow_upscale: self.image.allow_upscale,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
