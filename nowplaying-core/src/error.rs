//! Error types for the now-playing relay.
//!
//! All fallible operations return `Result<T, NowPlayingError>`.
//! Every variant is recoverable: callers log and carry on with the next
//! playback event or the next connection.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type shared by sender and relay.
#[derive(Debug, Error)]
pub enum NowPlayingError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// The frame header could not be parsed or violated framing rules.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The declared `image_len` does not match the payload handed to the encoder.
    #[error("payload length mismatch: header declares {declared}, payload has {actual}")]
    PayloadMismatch { declared: usize, actual: usize },

    /// A header or payload exceeded the configured codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    // ── Image Errors ─────────────────────────────────────────────
    /// The thumbnail bytes could not be decoded as an image.
    #[error("thumbnail decode error: {0}")]
    Decode(#[from] image::ImageError),

    /// Packed pixel data does not fit the requested surface.
    #[error("render error: {0}")]
    Render(String),

    // ── Connection Errors ────────────────────────────────────────
    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    // ── Serialization Errors ─────────────────────────────────────
    /// JSON encoding or decoding of the header failed.
    #[error("header json error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Source Errors ────────────────────────────────────────────
    /// The OS media-session API failed or has no active session.
    #[error("media source error: {0}")]
    Source(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for NowPlayingError {
    fn from(s: String) -> Self {
        NowPlayingError::Other(s)
    }
}

impl From<&str> for NowPlayingError {
    fn from(s: &str) -> Self {
        NowPlayingError::Other(s.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for NowPlayingError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        NowPlayingError::Timeout(Duration::ZERO)
    }
}

impl NowPlayingError {
    /// Shorthand for a protocol violation.
    pub fn protocol(msg: impl Into<String>) -> Self {
        NowPlayingError::Protocol(msg.into())
    }

    /// Shorthand for a media-source failure.
    pub fn source(msg: impl Into<String>) -> Self {
        NowPlayingError::Source(msg.into())
    }
}
