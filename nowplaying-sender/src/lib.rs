//! # nowplaying-sender — Now-Playing Sender
//!
//! Runs on the **host** machine. Watches the OS media session for
//! title/artist/album/status changes, normalizes the album art to the
//! relay's RGB565 canvas, and pushes one frame per change to the relay
//! display over a short-lived TCP connection.

pub mod config;
pub mod media;
pub mod observer;
pub mod transport;

#[cfg(target_os = "windows")]
pub mod winrt;

use std::sync::Arc;

use nowplaying_core::NowPlayingError;

use crate::media::MediaSessionManager;

/// The media-session backend for the current platform.
#[cfg(target_os = "windows")]
pub fn platform_manager() -> Result<Arc<dyn MediaSessionManager>, NowPlayingError> {
    Ok(Arc::new(winrt::WindowsMediaManager))
}

/// The media-session backend for the current platform.
#[cfg(not(target_os = "windows"))]
pub fn platform_manager() -> Result<Arc<dyn MediaSessionManager>, NowPlayingError> {
    Err(NowPlayingError::source(
        "media session monitoring is only supported on Windows",
    ))
}
