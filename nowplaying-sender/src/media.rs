//! OS media-session collaborator interface.
//!
//! The observer talks to the platform only through these traits. Every
//! call is fallible; the async ones may take the OS some time to answer.
//!
//! Change notifications arrive on threads the OS owns. Backends forward
//! them through a [`SessionNotifier`], which only enqueues an event and
//! returns immediately.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use nowplaying_core::{NowPlayingError, PlaybackStatus};

// ── Events ───────────────────────────────────────────────────────

/// A change reported by the active media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    MediaPropertiesChanged,
    PlaybackInfoChanged,
}

/// Thread-safe, non-blocking handle for OS callbacks.
#[derive(Debug, Clone)]
pub struct SessionNotifier {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionNotifier {
    /// Create a notifier and the receiving end the observer drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue `event`. Returns `false` once the observer has gone away.
    pub fn notify(&self, event: SessionEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

// ── Subscription ─────────────────────────────────────────────────

/// Live callback registration. Dropping it unregisters the callbacks.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Unregister now.
    pub fn cancel(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

// ── Properties ───────────────────────────────────────────────────

/// Lazily readable album art.
#[async_trait]
pub trait ThumbnailSource: Send + Sync {
    /// Read the full compressed image.
    async fn read(&self) -> Result<Vec<u8>, NowPlayingError>;
}

/// Thumbnail already held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryThumbnail(pub Vec<u8>);

#[async_trait]
impl ThumbnailSource for InMemoryThumbnail {
    async fn read(&self) -> Result<Vec<u8>, NowPlayingError> {
        Ok(self.0.clone())
    }
}

/// Pull chunks from `next_chunk` until `size` bytes are buffered or a
/// chunk comes back empty. Short chunks do not end the read.
pub fn read_sized<E>(
    size: u64,
    mut next_chunk: impl FnMut() -> Result<Vec<u8>, E>,
) -> Result<Vec<u8>, E> {
    let mut buffer = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
    while (buffer.len() as u64) < size {
        let chunk = next_chunk()?;
        if chunk.is_empty() {
            break;
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer)
}

/// Track metadata as reported by the session.
#[derive(Clone, Default)]
pub struct MediaProperties {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub thumbnail: Option<Arc<dyn ThumbnailSource>>,
}

impl fmt::Debug for MediaProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaProperties")
            .field("title", &self.title)
            .field("artist", &self.artist)
            .field("album", &self.album)
            .field("thumbnail", &self.thumbnail.is_some())
            .finish()
    }
}

// ── Traits ───────────────────────────────────────────────────────

/// One playback source (a player application).
#[async_trait]
pub trait MediaSession: Send + Sync {
    async fn try_get_media_properties(&self) -> Result<MediaProperties, NowPlayingError>;

    fn get_playback_info(&self) -> Result<PlaybackStatus, NowPlayingError>;

    /// Fetch the album art referenced by `props`. `Ok(None)` when absent.
    async fn get_thumbnail(
        &self,
        props: &MediaProperties,
    ) -> Result<Option<Vec<u8>>, NowPlayingError> {
        match &props.thumbnail {
            Some(source) => {
                let bytes = source.read().await?;
                Ok((!bytes.is_empty()).then_some(bytes))
            }
            None => Ok(None),
        }
    }

    /// Register metadata-changed and playback-info-changed callbacks.
    fn subscribe(&self, notifier: SessionNotifier) -> Result<Subscription, NowPlayingError>;
}

/// Entry point to the OS media-session API.
#[async_trait]
pub trait MediaSessionManager: Send + Sync {
    /// The session the OS currently considers active, if any.
    async fn request_current_session(
        &self,
    ) -> Result<Option<Arc<dyn MediaSession>>, NowPlayingError>;
}
