//! Playback observer: media-session events in, relay frames out.
//!
//! ```text
//!            start() + session found
//!   Idle ───────────────────────────────► Subscribed
//!    ▲                                        │
//!    └──────────────── stop() ◄───────────────┘
//! ```
//!
//! OS callbacks only enqueue a [`SessionEvent`]. The observer drains the
//! queue on its own scheduler and spawns one refresh per event. Refreshes
//! are independent: two events in quick succession may reach the relay
//! in either order, and a failed refresh never touches the subscription.

use std::sync::Arc;
use std::thread;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use nowplaying_core::{NormalizeOptions, NowPlayingError, NowPlayingMessage, normalize};

use crate::media::{MediaSession, MediaSessionManager, SessionEvent, SessionNotifier, Subscription};
use crate::transport::FrameSender;

// ── ObserverState ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Idle,
    Subscribed,
}

// ── RefreshPipeline ──────────────────────────────────────────────

/// One refresh: read the session, normalize art, send the frame.
#[derive(Debug, Clone)]
pub struct RefreshPipeline {
    sender: FrameSender,
    image: NormalizeOptions,
    preview: Option<mpsc::Sender<Vec<u8>>>,
}

impl RefreshPipeline {
    pub fn new(sender: FrameSender, image: NormalizeOptions) -> Self {
        Self {
            sender,
            image,
            preview: None,
        }
    }

    /// Forward raw thumbnail bytes to a local preview consumer.
    pub fn with_preview(mut self, preview: mpsc::Sender<Vec<u8>>) -> Self {
        self.preview = Some(preview);
        self
    }

    /// Read current state from `session` and send it to the relay.
    ///
    /// Returns the message that was delivered.
    pub async fn refresh(
        &self,
        session: &dyn MediaSession,
    ) -> Result<NowPlayingMessage, NowPlayingError> {
        let props = session.try_get_media_properties().await?;
        let status = session.get_playback_info()?;
        let thumbnail = session.get_thumbnail(&props).await?;

        let image = match thumbnail {
            Some(bytes) => {
                self.emit_preview(&bytes);
                match normalize(&bytes, &self.image) {
                    Ok(image) => image,
                    Err(e) => {
                        warn!("thumbnail unusable, sending without image: {e}");
                        None
                    }
                }
            }
            None => {
                debug!("no thumbnail available");
                None
            }
        };

        let mut message = NowPlayingMessage::new(status, props.title, props.artist, props.album)
            .with_canvas(self.image.width, self.image.height);
        if let Some(image) = &image {
            message = message.with_image(image);
        }

        info!(
            status = %message.status,
            title = %message.title,
            artist = %message.artist,
            image_len = message.image_len,
            "now playing"
        );
        self.sender.send(&message, image).await?;
        Ok(message)
    }

    /// [`refresh`](Self::refresh), logging instead of returning failures.
    pub async fn refresh_logged(&self, session: &dyn MediaSession) {
        if let Err(e) = self.refresh(session).await {
            warn!("refresh failed: {e}");
        }
    }

    fn emit_preview(&self, bytes: &[u8]) {
        if let Some(preview) = &self.preview {
            if let Err(e) = preview.try_send(bytes.to_vec()) {
                debug!("preview dropped: {e}");
            }
        }
    }
}

// ── PlaybackObserver ─────────────────────────────────────────────

pub struct PlaybackObserver {
    manager: Arc<dyn MediaSessionManager>,
    pipeline: Arc<RefreshPipeline>,
    notifier: SessionNotifier,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    session: Option<Arc<dyn MediaSession>>,
    subscription: Option<Subscription>,
}

impl PlaybackObserver {
    pub fn new(manager: Arc<dyn MediaSessionManager>, pipeline: RefreshPipeline) -> Self {
        let (notifier, events) = SessionNotifier::channel();
        Self {
            manager,
            pipeline: Arc::new(pipeline),
            notifier,
            events,
            session: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> ObserverState {
        if self.subscription.is_some() {
            ObserverState::Subscribed
        } else {
            ObserverState::Idle
        }
    }

    /// Subscribe to the current session and push its state once.
    ///
    /// Stays `Idle` when the OS has no active session; there is no retry.
    pub async fn start(&mut self) -> Result<ObserverState, NowPlayingError> {
        if self.subscription.is_some() {
            return Ok(ObserverState::Subscribed);
        }

        let Some(session) = self.manager.request_current_session().await? else {
            info!("no active media session");
            return Ok(ObserverState::Idle);
        };

        let subscription = session.subscribe(self.notifier.clone())?;
        self.subscription = Some(subscription);
        self.session = Some(Arc::clone(&session));
        info!("listening for media property and playback info changes");

        self.pipeline.refresh_logged(session.as_ref()).await;
        Ok(ObserverState::Subscribed)
    }

    /// Unregister callbacks and return to `Idle`. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            info!("media session callbacks released");
        }
        self.session = None;
    }

    /// Start, then turn session events into refreshes until `shutdown`.
    pub async fn run(mut self, shutdown: CancellationToken) {
        match self.start().await {
            Ok(ObserverState::Subscribed) => {}
            Ok(ObserverState::Idle) => return,
            Err(e) => {
                error!("failed to subscribe to media session: {e}");
                return;
            }
        }

        let mut refreshes = JoinSet::new();
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = self.events.recv() => event,
            };
            let Some(event) = event else { break };

            // Reap finished refreshes so the set does not grow.
            while refreshes.try_join_next().is_some() {}

            let Some(session) = self.session.clone() else {
                continue;
            };
            debug!("session event: {event:?}");
            let pipeline = Arc::clone(&self.pipeline);
            refreshes.spawn(async move {
                pipeline.refresh_logged(session.as_ref()).await;
            });
        }

        refreshes.abort_all();
        self.stop();
    }

    /// Run on a dedicated thread with its own single-threaded scheduler.
    pub fn spawn_worker(self, shutdown: CancellationToken) -> std::io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("media-observer".into())
            .spawn(move || {
                #[cfg(target_os = "windows")]
                crate::winrt::init_apartment();

                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(rt) => rt,
                    Err(e) => {
                        error!("failed to build observer runtime: {e}");
                        return;
                    }
                };
                runtime.block_on(self.run(shutdown));
            })
    }
}

impl Drop for PlaybackObserver {
    fn drop(&mut self) {
        self.stop();
    }
}
