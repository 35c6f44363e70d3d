//! Relay service: accept senders, decode frames, render them.
//!
//! One connection is handled at a time. Each connection carries a single
//! frame; the sender closes it once the payload is written. A connection
//! that does not finish within the read timeout is dropped unrendered.
//!
//! ```text
//!   accept ─► AwaitingHeader ─► AwaitingPayload ─► Rendering ─► Closed
//!                  │                   │
//!               bad JSON           EOF early
//!                  ▼                   ▼
//!            Closed (no render)   Rendering (label only)
//! ```

use std::cell::RefCell;
use std::net::SocketAddr;
use std::rc::Rc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use nowplaying_core::{FrameCodec, MAX_HEADER_LEN, MAX_PAYLOAD_LEN, NowPlayingError, read_frame};

use crate::screen::{CONNECTED_TEXT, RelayScreen};
use crate::ui::DisplayToolkit;

// ── ServiceSettings ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Address to listen on (IP:port).
    pub listen_address: String,
    /// How often the idle loop reports in while no sender is connected.
    pub idle_interval: Duration,
    /// Largest `image_len` accepted from a sender.
    pub max_payload_len: usize,
    /// Deadline for one connection to deliver its frame.
    pub read_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0:32150".into(),
            idle_interval: Duration::from_secs(100),
            max_payload_len: MAX_PAYLOAD_LEN,
            read_timeout: Duration::from_secs(5),
        }
    }
}

// ── RelayService ─────────────────────────────────────────────────

pub struct RelayService<D: DisplayToolkit> {
    listener: TcpListener,
    screen: Rc<RefCell<RelayScreen<D>>>,
    settings: ServiceSettings,
}

impl<D: DisplayToolkit> RelayService<D> {
    /// Bind the listening socket. The screen is shared with the owner.
    pub async fn bind(
        settings: ServiceSettings,
        screen: Rc<RefCell<RelayScreen<D>>>,
    ) -> Result<Self, NowPlayingError> {
        let listener = TcpListener::bind(settings.listen_address.as_str()).await?;
        Ok(Self {
            listener,
            screen,
            settings,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NowPlayingError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve senders until `shutdown` fires. A connection in progress is
    /// dropped on shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        match self.listener.local_addr() {
            Ok(addr) => {
                info!("relay listening on {addr}");
                self.screen
                    .borrow_mut()
                    .set_status(&format!("Listening on {addr}"));
            }
            Err(e) => warn!("listener has no local address: {e}"),
        }

        let period = self.settings.idle_interval.max(Duration::from_millis(1));
        let mut idle = tokio::time::interval_at(Instant::now() + period, period);
        idle.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let accept = tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = idle.tick() => {
                    debug!("relay idle, waiting for senders");
                    continue;
                }
                result = self.listener.accept() => result,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };

            info!("sender connected from {peer}");
            self.screen.borrow_mut().set_status(CONNECTED_TEXT);

            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("dropping connection from {peer}");
                    break;
                }
                served = tokio::time::timeout(self.settings.read_timeout, self.serve(stream, peer)) => {
                    if served.is_err() {
                        warn!(
                            "{peer} sent no complete frame within {:?}, dropping",
                            self.settings.read_timeout
                        );
                    }
                }
            }
        }

        info!("relay service stopped");
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn serve(&self, stream: TcpStream, peer: SocketAddr) {
        let codec = FrameCodec::with_limits(MAX_HEADER_LEN, self.settings.max_payload_len);
        match read_frame(stream, codec).await {
            Ok(Some(frame)) => {
                if frame.is_truncated() {
                    warn!(
                        "{peer} closed after {} of {} payload bytes",
                        frame.payload.len(),
                        frame.message.image_len
                    );
                }
                debug!("frame from {peer}: {}", frame.header_text);
                self.screen.borrow_mut().render(&frame);
            }
            Ok(None) => debug!("{peer} closed without sending"),
            Err(e) => warn!("discarding frame from {peer}: {e}"),
        }
    }
}
