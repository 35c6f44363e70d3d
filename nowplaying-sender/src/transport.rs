//! Outbound frame delivery to the relay display.
//!
//! Each message gets its own short-lived TCP connection: connect, write
//! the header line, write the payload, shut down. One deadline bounds the
//! whole exchange. Delivery is at-most-once; a failed send is simply
//! superseded by the next playback event.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use nowplaying_core::{NowPlayingError, NowPlayingMessage, PackedImage};

/// Default connect + write deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Sends frames to a fixed relay address.
#[derive(Debug, Clone)]
pub struct FrameSender {
    address: String,
    timeout: Duration,
}

impl FrameSender {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deliver one frame. `image` is consumed; its length must match
    /// `message.image_len` (zero when `None`).
    pub async fn send(
        &self,
        message: &NowPlayingMessage,
        image: Option<PackedImage>,
    ) -> Result<(), NowPlayingError> {
        let payload = image.map(PackedImage::into_bytes).unwrap_or_default();
        if payload.len() != message.image_len {
            return Err(NowPlayingError::PayloadMismatch {
                declared: message.image_len,
                actual: payload.len(),
            });
        }
        let header = message.encode_header()?;

        tokio::time::timeout(self.timeout, self.deliver(&header, &payload))
            .await
            .map_err(|_| NowPlayingError::Timeout(self.timeout))?
    }

    async fn deliver(&self, header: &[u8], payload: &[u8]) -> Result<(), NowPlayingError> {
        let mut stream = TcpStream::connect(self.address.as_str()).await?;
        stream.set_nodelay(true)?;

        stream.write_all(header).await?;
        debug!("header sent ({} bytes)", header.len());
        if !payload.is_empty() {
            stream.write_all(payload).await?;
            debug!("payload sent ({} bytes)", payload.len());
        }
        stream.shutdown().await?;
        Ok(())
    }
}
