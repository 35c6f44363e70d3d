//! Streaming frame codec for `tokio_util::codec`.
//!
//! Decoding is a two-state machine:
//!
//! ```text
//!  AwaitingHeader ──(\n)──► AwaitingPayload ──(image_len bytes)──► Frame
//!        │                        │
//!     bad JSON                 EOF early
//!        ▼                        ▼
//!      Error             Frame (truncated payload)
//! ```
//!
//! Partial deliveries are accumulated in the read buffer; nothing is
//! guessed when the header fails to parse.

use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, Encoder, FramedRead};

use crate::error::NowPlayingError;
use crate::message::{Frame, HEADER_TERMINATOR, NowPlayingMessage, encode_frame};

/// Longest header line accepted before the terminator.
pub const MAX_HEADER_LEN: usize = 8 * 1024;
/// Largest `image_len` accepted (a 320×240 canvas is 153 600 bytes).
pub const MAX_PAYLOAD_LEN: usize = 4 * 1024 * 1024;

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    AwaitingHeader,
    AwaitingPayload {
        message: NowPlayingMessage,
        header_text: String,
    },
}

/// Codec for `<json>\n<payload>` frames.
#[derive(Debug)]
pub struct FrameCodec {
    state: DecodeState,
    /// Bytes of the current header already searched for the terminator.
    scanned: usize,
    max_header_len: usize,
    max_payload_len: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_limits(MAX_HEADER_LEN, MAX_PAYLOAD_LEN)
    }

    pub fn with_limits(max_header_len: usize, max_payload_len: usize) -> Self {
        Self {
            state: DecodeState::AwaitingHeader,
            scanned: 0,
            max_header_len,
            max_payload_len,
        }
    }

    /// Consume a complete header line from `src`, if one is buffered.
    fn decode_header(&mut self, src: &mut BytesMut) -> Result<bool, NowPlayingError> {
        let start = self.scanned.min(src.len());
        let Some(offset) = src[start..].iter().position(|&b| b == HEADER_TERMINATOR) else {
            if src.len() > self.max_header_len {
                return Err(NowPlayingError::FrameTooLarge {
                    size: src.len(),
                    max: self.max_header_len,
                });
            }
            self.scanned = src.len();
            return Ok(false);
        };

        let end = start + offset;
        if end > self.max_header_len {
            return Err(NowPlayingError::FrameTooLarge {
                size: end,
                max: self.max_header_len,
            });
        }

        let line = src.split_to(end + 1);
        self.scanned = 0;
        let message = NowPlayingMessage::decode_header(&line)?;
        if message.image_len > self.max_payload_len {
            return Err(NowPlayingError::FrameTooLarge {
                size: message.image_len,
                max: self.max_payload_len,
            });
        }

        let header_text = String::from_utf8_lossy(&line[..end])
            .trim_end_matches('\r')
            .to_string();
        src.reserve(message.image_len.saturating_sub(src.len()));
        self.state = DecodeState::AwaitingPayload {
            message,
            header_text,
        };
        Ok(true)
    }

    /// Close out the current frame with whatever payload was gathered.
    fn finish(&mut self, payload: Bytes) -> Option<Frame> {
        match std::mem::take(&mut self.state) {
            DecodeState::AwaitingPayload {
                message,
                header_text,
            } => Some(Frame {
                message,
                payload,
                header_text,
            }),
            DecodeState::AwaitingHeader => None,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = NowPlayingError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if matches!(self.state, DecodeState::AwaitingHeader) && !self.decode_header(src)? {
            return Ok(None);
        }

        let DecodeState::AwaitingPayload { message, .. } = &self.state else {
            return Ok(None);
        };
        let need = message.image_len;
        if src.len() < need {
            return Ok(None);
        }

        let payload = src.split_to(need).freeze();
        Ok(self.finish(payload))
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        match self.state {
            DecodeState::AwaitingHeader if buf.is_empty() => Ok(None),
            DecodeState::AwaitingHeader => {
                let dangling = buf.len();
                buf.clear();
                self.scanned = 0;
                Err(NowPlayingError::protocol(format!(
                    "connection closed inside header ({dangling} bytes without terminator)"
                )))
            }
            DecodeState::AwaitingPayload { .. } => {
                let partial = buf.split().freeze();
                Ok(self.finish(partial))
            }
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = NowPlayingError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let frame = encode_frame(&item.message, &item.payload)?;
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

/// Read one frame from `reader`.
///
/// Returns `Ok(None)` when the peer closes without sending anything.
pub async fn read_frame<R>(reader: R, codec: FrameCodec) -> Result<Option<Frame>, NowPlayingError>
where
    R: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(reader, codec);
    framed.next().await.transpose()
}
