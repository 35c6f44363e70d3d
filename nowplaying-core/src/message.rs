//! Now-playing message model and frame encoding.
//!
//! ## Wire format
//!
//! ```text
//! {"status":"Playing","title":"…","artist":"…","album":"…","image_len":N,"width":W,"height":H}\n
//! <N bytes RGB565, row-major, little-endian>
//! ```
//!
//! The header is compact JSON. JSON string escaping turns any newline
//! inside a title or artist into the two characters `\n`, so the only raw
//! `0x0A` byte in a header is its terminator.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::NowPlayingError;
use crate::thumbnail::{DEFAULT_HEIGHT, DEFAULT_WIDTH, PackedImage};

/// Byte that terminates the JSON header.
pub const HEADER_TERMINATOR: u8 = b'\n';

// ── PlaybackStatus ───────────────────────────────────────────────

/// Playback state reported by the media session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
    /// Anything the session reports that is not one of the above
    /// (opened, changing, closed) or an unrecognised wire value.
    #[default]
    #[serde(other)]
    Unknown,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackStatus::Playing => write!(f, "Playing"),
            PlaybackStatus::Paused => write!(f, "Paused"),
            PlaybackStatus::Stopped => write!(f, "Stopped"),
            PlaybackStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

// ── NowPlayingMessage ────────────────────────────────────────────

/// One snapshot of playback state, serialized as the frame header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NowPlayingMessage {
    pub status: PlaybackStatus,
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Number of payload bytes following the header.
    pub image_len: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for NowPlayingMessage {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Unknown,
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            image_len: 0,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl NowPlayingMessage {
    /// Metadata-only message with the default canvas size.
    pub fn new(
        status: PlaybackStatus,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
    ) -> Self {
        Self {
            status,
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            ..Default::default()
        }
    }

    /// Nominal canvas size carried when no image follows.
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Describe `image` in the header: length and canvas dimensions.
    pub fn with_image(mut self, image: &PackedImage) -> Self {
        self.image_len = image.len();
        self.width = image.width();
        self.height = image.height();
        self
    }

    /// Payload size a complete image of this canvas would have.
    pub fn expected_image_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|px| px.checked_mul(2))
    }

    /// Serialize the header line, terminator included.
    pub fn encode_header(&self) -> Result<Vec<u8>, NowPlayingError> {
        let mut line = serde_json::to_vec(self)?;
        line.push(HEADER_TERMINATOR);
        Ok(line)
    }

    /// Parse a header line. A trailing terminator and `\r` are tolerated.
    pub fn decode_header(line: &[u8]) -> Result<Self, NowPlayingError> {
        let line = line.strip_suffix(&[HEADER_TERMINATOR]).unwrap_or(line);
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        serde_json::from_slice(line)
            .map_err(|e| NowPlayingError::protocol(format!("malformed header: {e}")))
    }
}

/// Build a complete frame: header line followed by `payload`.
///
/// `message.image_len` must match `payload.len()`.
pub fn encode_frame(message: &NowPlayingMessage, payload: &[u8]) -> Result<Bytes, NowPlayingError> {
    if message.image_len != payload.len() {
        return Err(NowPlayingError::PayloadMismatch {
            declared: message.image_len,
            actual: payload.len(),
        });
    }
    let header = message.encode_header()?;
    let mut buf = BytesMut::with_capacity(header.len() + payload.len());
    buf.put_slice(&header);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

// ── Frame ────────────────────────────────────────────────────────

/// A decoded frame as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message: NowPlayingMessage,
    /// Payload bytes received; shorter than `image_len` when truncated.
    pub payload: Bytes,
    /// The header line as received, without terminator.
    pub header_text: String,
}

impl Frame {
    /// The peer closed before `image_len` bytes arrived.
    pub fn is_truncated(&self) -> bool {
        self.payload.len() < self.message.image_len
    }

    /// Payload covers the whole `width × height` canvas.
    pub fn has_full_canvas(&self) -> bool {
        !self.payload.is_empty()
            && self
                .message
                .expected_image_len()
                .is_some_and(|n| n == self.payload.len())
    }

    /// Two-line label: title then artist. Falls back to the raw header
    /// when both are absent.
    pub fn label_text(&self) -> String {
        let m = &self.message;
        if m.title.is_empty() && m.artist.is_empty() {
            self.header_text.clone()
        } else {
            format!("{}\n{}", m.title, m.artist)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_field_order_and_shape() {
        let mut msg = NowPlayingMessage::new(PlaybackStatus::Playing, "Song A", "Artist A", "");
        msg.image_len = 153_600;
        let header = msg.encode_header().unwrap();
        assert_eq!(
            header,
            b"{\"status\":\"Playing\",\"title\":\"Song A\",\"artist\":\"Artist A\",\"album\":\"\",\"image_len\":153600,\"width\":320,\"height\":240}\n"
        );
    }

    #[test]
    fn newline_in_title_is_escaped() {
        let msg = NowPlayingMessage::new(PlaybackStatus::Paused, "Line1\nLine2", "", "");
        let header = msg.encode_header().unwrap();
        let raw_newlines = header.iter().filter(|&&b| b == HEADER_TERMINATOR).count();
        assert_eq!(raw_newlines, 1);
        assert_eq!(*header.last().unwrap(), HEADER_TERMINATOR);

        let back = NowPlayingMessage::decode_header(&header).unwrap();
        assert_eq!(back.title, "Line1\nLine2");
    }

    #[test]
    fn missing_fields_take_defaults() {
        let msg = NowPlayingMessage::decode_header(br#"{"title":"Only"}"#).unwrap();
        assert_eq!(msg.title, "Only");
        assert_eq!(msg.status, PlaybackStatus::Unknown);
        assert_eq!(msg.image_len, 0);
        assert_eq!((msg.width, msg.height), (320, 240));
    }

    #[test]
    fn unknown_status_maps_to_unknown() {
        let msg = NowPlayingMessage::decode_header(br#"{"status":"CHANGING"}"#).unwrap();
        assert_eq!(msg.status, PlaybackStatus::Unknown);
    }

    #[test]
    fn malformed_header_is_protocol_error() {
        let err = NowPlayingMessage::decode_header(b"not json\n").unwrap_err();
        assert!(matches!(err, NowPlayingError::Protocol(_)));
    }

    #[test]
    fn encode_frame_rejects_length_mismatch() {
        let mut msg = NowPlayingMessage::default();
        msg.image_len = 10;
        let err = encode_frame(&msg, &[0u8; 4]).unwrap_err();
        assert!(matches!(
            err,
            NowPlayingError::PayloadMismatch { declared: 10, actual: 4 }
        ));
    }

    #[test]
    fn encode_frame_appends_payload_after_terminator() {
        let mut msg = NowPlayingMessage::default();
        msg.image_len = 3;
        let frame = encode_frame(&msg, &[7, 8, 9]).unwrap();
        assert_eq!(&frame[frame.len() - 4..], &[b'\n', 7, 8, 9]);
    }

    #[test]
    fn label_prefers_title_and_artist() {
        let frame = Frame {
            message: NowPlayingMessage::new(PlaybackStatus::Playing, "Song A", "Artist A", "X"),
            payload: Bytes::new(),
            header_text: "{}".into(),
        };
        assert_eq!(frame.label_text(), "Song A\nArtist A");

        let bare = Frame {
            message: NowPlayingMessage::default(),
            payload: Bytes::new(),
            header_text: r#"{"status":"Stopped"}"#.into(),
        };
        assert_eq!(bare.label_text(), r#"{"status":"Stopped"}"#);
    }

    #[test]
    fn full_canvas_detection() {
        let mut msg = NowPlayingMessage::default().with_canvas(2, 2);
        msg.image_len = 8;
        let full = Frame {
            message: msg.clone(),
            payload: Bytes::from(vec![0u8; 8]),
            header_text: String::new(),
        };
        assert!(full.has_full_canvas());
        assert!(!full.is_truncated());

        let short = Frame {
            payload: Bytes::from(vec![0u8; 5]),
            ..full
        };
        assert!(!short.has_full_canvas());
        assert!(short.is_truncated());
    }
}
