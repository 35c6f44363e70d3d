//! # nowplaying-core
//!
//! Shared protocol library for the now-playing display relay.
//!
//! This crate contains:
//! - **Pixel**: `Rgb565` packing of RGB888 rasters (little-endian)
//! - **Thumbnail**: decode, aspect-fit and letterbox album art into a
//!   fixed display canvas
//! - **Message**: `NowPlayingMessage` header model and frame encoding
//! - **Codec**: `FrameCodec` for framed TCP I/O via `tokio_util`
//! - **Error**: `NowPlayingError`, a `thiserror`-based error hierarchy

pub mod codec;
pub mod error;
pub mod message;
pub mod pixel;
pub mod thumbnail;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::{FrameCodec, MAX_HEADER_LEN, MAX_PAYLOAD_LEN, read_frame};
pub use error::NowPlayingError;
pub use message::{Frame, HEADER_TERMINATOR, NowPlayingMessage, PlaybackStatus, encode_frame};
pub use pixel::{Rgb565, pack_rgb565, unpack_rgb565};
pub use thumbnail::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, NormalizeOptions, PackedImage, canvas_len, normalize,
};
