//! RGB565 pixel packing.
//!
//! The relay display takes 16-bit pixels: 5 bits red, 6 bits green,
//! 5 bits blue, stored little-endian (low byte first).
//!
//! ```text
//!  bit: 15 ─── 11 10 ──── 5 4 ──── 0
//!       │  red  │  green   │  blue │
//! ```

// ── Rgb565 ───────────────────────────────────────────────────────

/// A single packed 5-6-5 pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    /// Bytes occupied by one packed pixel on the wire.
    pub const BYTES: usize = 2;

    /// Quantize an 8-bit-per-channel colour.
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let r5 = (r >> 3) as u16 & 0x1F;
        let g6 = (g >> 2) as u16 & 0x3F;
        let b5 = (b >> 3) as u16 & 0x1F;
        Self((r5 << 11) | (g6 << 5) | b5)
    }

    /// Expand back to 8 bits per channel.
    ///
    /// Each channel is reconstructed at the centre of its quantization
    /// bucket, so the result is within half a step of any source colour
    /// that packed to this value (±4 for red/blue, ±2 for green).
    pub const fn to_rgb(self) -> [u8; 3] {
        let r5 = ((self.0 >> 11) & 0x1F) as u8;
        let g6 = ((self.0 >> 5) & 0x3F) as u8;
        let b5 = (self.0 & 0x1F) as u8;
        [(r5 << 3) | 0x04, (g6 << 2) | 0x02, (b5 << 3) | 0x04]
    }

    pub const fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }

    pub const fn from_le_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_le_bytes(bytes))
    }
}

// ── Buffers ──────────────────────────────────────────────────────

/// Pack a tightly-packed RGB888 buffer into little-endian RGB565.
///
/// Output is exactly two bytes per input pixel. A trailing partial
/// triple is ignored.
pub fn pack_rgb565(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * Rgb565::BYTES);
    for px in rgb.chunks_exact(3) {
        out.extend_from_slice(&Rgb565::from_rgb(px[0], px[1], px[2]).to_le_bytes());
    }
    out
}

/// Expand a little-endian RGB565 buffer to RGB888.
pub fn unpack_rgb565(packed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packed.len() / Rgb565::BYTES * 3);
    for px in packed.chunks_exact(Rgb565::BYTES) {
        out.extend_from_slice(&Rgb565::from_le_bytes([px[0], px[1]]).to_rgb());
    }
    out
}
