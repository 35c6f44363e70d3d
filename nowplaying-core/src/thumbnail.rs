//! Album-art normalisation for the relay display.
//!
//! Decodes an arbitrary compressed thumbnail, fits it inside the target
//! canvas without distorting its aspect ratio, pads the remainder with
//! black and packs the result as RGB565.
//!
//! ```text
//!   200×100 PNG ──► fit 200×100 ──► pad to 320×240 ──► 153600 bytes
//!                     (no upscale)   (60px / 70px)      (RGB565 LE)
//! ```

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::error::NowPlayingError;
use crate::pixel::{pack_rgb565, Rgb565};

/// Default canvas width of the relay display.
pub const DEFAULT_WIDTH: u32 = 320;
/// Default canvas height of the relay display.
pub const DEFAULT_HEIGHT: u32 = 240;

// ── NormalizeOptions ─────────────────────────────────────────────

/// Target canvas and resampling policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub width: u32,
    pub height: u32,
    /// Scale small sources up to fill the box. Off by default: small art
    /// is centered at its native size.
    pub allow_upscale: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            allow_upscale: false,
        }
    }
}

// ── PackedImage ──────────────────────────────────────────────────

/// An RGB565 canvas ready for the wire.
///
/// Produced once per refresh and moved into the transport; never shared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PackedImage {
    /// Wrap an already-packed buffer, checking it covers `width × height`.
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self, NowPlayingError> {
        let expected = canvas_len(width, height)?;
        if data.len() != expected {
            return Err(NowPlayingError::PayloadMismatch {
                declared: expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }
}

/// Byte length of a packed `width × height` canvas.
pub fn canvas_len(width: u32, height: u32) -> Result<usize, NowPlayingError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(Rgb565::BYTES))
        .ok_or_else(|| NowPlayingError::Render(format!("canvas {width}x{height} overflows")))
}

// ── Geometry ─────────────────────────────────────────────────────

/// Size of `src` after fitting it inside `bounds` with its aspect ratio kept.
///
/// Sources already inside the box are left alone unless `allow_upscale`.
pub fn fit_within(src: (u32, u32), bounds: (u32, u32), allow_upscale: bool) -> (u32, u32) {
    let (w, h) = src;
    let (bw, bh) = bounds;
    if w == 0 || h == 0 {
        return (0, 0);
    }
    if !allow_upscale && w <= bw && h <= bh {
        return (w, h);
    }

    let scale = f64::min(bw as f64 / w as f64, bh as f64 / h as f64);
    let nw = ((w as f64 * scale).round() as u32).clamp(1, bw.max(1));
    let nh = ((h as f64 * scale).round() as u32).clamp(1, bh.max(1));
    (nw, nh)
}

/// Top-left offset that centers `inner` on `outer`.
pub fn letterbox_offset(inner: (u32, u32), outer: (u32, u32)) -> (u32, u32) {
    (
        outer.0.saturating_sub(inner.0) / 2,
        outer.1.saturating_sub(inner.1) / 2,
    )
}

// ── Normalisation ────────────────────────────────────────────────

/// Normalize compressed thumbnail bytes into a packed display canvas.
///
/// Returns `Ok(None)` for empty input. The returned image is always
/// exactly `opts.width × opts.height`.
pub fn normalize(
    bytes: &[u8],
    opts: &NormalizeOptions,
) -> Result<Option<PackedImage>, NowPlayingError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    if opts.width == 0 || opts.height == 0 {
        return Err(NowPlayingError::Render(format!(
            "target canvas {}x{} is empty",
            opts.width, opts.height
        )));
    }

    let source = image::load_from_memory(bytes)?.to_rgb8();
    let canvas = letterbox(&source, opts);
    let packed = pack_rgb565(canvas.as_raw());

    debug!(
        "normalized {}x{} thumbnail to {}x{} ({} bytes RGB565)",
        source.width(),
        source.height(),
        opts.width,
        opts.height,
        packed.len()
    );

    PackedImage::new(packed, opts.width, opts.height).map(Some)
}

/// Fit `source` into the target box and center it on a black canvas.
pub fn letterbox(source: &RgbImage, opts: &NormalizeOptions) -> RgbImage {
    let target = (opts.width, opts.height);
    let (fw, fh) = fit_within(source.dimensions(), target, opts.allow_upscale);

    let fitted = if (fw, fh) == source.dimensions() {
        source.clone()
    } else {
        imageops::resize(source, fw, fh, FilterType::CatmullRom)
    };
    if (fw, fh) == target {
        return fitted;
    }

    let (x, y) = letterbox_offset((fw, fh), target);
    let mut canvas = RgbImage::new(opts.width, opts.height);
    imageops::replace(&mut canvas, &fitted, x as i64, y as i64);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(w: u32, h: u32, colour: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(w, h, Rgb(colour));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn pixel_at(packed: &PackedImage, x: u32, y: u32) -> u16 {
        let i = ((y * packed.width() + x) as usize) * 2;
        let b = packed.as_bytes();
        u16::from_le_bytes([b[i], b[i + 1]])
    }

    #[test]
    fn empty_input_is_no_image() {
        assert!(normalize(&[], &NormalizeOptions::default()).unwrap().is_none());
    }

    #[test]
    fn corrupt_input_is_decode_error() {
        let err = normalize(b"definitely not a png", &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, NowPlayingError::Decode(_)));
    }

    #[test]
    fn canvas_is_always_target_size() {
        for (w, h) in [(200, 100), (1000, 1000), (320, 240), (17, 300), (640, 480)] {
            let out = normalize(&png_bytes(w, h, [255, 255, 255]), &NormalizeOptions::default())
                .unwrap()
                .unwrap();
            assert_eq!((out.width(), out.height()), (320, 240));
            assert_eq!(out.len(), 320 * 240 * 2, "source {w}x{h}");
        }

        let opts = NormalizeOptions {
            width: 128,
            height: 64,
            allow_upscale: true,
        };
        let out = normalize(&png_bytes(50, 50, [1, 2, 3]), &opts).unwrap().unwrap();
        assert_eq!(out.len(), 128 * 64 * 2);
    }

    #[test]
    fn fit_never_upscales_by_default() {
        assert_eq!(fit_within((100, 100), (320, 240), false), (100, 100));
        assert_eq!(fit_within((200, 100), (320, 240), false), (200, 100));
        assert_eq!(fit_within((640, 480), (320, 240), false), (320, 240));
        assert_eq!(fit_within((1000, 500), (320, 240), false), (320, 160));
    }

    #[test]
    fn fit_with_upscale_fills_shorter_axis() {
        assert_eq!(fit_within((100, 100), (320, 240), true), (240, 240));
        assert_eq!(letterbox_offset((240, 240), (320, 240)), (40, 0));
    }

    #[test]
    fn square_upscaled_is_pillarboxed_evenly() {
        let opts = NormalizeOptions {
            allow_upscale: true,
            ..Default::default()
        };
        let out = normalize(&png_bytes(100, 100, [255, 255, 255]), &opts)
            .unwrap()
            .unwrap();

        let white = Rgb565::from_rgb(255, 255, 255).0;
        // 40px black on each side, image between.
        assert_eq!(pixel_at(&out, 0, 120), 0);
        assert_eq!(pixel_at(&out, 39, 120), 0);
        assert_eq!(pixel_at(&out, 41, 120), white);
        assert_eq!(pixel_at(&out, 278, 120), white);
        assert_eq!(pixel_at(&out, 280, 120), 0);
        assert_eq!(pixel_at(&out, 319, 120), 0);
        // Full height is covered.
        assert_eq!(pixel_at(&out, 160, 0), white);
        assert_eq!(pixel_at(&out, 160, 239), white);
    }

    #[test]
    fn small_image_centered_at_native_size() {
        let out = normalize(&png_bytes(200, 100, [255, 255, 255]), &NormalizeOptions::default())
            .unwrap()
            .unwrap();
        let white = Rgb565::from_rgb(255, 255, 255).0;
        // Offset is (60, 70).
        assert_eq!(pixel_at(&out, 59, 120), 0);
        assert_eq!(pixel_at(&out, 60, 120), white);
        assert_eq!(pixel_at(&out, 259, 120), white);
        assert_eq!(pixel_at(&out, 260, 120), 0);
        assert_eq!(pixel_at(&out, 160, 69), 0);
        assert_eq!(pixel_at(&out, 160, 70), white);
        assert_eq!(pixel_at(&out, 160, 169), white);
        assert_eq!(pixel_at(&out, 160, 170), 0);
    }

    #[test]
    fn packed_image_checks_length() {
        assert!(PackedImage::new(vec![0; 8], 2, 2).is_ok());
        assert!(matches!(
            PackedImage::new(vec![0; 7], 2, 2),
            Err(NowPlayingError::PayloadMismatch { declared: 8, actual: 7 })
        ));
    }
}
