//! On-device UI toolkit interface.
//!
//! The relay drives the display through a small retained-mode widget
//! API: a screen holds child widgets, labels carry text, image widgets
//! show a raw RGB565 surface. Widgets are addressed by [`WidgetId`]
//! handles owned by the toolkit; a destroyed id must not be reused.
//!
//! Toolkits are driven from a single thread and need not be `Send`.

use std::fmt;

use nowplaying_core::NowPlayingError;

/// Opaque handle to a widget owned by a [`DisplayToolkit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(pub u32);

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Raw image source: `width × height` RGB565 pixels, little-endian,
/// row-major, no header.
#[derive(Debug, Clone, Copy)]
pub struct ImageSource<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

impl ImageSource<'_> {
    /// Bytes a source of this size must carry.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 2
    }
}

/// Widget operations the relay needs from the device's UI library.
pub trait DisplayToolkit {
    fn create_screen(&mut self) -> Result<WidgetId, NowPlayingError>;

    fn create_label(&mut self, parent: WidgetId) -> Result<WidgetId, NowPlayingError>;

    fn set_text(&mut self, label: WidgetId, text: &str) -> Result<(), NowPlayingError>;

    fn create_image(&mut self, parent: WidgetId) -> Result<WidgetId, NowPlayingError>;

    /// Attach pixel data to an image widget. The toolkit copies what it
    /// needs; `source` is not retained.
    fn set_source(&mut self, image: WidgetId, source: ImageSource<'_>)
    -> Result<(), NowPlayingError>;

    /// Center `widget` within its parent.
    fn center(&mut self, widget: WidgetId) -> Result<(), NowPlayingError>;

    /// Destroy `widget` and release its surface.
    fn destroy(&mut self, widget: WidgetId) -> Result<(), NowPlayingError>;

    /// Remove every child of `screen`.
    fn clean(&mut self, screen: WidgetId) -> Result<(), NowPlayingError>;

    /// Make `screen` the visible one.
    fn load_screen(&mut self, screen: WidgetId) -> Result<(), NowPlayingError>;

    /// Push pending changes to the panel. Called after each render.
    fn flush(&mut self) -> Result<(), NowPlayingError> {
        Ok(())
    }
}
