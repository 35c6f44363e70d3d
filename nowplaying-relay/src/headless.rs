//! Headless display: an in-memory framebuffer implementing
//! [`DisplayToolkit`].
//!
//! Image widgets keep their pixels as RGB888; [`compose`] paints the
//! visible screen onto a black canvas of the panel's size. Text is
//! tracked per label but not rasterised. When a snapshot path is set,
//! every [`flush`] writes the composed frame as a PNG.
//!
//! [`compose`]: HeadlessDisplay::compose
//! [`flush`]: DisplayToolkit::flush

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{RgbImage, imageops};
use tracing::debug;

use nowplaying_core::{NowPlayingError, unpack_rgb565};

use crate::ui::{DisplayToolkit, ImageSource, WidgetId};

#[derive(Debug)]
enum WidgetKind {
    Screen,
    Label { text: String },
    Image { pixels: Option<RgbImage> },
}

#[derive(Debug)]
struct Widget {
    kind: WidgetKind,
    parent: Option<WidgetId>,
    position: (i64, i64),
}

impl Widget {
    fn size(&self) -> (u32, u32) {
        match &self.kind {
            WidgetKind::Image { pixels: Some(px) } => px.dimensions(),
            _ => (0, 0),
        }
    }
}

// ── HeadlessDisplay ──────────────────────────────────────────────

#[derive(Debug)]
pub struct HeadlessDisplay {
    width: u32,
    height: u32,
    next_id: u32,
    widgets: BTreeMap<WidgetId, Widget>,
    active: Option<WidgetId>,
    snapshot_path: Option<PathBuf>,
}

impl HeadlessDisplay {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: 1,
            widgets: BTreeMap::new(),
            active: None,
            snapshot_path: None,
        }
    }

    /// Write a PNG of the visible screen to `path` on every flush.
    pub fn with_snapshot(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Number of live widgets, screens included.
    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    pub fn active_screen(&self) -> Option<WidgetId> {
        self.active
    }

    pub fn label_text(&self, label: WidgetId) -> Option<&str> {
        match &self.widgets.get(&label)?.kind {
            WidgetKind::Label { text } => Some(text),
            _ => None,
        }
    }

    /// Live image widgets, in creation order.
    pub fn images(&self) -> Vec<WidgetId> {
        self.widgets
            .iter()
            .filter(|(_, w)| matches!(w.kind, WidgetKind::Image { .. }))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Top-left corner of `widget` within its parent.
    pub fn position(&self, widget: WidgetId) -> Option<(i64, i64)> {
        self.widgets.get(&widget).map(|w| w.position)
    }

    /// Paint the visible screen's images onto a black canvas.
    pub fn compose(&self) -> RgbImage {
        let mut canvas = RgbImage::new(self.width, self.height);
        let Some(screen) = self.active else {
            return canvas;
        };
        for widget in self.widgets.values() {
            if widget.parent != Some(screen) {
                continue;
            }
            if let WidgetKind::Image { pixels: Some(px) } = &widget.kind {
                imageops::overlay(&mut canvas, px, widget.position.0, widget.position.1);
            }
        }
        canvas
    }

    /// Save [`compose`](Self::compose) as a PNG.
    pub fn snapshot(&self, path: &Path) -> Result<(), NowPlayingError> {
        self.compose()
            .save(path)
            .map_err(|e| NowPlayingError::Render(format!("snapshot {}: {e}", path.display())))
    }

    // ── Internal ─────────────────────────────────────────────────

    fn insert(&mut self, kind: WidgetKind, parent: Option<WidgetId>) -> WidgetId {
        let id = WidgetId(self.next_id);
        self.next_id += 1;
        self.widgets.insert(
            id,
            Widget {
                kind,
                parent,
                position: (0, 0),
            },
        );
        id
    }

    fn get_mut(&mut self, id: WidgetId) -> Result<&mut Widget, NowPlayingError> {
        self.widgets
            .get_mut(&id)
            .ok_or_else(|| NowPlayingError::Render(format!("no such widget {id}")))
    }

    fn require_screen(&self, id: WidgetId) -> Result<(), NowPlayingError> {
        match self.widgets.get(&id) {
            Some(Widget {
                kind: WidgetKind::Screen,
                ..
            }) => Ok(()),
            Some(_) => Err(NowPlayingError::Render(format!("{id} is not a screen"))),
            None => Err(NowPlayingError::Render(format!("no such widget {id}"))),
        }
    }

    fn children_of(&self, parent: WidgetId) -> Vec<WidgetId> {
        self.widgets
            .iter()
            .filter(|(_, w)| w.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect()
    }

    fn remove_tree(&mut self, id: WidgetId) {
        for child in self.children_of(id) {
            self.remove_tree(child);
        }
        self.widgets.remove(&id);
        if self.active == Some(id) {
            self.active = None;
        }
    }
}

impl DisplayToolkit for HeadlessDisplay {
    fn create_screen(&mut self) -> Result<WidgetId, NowPlayingError> {
        Ok(self.insert(WidgetKind::Screen, None))
    }

    fn create_label(&mut self, parent: WidgetId) -> Result<WidgetId, NowPlayingError> {
        self.require_screen(parent)?;
        let kind = WidgetKind::Label {
            text: String::new(),
        };
        Ok(self.insert(kind, Some(parent)))
    }

    fn set_text(&mut self, label: WidgetId, text: &str) -> Result<(), NowPlayingError> {
        match &mut self.get_mut(label)?.kind {
            WidgetKind::Label { text: current } => {
                text.clone_into(current);
                Ok(())
            }
            _ => Err(NowPlayingError::Render(format!("{label} is not a label"))),
        }
    }

    fn create_image(&mut self, parent: WidgetId) -> Result<WidgetId, NowPlayingError> {
        self.require_screen(parent)?;
        Ok(self.insert(WidgetKind::Image { pixels: None }, Some(parent)))
    }

    fn set_source(
        &mut self,
        image: WidgetId,
        source: ImageSource<'_>,
    ) -> Result<(), NowPlayingError> {
        if source.data.len() != source.expected_len() {
            return Err(NowPlayingError::Render(format!(
                "image source is {} bytes, {}x{} needs {}",
                source.data.len(),
                source.width,
                source.height,
                source.expected_len()
            )));
        }
        let rgb = RgbImage::from_raw(source.width, source.height, unpack_rgb565(source.data))
            .ok_or_else(|| NowPlayingError::Render("image source has no pixels".into()))?;

        match &mut self.get_mut(image)?.kind {
            WidgetKind::Image { pixels } => {
                *pixels = Some(rgb);
                Ok(())
            }
            _ => Err(NowPlayingError::Render(format!("{image} is not an image"))),
        }
    }

    fn center(&mut self, widget: WidgetId) -> Result<(), NowPlayingError> {
        let (panel_w, panel_h) = (i64::from(self.width), i64::from(self.height));
        let target = self.get_mut(widget)?;
        let (w, h) = target.size();
        target.position = ((panel_w - i64::from(w)) / 2, (panel_h - i64::from(h)) / 2);
        Ok(())
    }

    fn destroy(&mut self, widget: WidgetId) -> Result<(), NowPlayingError> {
        if !self.widgets.contains_key(&widget) {
            return Err(NowPlayingError::Render(format!("no such widget {widget}")));
        }
        self.remove_tree(widget);
        Ok(())
    }

    fn clean(&mut self, screen: WidgetId) -> Result<(), NowPlayingError> {
        self.require_screen(screen)?;
        for child in self.children_of(screen) {
            self.remove_tree(child);
        }
        Ok(())
    }

    fn load_screen(&mut self, screen: WidgetId) -> Result<(), NowPlayingError> {
        self.require_screen(screen)?;
        self.active = Some(screen);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), NowPlayingError> {
        if let Some(path) = &self.snapshot_path {
            self.snapshot(path)?;
            debug!("snapshot written to {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nowplaying_core::Rgb565;

    fn solid(width: u32, height: u32, px: Rgb565) -> Vec<u8> {
        (0..width * height).flat_map(|_| px.to_le_bytes()).collect()
    }

    #[test]
    fn centered_image_is_painted_on_black() {
        let mut d = HeadlessDisplay::new(320, 240);
        let screen = d.create_screen().unwrap();
        d.load_screen(screen).unwrap();
        let img = d.create_image(screen).unwrap();
        let data = solid(100, 100, Rgb565::from_rgb(255, 255, 255));
        let src = ImageSource {
            width: 100,
            height: 100,
            data: &data,
        };
        d.set_source(img, src).unwrap();
        d.center(img).unwrap();

        assert_eq!(d.position(img), Some((110, 70)));
        let frame = d.compose();
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(frame.get_pixel(160, 120).0, [252, 254, 252]);
        assert_eq!(frame.get_pixel(109, 120).0, [0, 0, 0]);
    }

    #[test]
    fn short_source_is_rejected() {
        let mut d = HeadlessDisplay::new(320, 240);
        let screen = d.create_screen().unwrap();
        let img = d.create_image(screen).unwrap();
        let src = ImageSource {
            width: 10,
            height: 10,
            data: &[0u8; 50],
        };
        assert!(matches!(
            d.set_source(img, src),
            Err(NowPlayingError::Render(_))
        ));
    }

    #[test]
    fn destroy_removes_children() {
        let mut d = HeadlessDisplay::new(320, 240);
        let screen = d.create_screen().unwrap();
        d.load_screen(screen).unwrap();
        d.create_label(screen).unwrap();
        d.create_image(screen).unwrap();
        assert_eq!(d.widget_count(), 3);

        d.destroy(screen).unwrap();
        assert_eq!(d.widget_count(), 0);
        assert_eq!(d.active_screen(), None);
        assert!(d.destroy(screen).is_err());
    }

    #[test]
    fn clean_keeps_the_screen() {
        let mut d = HeadlessDisplay::new(320, 240);
        let screen = d.create_screen().unwrap();
        let label = d.create_label(screen).unwrap();
        d.set_text(label, "hello").unwrap();
        assert_eq!(d.label_text(label), Some("hello"));

        d.clean(screen).unwrap();
        assert_eq!(d.widget_count(), 1);
        assert_eq!(d.label_text(label), None);
    }

    #[test]
    fn labels_only_live_on_screens() {
        let mut d = HeadlessDisplay::new(320, 240);
        let screen = d.create_screen().unwrap();
        let label = d.create_label(screen).unwrap();
        assert!(d.create_label(label).is_err());
        assert!(d.set_text(screen, "x").is_err());
    }

    #[test]
    fn flush_writes_snapshot() {
        let path = std::env::temp_dir().join(format!("np-headless-{}.png", std::process::id()));
        let mut d = HeadlessDisplay::new(32, 24).with_snapshot(&path);
        let screen = d.create_screen().unwrap();
        d.load_screen(screen).unwrap();
        d.flush().unwrap();

        let saved = image::open(&path).unwrap().to_rgb8();
        assert_eq!(saved.dimensions(), (32, 24));
        let _ = std::fs::remove_file(&path);
    }
}
