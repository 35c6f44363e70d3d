//! The relay's single screen: one status/track label and at most one
//! album-art image surface.
//!
//! The image slot is owned here. A new image is only created after the
//! previous one has been destroyed, so the device never holds two
//! full-canvas surfaces at once.

use tracing::{debug, warn};

use nowplaying_core::{Frame, NowPlayingError};

use crate::ui::{DisplayToolkit, ImageSource, WidgetId};

/// Label text shown while the service is coming up.
pub const STARTING_TEXT: &str = "Starting...";
/// Label text shown when a sender connects.
pub const CONNECTED_TEXT: &str = "Client connected";

pub struct RelayScreen<D: DisplayToolkit> {
    display: D,
    screen: WidgetId,
    label: WidgetId,
    image: Option<WidgetId>,
}

impl<D: DisplayToolkit> RelayScreen<D> {
    /// Build the screen and label, show "Starting...", and load it.
    ///
    /// On failure the toolkit is handed back with the error, with any
    /// widgets already created destroyed again.
    pub fn create(mut display: D) -> Result<Self, (D, NowPlayingError)> {
        let screen = match display.create_screen() {
            Ok(screen) => screen,
            Err(e) => return Err((display, e)),
        };
        match Self::populate(&mut display, screen) {
            Ok(label) => Ok(Self {
                display,
                screen,
                label,
                image: None,
            }),
            Err(e) => {
                log_failure("destroy screen", display.destroy(screen));
                Err((display, e))
            }
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn label(&self) -> WidgetId {
        self.label
    }

    /// The live image surface, if any.
    pub fn image(&self) -> Option<WidgetId> {
        self.image
    }

    /// Replace the label text. Failures are logged only.
    pub fn set_status(&mut self, text: &str) {
        if let Err(e) = self.display.set_text(self.label, text) {
            warn!("failed to set label: {e}");
        }
        self.flush();
    }

    /// Show `frame`: label always, image only when the payload covers
    /// the whole canvas. A failed image swap is reported on the label.
    pub fn render(&mut self, frame: &Frame) {
        self.set_status(&frame.label_text());

        if frame.payload.is_empty() {
            return;
        }
        if !frame.has_full_canvas() {
            debug!(
                "payload {} of {} bytes, keeping current image",
                frame.payload.len(),
                frame.message.image_len
            );
            return;
        }

        let source = ImageSource {
            width: frame.message.width,
            height: frame.message.height,
            data: &frame.payload,
        };
        if let Err(e) = self.replace_image(source) {
            warn!("image render failed: {e}");
            self.set_status(&format!("Image error: {e}"));
            return;
        }
        self.flush();
    }

    /// Tear down every widget and hand the toolkit back.
    ///
    /// Each step runs even if an earlier one fails.
    pub fn teardown(mut self) -> D {
        if let Some(image) = self.image.take() {
            log_failure("destroy image", self.display.destroy(image));
        }
        log_failure("destroy label", self.display.destroy(self.label));
        log_failure("clean screen", self.display.clean(self.screen));
        log_failure("destroy screen", self.display.destroy(self.screen));
        self.display
    }

    // ── Internal ─────────────────────────────────────────────────

    fn populate(display: &mut D, screen: WidgetId) -> Result<WidgetId, NowPlayingError> {
        let label = display.create_label(screen)?;
        display.set_text(label, STARTING_TEXT)?;
        display.load_screen(screen)?;
        Ok(label)
    }

    fn replace_image(&mut self, source: ImageSource<'_>) -> Result<(), NowPlayingError> {
        if let Some(old) = self.image.take() {
            self.display.destroy(old)?;
        }
        let image = self.display.create_image(self.screen)?;
        self.image = Some(image);
        self.display.set_source(image, source)?;
        self.display.center(image)?;
        debug!("image {}x{} shown as {image}", source.width, source.height);
        Ok(())
    }

    fn flush(&mut self) {
        if let Err(e) = self.display.flush() {
            warn!("display flush failed: {e}");
        }
    }
}

fn log_failure(step: &str, result: Result<(), NowPlayingError>) {
    if let Err(e) = result {
        warn!("{step} failed: {e}");
    }
}
