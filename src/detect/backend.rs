use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Object detector backend.
///
/// The pipeline treats the model as an opaque capability: it hands over a
/// frame and a confidence threshold and gets back labelled boxes in frame
/// pixel space. Any implementation with that contract is substitutable.
///
/// Errors are reported to the caller, which treats them as "no detections"
/// for the frame. Backends must not keep the frame beyond the call.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, returning boxes with confidence at or above
    /// `confidence_threshold`.
    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
