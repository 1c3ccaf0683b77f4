//! Frame container and overlay drawing.
//!
//! - `Frame`: owned RGB image plus the instant it was captured.
//! - `FrameState`: per-session transient state carried across loop iterations.
//! - `annotate`: draws detection boxes onto a frame for display.
//!
//! Frames are never persisted by the pipeline. The snapshot writer in `ui` is
//! the only path that writes pixels, and only when explicitly configured.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};
use std::time::Instant;

use crate::detect::{BBox, Detection};
use crate::hazard::HazardClassifier;
use crate::metrics::FrameMetrics;

const HAZARD_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const OTHER_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: u32 = 2;

// ----------------------------------------------------------------------------
// Frame
// ----------------------------------------------------------------------------

/// One decoded video frame (RGB24).
pub struct Frame {
    image: RgbImage,
    captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Instant::now(),
        }
    }

    /// Wrap a packed RGB24 buffer. Fails when the length does not match.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer does not fit {}x{}", width, height))?;
        Ok(Self::new(image))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Replace pixels, keeping the capture instant.
    pub(crate) fn map_image(self, f: impl FnOnce(RgbImage) -> RgbImage) -> Self {
        Self {
            image: f(self.image),
            captured_at: self.captured_at,
        }
    }
}

// ----------------------------------------------------------------------------
// FrameState: loop-local state for one session
// ----------------------------------------------------------------------------

/// Transient state of the processing loop.
///
/// `last_detections` and `last_metrics` survive skipped frames so the display
/// keeps showing the most recent processed result instead of dropping to zero.
#[derive(Default)]
pub struct FrameState {
    /// 1-based index of the most recently read frame.
    pub frame_index: u64,
    /// Number of frames that went through the detector.
    pub processed: u64,
    pub last_detections: Vec<Detection>,
    pub last_metrics: FrameMetrics,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance to the next frame and return its index.
    pub fn advance(&mut self) -> u64 {
        self.frame_index += 1;
        self.frame_index
    }
}

// ----------------------------------------------------------------------------
// Overlay
// ----------------------------------------------------------------------------

/// Draw detection boxes onto `frame`.
///
/// Hazard boxes are always drawn in red. Other boxes are drawn in white only
/// when `debug` is set. Returns the number of boxes drawn.
pub fn annotate(
    frame: &mut Frame,
    detections: &[Detection],
    classifier: &HazardClassifier,
    debug: bool,
) -> usize {
    let mut drawn = 0;
    for det in detections {
        let hazard = classifier.is_hazard(det);
        if !hazard && !debug {
            continue;
        }
        let color = if hazard { HAZARD_COLOR } else { OTHER_COLOR };
        draw_box(frame.image_mut(), &det.bbox, color, BOX_THICKNESS);
        log::trace!("overlay: {}", det.caption());
        drawn += 1;
    }
    drawn
}

fn draw_box(image: &mut RgbImage, bbox: &BBox, color: Rgb<u8>, thickness: u32) {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return;
    }
    let b = bbox.clamped(w - 1, h - 1);
    let (x1, y1, x2, y2) = (b.x1 as u32, b.y1 as u32, b.x2 as u32, b.y2 as u32);
    if x2 < x1 || y2 < y1 {
        return;
    }
    for t in 0..thickness {
        for x in x1..=x2 {
            put(image, x, y1.saturating_add(t), color);
            put(image, x, y2.saturating_sub(t), color);
        }
        for y in y1..=y2 {
            put(image, x1.saturating_add(t), y, color);
            put(image, x2.saturating_sub(t), y, color);
        }
    }
}

fn put(image: &mut RgbImage, x: u32, y: u32, color: Rgb<u8>) {
    if x < image.width() && y < image.height() {
        image.put_pixel(x, y, color);
    }
}
