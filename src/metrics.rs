//! Per-frame display metrics.

use std::time::{Duration, Instant};

use crate::detect::Detection;

/// Values republished after each processed frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameMetrics {
    pub object_count: usize,
    /// Highest detection confidence, 0.0 when nothing was detected.
    pub max_confidence: f32,
    pub fps: f32,
}

impl FrameMetrics {
    pub fn from_detections(detections: &[Detection], fps: f32) -> Self {
        let max_confidence = detections
            .iter()
            .map(|d| d.confidence)
            .filter(|c| c.is_finite())
            .fold(0.0f32, f32::max);
        Self {
            object_count: detections.len(),
            max_confidence,
            fps: fps.max(0.0),
        }
    }
}

/// Frames per second for one interval. A zero interval yields 0.
pub fn fps_from_interval(interval: Duration) -> f32 {
    let secs = interval.as_secs_f32();
    if secs > 0.0 {
        1.0 / secs
    } else {
        0.0
    }
}

/// Instantaneous FPS between consecutive processed frames.
#[derive(Debug, Default)]
pub struct FpsMeter {
    last: Option<Instant>,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed frame at `now`. The first tick reports 0.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let fps = match self.last {
            Some(prev) => fps_from_interval(now.saturating_duration_since(prev)),
            None => 0.0,
        };
        self.last = Some(now);
        fps
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
