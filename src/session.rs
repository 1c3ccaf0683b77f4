//! The watch loop.
//!
//! ```text
//! FrameSource -> Normalizer -> FrameSampler
//!     processed: detect -> classify -> streak -> dispatcher -> metrics -> overlay
//!     skipped:   overlay with the last detections, republish last metrics
//! -> SessionObserver
//! ```
//!
//! The loop is single-threaded and blocking. The stop flag is the only shared
//! item; it is checked at the top of every iteration. The source is released
//! on every exit path, errors included. The debounce streak is left as it was
//! when the stream ends and only cleared when the next run starts.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::alert::{Alert, AlertDispatcher};
use crate::config::{SentinelConfig, SourceSettings};
use crate::debounce::{AlertState, AlertStreak, Banner};
use crate::detect::{Detection, ModelHandle};
use crate::frame::{annotate, Frame, FrameState};
use crate::hazard::HazardClassifier;
use crate::ingest::{FrameSource, Normalizer};
use crate::metrics::{FpsMeter, FrameMetrics};

/// Picks which frames go through the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSampler {
    every_n: u64,
}

impl FrameSampler {
    /// `every_n` is clamped to at least 1.
    pub fn new(every_n: u64) -> Self {
        Self {
            every_n: every_n.max(1),
        }
    }

    /// `index` is 1-based.
    pub fn should_infer(&self, index: u64) -> bool {
        index % self.every_n == 0
    }

    pub fn every_n(&self) -> u64 {
        self.every_n
    }
}

/// What the loop knows after one frame.
#[derive(Clone, Debug)]
pub struct FrameReport {
    /// 1-based index of the frame read from the source.
    pub frame_index: u64,
    /// Whether the detector ran on this frame.
    pub processed: bool,
    /// Detector runs so far, this frame included.
    pub processed_count: u64,
    /// This frame's detections, or the last processed ones on a skipped frame.
    pub detections: Vec<Detection>,
    pub hazardous: bool,
    pub state: AlertState,
    pub banner: Banner,
    pub metrics: FrameMetrics,
    pub alert: Option<Alert>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    StreamEnded,
    Stopped,
    FrameLimit,
}

#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub source: String,
    pub frames_read: u64,
    pub frames_processed: u64,
    pub alerts_fired: u64,
    pub final_state: AlertState,
    pub end_reason: EndReason,
}

/// Presentation hooks. Every frame is reported, processed or not.
pub trait SessionObserver {
    fn on_start(&mut self, _source: &str) {}
    fn on_frame(&mut self, report: &FrameReport, frame: &Frame);
    fn on_finish(&mut self, _summary: &SessionSummary) {}
}

/// Observer that ignores everything.
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn on_frame(&mut self, _report: &FrameReport, _frame: &Frame) {}
}

pub struct Session {
    source_settings: SourceSettings,
    sampler: FrameSampler,
    classifier: HazardClassifier,
    confidence_threshold: f32,
    debug: bool,
    model: ModelHandle,
    streak: AlertStreak,
    dispatcher: AlertDispatcher,
    state: FrameState,
    fps: FpsMeter,
    stop: Arc<AtomicBool>,
    max_frames: Option<u64>,
}

impl Session {
    pub fn new(config: &SentinelConfig, model: ModelHandle, dispatcher: AlertDispatcher) -> Self {
        let det = &config.detection;
        Self {
            source_settings: config.source.clone(),
            sampler: FrameSampler::new(det.infer_every),
            classifier: HazardClassifier::new(&det.hazard_keywords, det.confidence_threshold),
            confidence_threshold: det.confidence_threshold,
            debug: det.debug,
            model,
            streak: AlertStreak::new(config.alert.confirm_streak),
            dispatcher,
            state: FrameState::new(),
            fps: FpsMeter::new(),
            stop: Arc::new(AtomicBool::new(false)),
            max_frames: None,
        }
    }

    /// Load the model and alert sinks named by the configuration.
    pub fn from_config(config: &SentinelConfig) -> Self {
        let model = ModelHandle::load(&config.detection);
        if let Err(err) = model.warm_up() {
            log::warn!("detector warm-up failed: {:#}", err);
        }
        Self::new(config, model, AlertDispatcher::from_settings(&config.alert))
    }

    /// Stop after this many frames have been read.
    pub fn with_max_frames(mut self, max_frames: Option<u64>) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Setting the flag ends the loop before the next frame is read.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn alert_state(&self) -> AlertState {
        self.streak.state()
    }

    pub fn banner(&self) -> Banner {
        if self.state.processed == 0 {
            Banner::Standby
        } else {
            Banner::for_state(self.streak.state(), self.streak.confirm_at())
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Connect, run until the stream ends or the stop flag is set, release.
    pub fn run<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        observer: &mut dyn SessionObserver,
    ) -> Result<SessionSummary> {
        let result = self.run_inner(source, observer);
        source.release();
        let summary = result?;
        log::info!(
            "session: {} ended ({:?}) after {} frames, {} processed, {} alerts, state {:?}",
            summary.source,
            summary.end_reason,
            summary.frames_read,
            summary.frames_processed,
            summary.alerts_fired,
            summary.final_state
        );
        observer.on_finish(&summary);
        Ok(summary)
    }

    fn run_inner<S: FrameSource + ?Sized>(
        &mut self,
        source: &mut S,
        observer: &mut dyn SessionObserver,
    ) -> Result<SessionSummary> {
        self.reset();
        let description = source.describe();
        source
            .connect()
            .with_context(|| format!("failed to open video source {}", description))?;
        let normalizer = Normalizer::for_source(&self.source_settings, source.is_live());
        observer.on_start(&description);

        let end_reason = loop {
            if self.stop.load(Ordering::SeqCst) {
                break EndReason::Stopped;
            }
            if self
                .max_frames
                .is_some_and(|max| self.state.frame_index >= max)
            {
                break EndReason::FrameLimit;
            }
            let Some(frame) = source.next_frame()? else {
                break EndReason::StreamEnded;
            };
            let mut frame = normalizer.apply(frame);
            let index = self.state.advance();

            let report = if self.sampler.should_infer(index) {
                self.process(&frame, index)
            } else {
                self.republish(index)
            };
            annotate(&mut frame, &report.detections, &self.classifier, self.debug);
            observer.on_frame(&report, &frame);
        };

        Ok(SessionSummary {
            source: description,
            frames_read: self.state.frame_index,
            frames_processed: self.state.processed,
            alerts_fired: self.dispatcher.fired(),
            final_state: self.streak.state(),
            end_reason,
        })
    }

    /// Every run starts from a clean loop: streak, counters, last results,
    /// FPS meter and alert cadence.
    fn reset(&mut self) {
        self.streak = AlertStreak::new(self.streak.confirm_at());
        self.state = FrameState::new();
        self.fps.reset();
        self.dispatcher.reset();
    }

    fn process(&mut self, frame: &Frame, index: u64) -> FrameReport {
        let detections = match self.model.detect(frame, self.confidence_threshold) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("detector failed on frame {}: {:#}", index, err);
                Vec::new()
            }
        };
        self.state.processed += 1;
        let processed_count = self.state.processed;

        let hazardous = self.classifier.frame_is_hazardous(&detections);
        let state = self.streak.observe(hazardous);
        let alert = self.dispatcher.on_processed_frame(state, processed_count);

        let fps = self.fps.tick(Instant::now());
        let metrics = FrameMetrics::from_detections(&detections, fps);
        self.state.last_metrics = metrics;
        self.state.last_detections = detections.clone();

        FrameReport {
            frame_index: index,
            processed: true,
            processed_count,
            detections,
            hazardous,
            state,
            banner: Banner::for_state(state, self.streak.confirm_at()),
            metrics,
            alert,
        }
    }

    fn republish(&self, index: u64) -> FrameReport {
        let detections = self.state.last_detections.clone();
        FrameReport {
            frame_index: index,
            processed: false,
            processed_count: self.state.processed,
            hazardous: self.classifier.frame_is_hazardous(&detections),
            detections,
            state: self.streak.state(),
            banner: self.banner(),
            metrics: self.state.last_metrics,
            alert: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_takes_every_nth_frame() {
        let sampler = FrameSampler::new(3);
        let picked: Vec<u64> = (1..=10).filter(|i| sampler.should_infer(*i)).collect();
        assert_eq!(picked, vec![3, 6, 9]);
    }

    #[test]
    fn sampler_of_one_takes_everything() {
        let sampler = FrameSampler::new(0);
        assert_eq!(sampler.every_n(), 1);
        assert!((1..=5).all(|i| sampler.should_infer(i)));
    }

    #[test]
    fn banner_is_standby_before_first_processed_frame() {
        let config = SentinelConfig::default();
        let session = Session::new(
            &config,
            ModelHandle::new(crate::detect::StubBackend::new(), "stub"),
            AlertDispatcher::new(100, 4),
        );
        assert_eq!(session.banner(), Banner::Standby);
        assert_eq!(session.alert_state(), AlertState::Normal);
    }
}
