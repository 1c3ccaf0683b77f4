use std::cell::{Cell, RefCell};
use std::io::Cursor;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use image::RgbImage;

use forest_sentinel::detect::ScriptedBackend;
use forest_sentinel::ingest::SourceStats;
use forest_sentinel::{
    Alert, AlertDispatcher, AlertSink, AlertState, BBox, Banner, Detection, EndReason, Frame,
    FrameReport, FrameSource, ModelHandle, NullObserver, SentinelConfig, Session,
    SessionObserver,
};

/// Yields `total` blank frames, optionally failing at one index.
struct MockSource {
    total: u64,
    read: u64,
    fail_at: Option<u64>,
    live: bool,
    releases: Rc<Cell<u32>>,
}

impl MockSource {
    fn new(total: u64) -> (Self, Rc<Cell<u32>>) {
        let releases = Rc::new(Cell::new(0));
        let source = Self {
            total,
            read: 0,
            fail_at: None,
            live: false,
            releases: releases.clone(),
        };
        (source, releases)
    }
}

impl FrameSource for MockSource {
    fn describe(&self) -> String {
        "mock".into()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.read + 1) {
            return Err(anyhow!("decoder exploded"));
        }
        if self.read >= self.total {
            return Ok(None);
        }
        self.read += 1;
        Ok(Some(Frame::new(RgbImage::new(16, 9))))
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn release(&mut self) {
        self.releases.set(self.releases.get() + 1);
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.read,
            source: self.describe(),
        }
    }
}

#[derive(Default)]
struct Collect {
    reports: Vec<FrameReport>,
    stop_after: Option<(u64, Arc<AtomicBool>)>,
}

impl SessionObserver for Collect {
    fn on_frame(&mut self, report: &FrameReport, _frame: &Frame) {
        self.reports.push(report.clone());
        if let Some((after, flag)) = &self.stop_after {
            if report.frame_index >= *after {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }
}

struct RecordingSink(Rc<RefCell<Vec<u64>>>);

impl AlertSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn fire(&mut self, alert: &Alert) -> Result<()> {
        self.0.borrow_mut().push(alert.processed_index);
        Ok(())
    }
}

fn config(infer_every: u64) -> SentinelConfig {
    let mut cfg = SentinelConfig::default();
    cfg.source.width = 16;
    cfg.source.height = 9;
    cfg.detection.infer_every = infer_every;
    cfg
}

fn fire() -> Vec<Detection> {
    vec![Detection::new("fire", 0.9, BBox::new(1.0, 1.0, 8.0, 6.0))]
}

fn session_with(cfg: &SentinelConfig, script: Vec<Vec<Detection>>) -> Session {
    let model = ModelHandle::new(ScriptedBackend::from_frames(script).looped(true), "script");
    let dispatcher = AlertDispatcher::new(cfg.alert.repeat_interval, cfg.alert.confirm_streak);
    Session::new(cfg, model, dispatcher)
}

#[test]
fn stream_end_releases_source_and_keeps_streak() -> Result<()> {
    let cfg = config(3);
    let mut session = session_with(&cfg, vec![fire()]);
    let (mut source, releases) = MockSource::new(9);

    let summary = session.run(&mut source, &mut NullObserver)?;

    assert_eq!(summary.end_reason, EndReason::StreamEnded);
    assert_eq!(summary.frames_read, 9);
    assert_eq!(summary.frames_processed, 3);
    assert_eq!(summary.final_state, AlertState::Suspect(3));
    assert_eq!(session.alert_state(), AlertState::Suspect(3));
    assert_eq!(releases.get(), 1);
    Ok(())
}

#[test]
fn only_every_third_frame_is_processed_and_skips_republish() -> Result<()> {
    let cfg = config(3);
    let mut session = session_with(&cfg, vec![fire()]);
    let (mut source, _) = MockSource::new(7);
    let mut observer = Collect::default();

    session.run(&mut source, &mut observer)?;

    let processed: Vec<u64> = observer
        .reports
        .iter()
        .filter(|r| r.processed)
        .map(|r| r.frame_index)
        .collect();
    assert_eq!(processed, vec![3, 6]);

    let before = &observer.reports[0];
    assert_eq!(before.banner, Banner::Standby);
    assert_eq!(before.metrics.object_count, 0);

    let third = &observer.reports[2];
    let fourth = &observer.reports[3];
    assert!(!fourth.processed);
    assert_eq!(fourth.metrics, third.metrics);
    assert_eq!(fourth.detections, third.detections);
    assert_eq!(fourth.metrics.object_count, 1);
    assert_eq!(
        fourth.banner,
        Banner::Analyzing {
            streak: 1,
            confirm_at: 4
        }
    );
    Ok(())
}

#[test]
fn alerts_fire_at_most_once_per_hundred_processed_frames() -> Result<()> {
    let cfg = config(1);
    let fired = Rc::new(RefCell::new(Vec::new()));
    let model = ModelHandle::new(ScriptedBackend::from_frames(vec![fire()]).looped(true), "script");
    let dispatcher = AlertDispatcher::new(100, 4).with_sink(RecordingSink(fired.clone()));
    let mut session = Session::new(&cfg, model, dispatcher);
    let (mut source, _) = MockSource::new(250);

    let summary = session.run(&mut source, &mut NullObserver)?;

    assert_eq!(*fired.borrow(), vec![4, 104, 204]);
    assert_eq!(summary.alerts_fired, 3);
    assert_eq!(summary.final_state, AlertState::Confirmed(250));
    Ok(())
}

#[test]
fn clean_frame_resets_streak_before_confirmation() -> Result<()> {
    let cfg = config(1);
    let script = vec![fire(), fire(), fire(), Vec::new(), fire()];
    let mut session = session_with(&cfg, script);
    let (mut source, _) = MockSource::new(5);
    let mut observer = Collect::default();

    let summary = session.run(&mut source, &mut observer)?;

    let states: Vec<AlertState> = observer.reports.iter().map(|r| r.state).collect();
    assert_eq!(
        states,
        vec![
            AlertState::Suspect(1),
            AlertState::Suspect(2),
            AlertState::Suspect(3),
            AlertState::Normal,
            AlertState::Suspect(1),
        ]
    );
    assert_eq!(summary.alerts_fired, 0);
    Ok(())
}

#[test]
fn detector_errors_count_as_clean_frames() -> Result<()> {
    let cfg = config(1);
    let fire_line = r#"[{"label":"fire","confidence":0.9,"bbox":{"x1":0,"y1":0,"x2":4,"y2":4}}]"#;
    let replay = format!("{fire_line}\nnot json\n{fire_line}\n");
    let backend = ScriptedBackend::from_reader(Cursor::new(replay))?;
    let model = ModelHandle::new(backend, "replay");
    let mut session = Session::new(&cfg, model, AlertDispatcher::new(100, 4));
    let (mut source, _) = MockSource::new(3);
    let mut observer = Collect::default();

    session.run(&mut source, &mut observer)?;

    let states: Vec<AlertState> = observer.reports.iter().map(|r| r.state).collect();
    assert_eq!(
        states,
        vec![
            AlertState::Suspect(1),
            AlertState::Normal,
            AlertState::Suspect(1)
        ]
    );
    assert_eq!(observer.reports[1].metrics.object_count, 0);
    Ok(())
}

#[test]
fn stop_flag_ends_loop_before_next_frame() -> Result<()> {
    let cfg = config(3);
    let mut session = session_with(&cfg, vec![Vec::new()]);
    let (mut source, releases) = MockSource::new(1_000);
    let mut observer = Collect {
        stop_after: Some((5, session.stop_flag())),
        ..Collect::default()
    };

    let summary = session.run(&mut source, &mut observer)?;

    assert_eq!(summary.end_reason, EndReason::Stopped);
    assert_eq!(summary.frames_read, 5);
    assert_eq!(releases.get(), 1);
    Ok(())
}

#[test]
fn source_error_still_releases() {
    let cfg = config(3);
    let mut session = session_with(&cfg, vec![fire()]);
    let (mut source, releases) = MockSource::new(10);
    source.fail_at = Some(4);

    let result = session.run(&mut source, &mut NullObserver);

    assert!(result.is_err());
    assert_eq!(releases.get(), 1);
}

#[test]
fn frame_limit_and_live_mirroring() -> Result<()> {
    let cfg = config(3);
    let mut session = session_with(&cfg, vec![Vec::new()]).with_max_frames(Some(4));
    let (mut source, _) = MockSource::new(100);
    source.live = true;

    let summary = session.run(&mut source, &mut NullObserver)?;

    assert_eq!(summary.end_reason, EndReason::FrameLimit);
    assert_eq!(summary.frames_read, 4);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.final_state, AlertState::Normal);
    Ok(())
}

#[test]
fn rerun_starts_from_a_fresh_streak() -> Result<()> {
    let cfg = config(1);
    let fired = Rc::new(RefCell::new(Vec::new()));
    let model = ModelHandle::new(ScriptedBackend::from_frames(vec![fire()]).looped(true), "script");
    let dispatcher = AlertDispatcher::new(100, 4).with_sink(RecordingSink(fired.clone()));
    let mut session = Session::new(&cfg, model, dispatcher).with_max_frames(Some(5));

    let (mut first, _) = MockSource::new(3);
    let summary = session.run(&mut first, &mut NullObserver)?;
    assert_eq!(summary.final_state, AlertState::Suspect(3));

    let (mut second, _) = MockSource::new(1);
    let mut observer = Collect::default();
    let summary = session.run(&mut second, &mut observer)?;

    assert_eq!(summary.frames_read, 1);
    assert_eq!(summary.frames_processed, 1);
    assert_eq!(summary.alerts_fired, 0);
    assert_eq!(summary.final_state, AlertState::Suspect(1));
    assert_eq!(observer.reports[0].frame_index, 1);
    assert!(fired.borrow().is_empty());

    // A confirmed run followed by another fires again on entry.
    let (mut third, _) = MockSource::new(10);
    let summary = session.run(&mut third, &mut NullObserver)?;
    assert_eq!(summary.end_reason, EndReason::FrameLimit);
    assert_eq!(summary.frames_read, 5);
    let (mut fourth, _) = MockSource::new(4);
    let summary = session.run(&mut fourth, &mut NullObserver)?;
    assert_eq!(summary.alerts_fired, 1);
    assert_eq!(*fired.borrow(), vec![4, 4]);
    Ok(())
}
