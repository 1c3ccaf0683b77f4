//! Terminal presentation for the watch loop.
//!
//! `Ui` picks between an indicatif status line and plain stderr lines.
//! `Dashboard` is the session observer that renders banner, object count,
//! top confidence and FPS, and optionally keeps `latest.jpg` up to date.

use anyhow::{Context, Result};
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::debounce::Banner;
use crate::frame::Frame;
use crate::session::{FrameReport, SessionObserver, SessionSummary};

pub const SNAPSHOT_FILE: &str = "latest.jpg";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    /// Live status display for a watch session.
    pub fn dashboard(&self, snapshot_dir: Option<PathBuf>) -> Dashboard {
        let status = self.use_pretty().then(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_draw_target(ProgressDrawTarget::stderr());
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_message(Banner::Standby.to_string());
            bar
        });
        Dashboard {
            status,
            snapshot: snapshot_dir.map(SnapshotWriter::new),
            last_banner: Banner::Standby,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

// ----------------------------------------------------------------------------
// Dashboard
// ----------------------------------------------------------------------------

pub struct Dashboard {
    status: Option<ProgressBar>,
    snapshot: Option<SnapshotWriter>,
    last_banner: Banner,
}

/// One status line: banner plus the three metric cards.
pub fn status_line(report: &FrameReport) -> String {
    format!(
        "{} | objects {} | confidence {:.0}% | fps {:.1}",
        report.banner,
        report.metrics.object_count,
        report.metrics.max_confidence * 100.0,
        report.metrics.fps
    )
}

impl SessionObserver for Dashboard {
    fn on_start(&mut self, source: &str) {
        match &self.status {
            Some(bar) => bar.set_message(format!("{} | {}", Banner::Standby, source)),
            None => eprintln!("==> Watching {}", source),
        }
    }

    fn on_frame(&mut self, report: &FrameReport, frame: &Frame) {
        let line = status_line(report);
        match &self.status {
            Some(bar) => {
                bar.set_message(line);
                bar.tick();
            }
            None if report.banner != self.last_banner || report.alert.is_some() => {
                eprintln!("[frame {}] {}", report.frame_index, line)
            }
            None => {}
        }
        self.last_banner = report.banner;

        if report.processed {
            if let Some(writer) = self.snapshot.as_mut() {
                writer.write(frame);
            }
        }
    }

    fn on_finish(&mut self, summary: &SessionSummary) {
        let message = format!(
            "✔ {} frames, {} processed, {} alerts ({:?})",
            summary.frames_read, summary.frames_processed, summary.alerts_fired, summary.end_reason
        );
        match self.status.take() {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

/// Keeps the most recent annotated frame on disk.
///
/// The file is replaced by rename so viewers never read a half-written JPEG.
/// The first write failure is logged as a warning, later ones at debug.
pub struct SnapshotWriter {
    dir: PathBuf,
    warned: bool,
}

impl SnapshotWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, warned: false }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    fn write(&mut self, frame: &Frame) {
        if let Err(err) = save_snapshot(&self.dir, frame) {
            if self.warned {
                log::debug!("snapshot: {:#}", err);
            } else {
                log::warn!("snapshot: {:#}", err);
                self.warned = true;
            }
        }
    }
}

fn save_snapshot(dir: &Path, frame: &Frame) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create snapshot directory {}", dir.display()))?;
    let tmp = dir.join(format!("{}.tmp", SNAPSHOT_FILE));
    frame
        .image()
        .save_with_format(&tmp, ImageFormat::Jpeg)
        .with_context(|| format!("encode snapshot {}", tmp.display()))?;
    let target = dir.join(SNAPSHOT_FILE);
    std::fs::rename(&tmp, &target)
        .with_context(|| format!("replace snapshot {}", target.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debounce::AlertState;
    use crate::metrics::FrameMetrics;
    use image::RgbImage;

    fn report(processed: bool) -> FrameReport {
        FrameReport {
            frame_index: 3,
            processed,
            processed_count: 1,
            detections: Vec::new(),
            hazardous: false,
            state: AlertState::Suspect(2),
            banner: Banner::Analyzing {
                streak: 2,
                confirm_at: 4,
            },
            metrics: FrameMetrics {
                object_count: 2,
                max_confidence: 0.873,
                fps: 9.96,
            },
            alert: None,
        }
    }

    #[test]
    fn status_line_shows_banner_and_cards() {
        assert_eq!(
            status_line(&report(true)),
            "Analyzing... (2/4) | objects 2 | confidence 87% | fps 10.0"
        );
    }

    #[test]
    fn plain_mode_never_draws_a_bar() {
        let ui = Ui::from_args(Some("plain"), true, false);
        assert!(!ui.use_pretty());
        let ui = Ui::from_args(Some("pretty"), false, false);
        assert!(!ui.use_pretty());
    }

    #[test]
    fn dashboard_writes_snapshot_on_processed_frames() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ui = Ui::new(UiMode::Plain, false, true);
        let mut dashboard = ui.dashboard(Some(dir.path().to_path_buf()));
        let frame = Frame::new(RgbImage::new(8, 8));

        dashboard.on_frame(&report(false), &frame);
        assert!(!dir.path().join(SNAPSHOT_FILE).exists());

        dashboard.on_frame(&report(true), &frame);
        assert!(dir.path().join(SNAPSHOT_FILE).exists());
        assert!(!dir.path().join("latest.jpg.tmp").exists());
        Ok(())
    }
}
