//! demo - end-to-end synthetic run of the watch loop
//!
//! A synthetic `stub://` feed is paired with a scripted detector that flickers
//! between clean frames, a weak smoke reading and a sustained fire, so the
//! streak, the banner and the alert rate limit can be watched without a model
//! or a video file.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;

use forest_sentinel::detect::ScriptedBackend;
use forest_sentinel::ui::SNAPSHOT_FILE;
use forest_sentinel::{
    AlertDispatcher, BBox, Banner, Detection, Frame, FrameReport, ModelHandle, SentinelConfig,
    Session, SessionObserver, SessionSummary, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Synthetic frames to generate.
    #[arg(long, default_value_t = 120)]
    frames: u64,
    /// Run the detector on every Nth frame.
    #[arg(long, default_value_t = 3)]
    every: u64,
    /// Consecutive hazardous frames needed to confirm.
    #[arg(long, default_value_t = 4)]
    streak: u32,
    /// Processed frames between repeated alerts.
    #[arg(long, default_value_t = 10)]
    repeat: u64,
    /// Keep the latest annotated frame in this directory.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn stage(name: &str) {
    eprintln!("==> {}", name);
}

fn fire() -> Vec<Detection> {
    vec![
        Detection::new("fire", 0.87, BBox::new(250.0, 150.0, 330.0, 220.0)),
        Detection::new("tree", 0.66, BBox::new(40.0, 60.0, 140.0, 300.0)),
    ]
}

fn weak_smoke() -> Vec<Detection> {
    vec![Detection::new("smoke", 0.21, BBox::new(200.0, 80.0, 300.0, 160.0))]
}

/// One script entry per processed frame; the backend loops over it.
fn script() -> Vec<Vec<Detection>> {
    let mut frames = Vec::new();
    frames.extend(std::iter::repeat_with(Vec::new).take(3));
    frames.extend(std::iter::repeat_with(fire).take(2));
    frames.push(weak_smoke());
    frames.extend(std::iter::repeat_with(fire).take(14));
    frames.extend(std::iter::repeat_with(Vec::new).take(4));
    frames
}

struct Narrator {
    last: Banner,
}

impl SessionObserver for Narrator {
    fn on_start(&mut self, source: &str) {
        println!("watching {}", source);
    }

    fn on_frame(&mut self, report: &FrameReport, _frame: &Frame) {
        if report.banner != self.last {
            println!(
                "frame {:>4}: {} (objects {}, confidence {:.2})",
                report.frame_index,
                report.banner,
                report.metrics.object_count,
                report.metrics.max_confidence
            );
            self.last = report.banner;
        }
        if let Some(alert) = &report.alert {
            println!(
                "frame {:>4}: ALERT fired at processed frame {}",
                report.frame_index, alert.processed_index
            );
        }
    }

    fn on_finish(&mut self, summary: &SessionSummary) {
        println!(
            "done: {} frames read, {} processed, {} alerts, final state {:?}",
            summary.frames_read, summary.frames_processed, summary.alerts_fired, summary.final_state
        );
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    if args.every == 0 {
        return Err(anyhow!("every must be >= 1"));
    }

    stage("configure");
    let mut cfg = SentinelConfig::default();
    cfg.source.path = Some(format!("stub://demo?frames={}", args.frames));
    cfg.detection.infer_every = args.every;
    cfg.alert.confirm_streak = args.streak;
    cfg.alert.repeat_interval = args.repeat;
    cfg.validate()?;

    stage("run synthetic session");
    let model = ModelHandle::new(ScriptedBackend::from_frames(script()).looped(true), "Demo script");
    let dispatcher = AlertDispatcher::new(cfg.alert.repeat_interval, cfg.alert.confirm_streak);
    let mut session = Session::new(&cfg, model, dispatcher);

    let url = cfg.source.path.clone().unwrap_or_default();
    let mut source = SyntheticSource::from_url(&url, &cfg.source)?;
    let summary = match &args.out {
        Some(dir) => {
            let ui = forest_sentinel::ui::Ui::from_args(Some("plain"), false, true);
            let mut dashboard = ui.dashboard(Some(dir.clone()));
            let summary = session.run(&mut source, &mut dashboard)?;
            println!("latest frame: {}", dir.join(SNAPSHOT_FILE).display());
            summary
        }
        None => session.run(
            &mut source,
            &mut Narrator {
                last: Banner::Standby,
            },
        )?,
    };

    if summary.alerts_fired == 0 {
        println!("no alert fired; try more frames or a shorter streak");
    }
    Ok(())
}
