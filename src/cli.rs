//! sentinel - drone wildfire watch console
//!
//! Subcommands:
//! - `watch`: run the detection loop on a video file, image directory,
//!   camera or `stub://` source until the stream ends or Ctrl-C
//! - `dispatch`: announce and text the fire team with incident coordinates
//! - `map`: write the incident map page

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use crate::alert::VoiceSink;
use crate::config::{SentinelConfig, SourceInput};
use crate::ingest::open_source;
use crate::map::MapView;
use crate::session::Session;
use crate::transport::{dispatch_fire_team, DispatchOutcome, TwilioTransport};
use crate::ui::Ui;

#[derive(Parser, Debug)]
#[command(name = "sentinel", version, about = "Drone wildfire and smoke watch")]
struct Args {
    /// Config file (JSON, or TOML by extension). Defaults to $SENTINEL_CONFIG.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a video source for fire and smoke
    Watch {
        /// Video file, image directory or stub:// url
        #[arg(long, value_name = "PATH", conflicts_with = "camera")]
        source: Option<String>,
        /// Live camera index
        #[arg(long, value_name = "N")]
        camera: Option<u32>,
        /// Confidence threshold in [0, 1]
        #[arg(long, value_name = "X")]
        conf: Option<f32>,
        /// Draw non-hazard boxes too
        #[arg(long)]
        debug: bool,
        /// Keep the latest annotated frame as latest.jpg in this directory
        #[arg(long, value_name = "DIR")]
        snapshot_dir: Option<PathBuf>,
        /// UI mode for stderr status (auto|plain|pretty)
        #[arg(long, default_value = "auto", value_name = "MODE")]
        ui: String,
        /// Stop after reading this many frames
        #[arg(long, value_name = "N")]
        max_frames: Option<u64>,
    },

    /// Send the fire-team SMS with incident coordinates
    Dispatch {
        /// Latitude (defaults to the map centre)
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Longitude (defaults to the map centre)
        #[arg(long, allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Write the incident map as a standalone HTML page
    Map {
        #[arg(long, default_value = "map.html", value_name = "FILE")]
        out: PathBuf,
    },
}

pub fn run() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match args.config.as_deref() {
        Some(path) => SentinelConfig::load_with(Some(path))?,
        None => SentinelConfig::load()?,
    };

    match args.command {
        Command::Watch {
            source,
            camera,
            conf,
            debug,
            snapshot_dir,
            ui,
            max_frames,
        } => {
            if let Some(source) = source {
                cfg.source.path = Some(source);
                cfg.source.camera_index = None;
            }
            if camera.is_some() {
                cfg.source.camera_index = camera;
            }
            if let Some(conf) = conf {
                cfg.detection.confidence_threshold = conf;
            }
            cfg.detection.debug |= debug;
            cfg.validate()?;
            watch(&cfg, &ui, snapshot_dir, max_frames)
        }
        Command::Dispatch { lat, lon } => {
            let lat = lat.unwrap_or(cfg.map.center_lat);
            let lon = lon.unwrap_or(cfg.map.center_lon);
            let voice = VoiceSink::from_settings(&cfg.alert);
            match dispatch_fire_team(&cfg.sms, &TwilioTransport::new(), lat, lon, voice.as_ref()) {
                DispatchOutcome::Sent { to } => println!("Fire team notified via SMS ({})", to),
                DispatchOutcome::Failed(reason) => println!("Dispatch failed: {}", reason),
            }
            Ok(())
        }
        Command::Map { out } => {
            MapView::from_settings(&cfg.map).write_to(&out)?;
            println!("Map written to {}", out.display());
            Ok(())
        }
    }
}

fn watch(
    cfg: &SentinelConfig,
    ui_flag: &str,
    snapshot_dir: Option<PathBuf>,
    max_frames: Option<u64>,
) -> Result<()> {
    let is_tty = std::io::stderr().is_terminal();
    let ui = Ui::from_args(Some(ui_flag), is_tty, false);

    if let SourceInput::Path(path) = cfg.source.input() {
        if !path.starts_with("stub://") && !Path::new(&path).exists() {
            log::warn!("video source {} not found; staying in standby", path);
            return Ok(());
        }
    }

    let mut session = {
        let _stage = ui.stage("Load detector");
        Session::from_config(cfg).with_max_frames(max_frames)
    };
    log::info!("detector: {}", session.model().description());

    let stop = session.stop_flag();
    ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))
        .context("install Ctrl-C handler")?;

    let mut source = open_source(&cfg.source)?;
    let mut dashboard = ui.dashboard(snapshot_dir);
    session.run(&mut source, &mut dashboard)?;
    Ok(())
}
