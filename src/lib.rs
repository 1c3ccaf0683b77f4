//! Forest Sentinel
//!
//! Watches drone or camera video for fire and smoke and raises debounced
//! alerts.
//!
//! # Pipeline
//!
//! Frames are read in arrival order, resized (live feeds mirrored) and every
//! Nth frame goes through an opaque detector. Detections whose label contains
//! a hazard keyword at or above the confidence threshold make the frame
//! hazardous. A consecutive-frame streak turns hazardous frames into a
//! confirmed alert, which drives the banner, an alert sound and an optional
//! spoken message under a frame-interval rate limit. A separate manual action
//! texts the fire team with the incident coordinates.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (image directories, video files, cameras, `stub://`)
//! - `detect`: detector backends and the shared `ModelHandle`
//! - `hazard`, `debounce`, `alert`: classification, streak and side effects
//! - `session`: the watch loop tying everything together
//! - `frame`, `metrics`, `ui`, `map`: presentation
//! - `transport`: SMS dispatch
//! - `config`, `cli`: settings and the `sentinel` command

pub mod alert;
pub mod cli;
pub mod config;
pub mod debounce;
pub mod detect;
pub mod frame;
pub mod hazard;
pub mod ingest;
pub mod map;
pub mod metrics;
pub mod session;
pub mod transport;
pub mod ui;

pub use alert::{Alert, AlertDispatcher, AlertSink, SoundSink, VoiceSink};
pub use config::{SentinelConfig, SourceInput};
pub use debounce::{AlertState, AlertStreak, Banner};
pub use detect::{BBox, Detection, DetectorBackend, ModelHandle};
pub use frame::{annotate, Frame, FrameState};
pub use hazard::HazardClassifier;
pub use ingest::{open_source, FileSource, FrameSource, Normalizer, SyntheticSource};
pub use map::MapView;
pub use metrics::{FpsMeter, FrameMetrics};
pub use session::{
    EndReason, FrameReport, FrameSampler, NullObserver, Session, SessionObserver, SessionSummary,
};
pub use transport::{dispatch_fire_team, DispatchOutcome, SmsTransport, TwilioTransport};
