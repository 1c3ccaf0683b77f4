//! Frame ingestion sources.
//!
//! This module provides the sources a watch session can read from:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Directories of still images (always available)
//! - Live cameras by index (feature: ingest-v4l2)
//! - Synthetic `stub://` source (testing, demos)
//!
//! Every source yields frames strictly in capture order and reports end of
//! stream as `Ok(None)`. `release` closes the underlying handle; it is safe to
//! call more than once, and dropping a source releases it as well.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
pub mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::Result;

use crate::config::{SourceInput, SourceSettings};
use crate::frame::Frame;

pub use file::FileSource;
pub use normalize::Normalizer;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Statistics shared by all sources.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub source: String,
}

/// A sequential frame producer.
pub trait FrameSource {
    /// Human-readable source name for logs.
    fn describe(&self) -> String;

    /// Open the underlying handle.
    fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Next frame in arrival order, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Live sources (cameras) are mirrored during normalization.
    fn is_live(&self) -> bool {
        false
    }

    /// Close the underlying handle. Idempotent.
    fn release(&mut self);

    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Build the source named by the settings. The source is not yet connected.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    match settings.input() {
        SourceInput::Camera(index) => open_camera(index, settings),
        SourceInput::Path(path) if path.starts_with("stub://") => {
            Ok(Box::new(SyntheticSource::from_url(&path, settings)?))
        }
        SourceInput::Path(path) => Ok(Box::new(FileSource::new(&path)?)),
    }
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(index: u32, settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::for_index(
        index,
        settings.width,
        settings.height,
        settings.target_fps,
    )))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(index: u32, _settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    Err(anyhow::anyhow!(
        "camera {} unavailable: live capture requires the ingest-v4l2 feature",
        index
    ))
}

/// Local paths only; URL schemes other than `stub://` are rejected.
pub(crate) fn is_local_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    path.starts_with("stub://") || !path.contains("://")
}
