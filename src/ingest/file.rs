//! Local file frame source.
//!
//! This module provides `FileSource` for reading frames from local media:
//! - A directory of still images, read in lexical file-name order
//! - A video file, decoded in-memory (feature: ingest-file-ffmpeg)
//!
//! The file source MUST NOT fetch remote URLs.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{is_local_path, FrameSource, SourceStats};
use crate::frame::Frame;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Images(ImageSequenceSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(path: &str) -> Result<Self> {
        if !is_local_path(path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        let path_buf = PathBuf::from(path);
        if !path_buf.exists() {
            return Err(anyhow!("video source {} not found", path_buf.display()));
        }
        if path_buf.is_dir() {
            return Ok(Self {
                backend: FileBackend::Images(ImageSequenceSource::new(path_buf)),
            });
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::new(path_buf)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "video file {} needs the ingest-file-ffmpeg feature; point the source at an image directory instead",
                path_buf.display()
            ))
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        match &self.backend {
            FileBackend::Images(source) => source.describe(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.describe(),
        }
    }

    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Images(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Images(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn release(&mut self) {
        match &mut self.backend {
            FileBackend::Images(source) => source.release(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.release(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Images(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Image directory backend
// ----------------------------------------------------------------------------

/// Reads every image in a directory as one frame.
///
/// Files that fail to decode are skipped with a warning; the sequence goes on.
pub struct ImageSequenceSource {
    dir: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    connected: bool,
}

impl ImageSequenceSource {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            files: Vec::new(),
            cursor: 0,
            frame_count: 0,
            connected: false,
        }
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn connect(&mut self) -> Result<()> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("list image directory {}", self.dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect();
        files.sort();
        log::info!(
            "FileSource: connected to {} ({} images)",
            self.dir.display(),
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Ok(None);
        }
        while let Some(path) = self.files.get(self.cursor) {
            self.cursor += 1;
            match image::open(path) {
                Ok(img) => {
                    self.frame_count += 1;
                    return Ok(Some(Frame::new(img.to_rgb8())));
                }
                Err(e) => log::warn!("FileSource: skipping {}: {}", path.display(), e),
            }
        }
        Ok(None)
    }

    fn release(&mut self) {
        if self.connected {
            self.connected = false;
            self.files.clear();
            log::info!(
                "FileSource: released {} after {} frames",
                self.dir.display(),
                self.frame_count
            );
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            source: self.describe(),
        }
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, value: u8) {
        let img = RgbImage::from_pixel(4, 3, Rgb([value, value, value]));
        img.save(dir.join(name)).expect("save png");
    }

    #[test]
    fn image_directory_is_read_in_name_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_png(dir.path(), "0002.png", 20);
        write_png(dir.path(), "0001.png", 10);
        std::fs::write(dir.path().join("notes.txt"), "ignored")?;

        let mut source = FileSource::new(dir.path().to_str().unwrap())?;
        source.connect()?;

        let first = source.next_frame()?.expect("first frame");
        assert_eq!(first.image().get_pixel(0, 0)[0], 10);
        let second = source.next_frame()?.expect("second frame");
        assert_eq!(second.image().get_pixel(0, 0)[0], 20);
        assert!(source.next_frame()?.is_none());
        assert_eq!(source.stats().frames_captured, 2);
        Ok(())
    }

    #[test]
    fn corrupt_images_are_skipped() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("0001.jpg"), b"not a jpeg")?;
        write_png(dir.path(), "0002.png", 7);

        let mut source = FileSource::new(dir.path().to_str().unwrap())?;
        source.connect()?;
        assert!(source.next_frame()?.is_some());
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn release_stops_the_sequence() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_png(dir.path(), "0001.png", 1);
        let mut source = FileSource::new(dir.path().to_str().unwrap())?;
        source.connect()?;
        source.release();
        assert!(source.next_frame()?.is_none());
        Ok(())
    }

    #[test]
    fn missing_path_is_an_error() {
        assert!(FileSource::new("/nonexistent/flight.mp4").is_err());
    }
}
