use anyhow::{anyhow, Context, Result};
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Replays pre-recorded detector output, one entry per processed frame.
///
/// The replay file is JSON lines: each line is an array of detections for one
/// processed frame (`[]` for a clean frame). Blank lines count as clean frames.
/// Once the script runs out the backend reports nothing, unless it loops.
///
/// A line that fails to parse is kept as an error and surfaced by `detect`
/// for that frame only.
pub struct ScriptedBackend {
    script: VecDeque<Result<Vec<Detection>, String>>,
    original: Vec<Result<Vec<Detection>, String>>,
    looped: bool,
}

impl ScriptedBackend {
    pub fn from_frames(frames: Vec<Vec<Detection>>) -> Self {
        let original: Vec<_> = frames.into_iter().map(Ok).collect();
        Self {
            script: original.iter().cloned().collect(),
            original,
            looped: false,
        }
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut original = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("read replay line {}", lineno + 1))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                original.push(Ok(Vec::new()));
                continue;
            }
            let entry = serde_json::from_str::<Vec<Detection>>(trimmed)
                .map_err(|e| format!("replay line {}: {}", lineno + 1, e));
            original.push(entry);
        }
        Ok(Self {
            script: original.iter().cloned().collect(),
            original,
            looped: false,
        })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("open replay file {}", path.display()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Restart from the top when the script is exhausted.
    pub fn looped(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        if self.script.is_empty() && self.looped {
            self.script = self.original.iter().cloned().collect();
        }
        match self.script.pop_front() {
            None => Ok(Vec::new()),
            Some(Ok(detections)) => Ok(detections
                .into_iter()
                .filter(|d| d.confidence >= confidence_threshold)
                .collect()),
            Some(Err(reason)) => Err(anyhow!(reason)),
        }
    }
}
