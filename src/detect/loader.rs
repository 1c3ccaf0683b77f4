use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{anyhow, Result};
use regex::Regex;

use super::backend::DetectorBackend;
use super::backends::{ScriptedBackend, StubBackend};
use super::result::Detection;
use crate::config::DetectionSettings;
use crate::frame::Frame;

/// Detector loaded once at startup and shared by reference.
///
/// The backend sits behind a `Mutex` because `DetectorBackend::detect` takes
/// `&mut self`. Cloning the handle shares the same model.
#[derive(Clone)]
pub struct ModelHandle {
    backend: Arc<Mutex<dyn DetectorBackend>>,
    name: &'static str,
    description: String,
    fallback: bool,
}

impl ModelHandle {
    pub fn new<B: DetectorBackend + 'static>(backend: B, description: impl Into<String>) -> Self {
        let name = backend.name();
        Self {
            backend: Arc::new(Mutex::new(backend)),
            name,
            description: description.into(),
            fallback: false,
        }
    }

    fn as_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Load the configured detector. Never fails: missing or broken model
    /// files fall back with a warning, ending at the stub backend.
    ///
    /// Order: replay file, custom model, standard model, stub. A replay file
    /// is an explicit override and wins even when a model file exists.
    pub fn load(settings: &DetectionSettings) -> Self {
        if let Some(replay) = &settings.replay_path {
            match ScriptedBackend::from_path(replay) {
                Ok(backend) => {
                    log::info!("detector: replaying {}", replay.display());
                    return Self::new(backend, format!("Replay ({})", replay.display()));
                }
                Err(e) => log::warn!("detector: replay unavailable: {:#}", e),
            }
        }

        if settings.model_path.exists() {
            match load_onnx(&settings.model_path, settings) {
                Ok(backend) => {
                    log::info!("detector: loaded {}", settings.model_path.display());
                    return backend;
                }
                Err(e) => log::warn!(
                    "detector: failed to load {}: {:#}",
                    settings.model_path.display(),
                    e
                ),
            }
        } else {
            log::warn!(
                "detector: '{}' missing, using standard model",
                settings.model_path.display()
            );
        }

        if settings.fallback_model_path.exists() {
            match load_onnx(&settings.fallback_model_path, settings) {
                Ok(backend) => {
                    log::info!(
                        "detector: loaded standard model {}",
                        settings.fallback_model_path.display()
                    );
                    return backend.as_fallback();
                }
                Err(e) => log::warn!(
                    "detector: failed to load {}: {:#}",
                    settings.fallback_model_path.display(),
                    e
                ),
            }
        }

        log::warn!("detector: no model available, running without detections");
        Self::new(StubBackend::new(), "Stub (no model)").as_fallback()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// True when the custom model could not be used.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn warm_up(&self) -> Result<()> {
        self.lock()?.warm_up()
    }

    pub fn detect(&self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        self.lock()?.detect(frame, confidence_threshold)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, dyn DetectorBackend + 'static>> {
        self.backend
            .lock()
            .map_err(|_| anyhow!("detector lock poisoned"))
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("fallback", &self.fallback)
            .finish()
    }
}

#[cfg(feature = "backend-tract")]
fn load_onnx(path: &Path, settings: &DetectionSettings) -> Result<ModelHandle> {
    use super::backends::TractBackend;

    let metadata = match &settings.labels_path {
        Some(_) => None,
        None => TractBackend::names_metadata(path).unwrap_or_else(|e| {
            log::warn!("detector: {:#}", e);
            None
        }),
    };
    let labels = resolve_labels(settings.labels_path.as_deref(), metadata.as_deref(), path)?;
    let backend = TractBackend::new(path, settings.input_size)?
        .with_labels(labels)
        .with_iou_threshold(settings.iou_threshold);
    Ok(ModelHandle::new(backend, format!("ONNX ({})", path.display())))
}

#[cfg(not(feature = "backend-tract"))]
fn load_onnx(path: &Path, _settings: &DetectionSettings) -> Result<ModelHandle> {
    Err(anyhow!(
        "cannot load {}: ONNX inference requires the backend-tract feature",
        path.display()
    ))
}

/// One class name per line; blank lines are skipped.
#[cfg_attr(not(feature = "backend-tract"), allow(dead_code))]
fn read_labels(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read labels {}: {}", path.display(), e))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Class names for an ONNX model. A labels file wins over the model's own
/// `names` metadata. Without either, detections carry `classN` labels and
/// keyword matching never sees a hazard, so that case is logged loudly.
#[cfg_attr(not(feature = "backend-tract"), allow(dead_code))]
fn resolve_labels(
    labels_path: Option<&Path>,
    names_metadata: Option<&str>,
    model: &Path,
) -> Result<Vec<String>> {
    let labels = match (labels_path, names_metadata) {
        (Some(path), _) => read_labels(path)?,
        (None, Some(raw)) => parse_class_names(raw),
        (None, None) => Vec::new(),
    };
    if labels.is_empty() {
        log::warn!(
            "detector: {} has no class names; set labels_path or hazard keywords will never match",
            model.display()
        );
    }
    Ok(labels)
}

/// Parse `{0: 'fire', 1: "smoke"}` into names indexed by class id. Missing
/// ids get `classN` so later names keep their position.
#[cfg_attr(not(feature = "backend-tract"), allow(dead_code))]
fn parse_class_names(raw: &str) -> Vec<String> {
    static ENTRY: OnceLock<Regex> = OnceLock::new();
    let re = ENTRY.get_or_init(|| {
        Regex::new(r#"(\d+)\s*:\s*(?:'([^']*)'|"([^"]*)")"#).expect("static regex")
    });

    let mut names: Vec<String> = Vec::new();
    for caps in re.captures_iter(raw) {
        let Ok(id) = caps[1].parse::<usize>() else {
            continue;
        };
        let Some(name) = caps.get(2).or_else(|| caps.get(3)) else {
            continue;
        };
        if names.len() <= id {
            let start = names.len();
            names.extend((start..=id).map(|i| format!("class{}", i)));
        }
        names[id] = name.as_str().to_string();
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SentinelConfig;
    use crate::detect::BBox;
    use image::RgbImage;
    use std::io::Write;

    fn settings_in(dir: &Path) -> DetectionSettings {
        let mut settings = SentinelConfig::default().detection;
        settings.model_path = dir.join("fireModel.onnx");
        settings.fallback_model_path = dir.join("yolov8n.onnx");
        settings
    }

    #[test]
    fn missing_models_fall_back_to_stub() {
        let dir = tempfile::tempdir().unwrap();
        let handle = ModelHandle::load(&settings_in(dir.path()));
        assert_eq!(handle.name(), "stub");
        assert!(handle.is_fallback());
        let frame = Frame::new(RgbImage::new(4, 4));
        assert!(handle.detect(&frame, 0.1).unwrap().is_empty());
    }

    #[test]
    fn replay_file_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let replay = dir.path().join("replay.jsonl");
        let mut file = std::fs::File::create(&replay).unwrap();
        writeln!(
            file,
            r#"[{{"bbox":{{"x1":0,"y1":0,"x2":5,"y2":5}},"label":"smoke","confidence":0.7}}]"#
        )
        .unwrap();

        let mut settings = settings_in(dir.path());
        std::fs::write(&settings.model_path, b"not a model").unwrap();
        settings.replay_path = Some(replay);
        let handle = ModelHandle::load(&settings);
        assert_eq!(handle.name(), "scripted");
        assert!(!handle.is_fallback());

        let frame = Frame::new(RgbImage::new(8, 8));
        let dets = handle.detect(&frame, 0.5).unwrap();
        assert_eq!(dets, vec![Detection::new("smoke", 0.7, BBox::new(0.0, 0.0, 5.0, 5.0))]);
    }

    #[test]
    fn cloned_handles_share_the_backend() {
        let handle = ModelHandle::new(
            ScriptedBackend::from_frames(vec![
                vec![Detection::new("fire", 0.9, BBox::default())],
                vec![],
            ]),
            "test",
        );
        let other = handle.clone();
        let frame = Frame::new(RgbImage::new(2, 2));
        assert_eq!(handle.detect(&frame, 0.1).unwrap().len(), 1);
        assert!(other.detect(&frame, 0.1).unwrap().is_empty());
    }

    #[test]
    fn labels_file_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "fire\n\n smoke \n").unwrap();
        assert_eq!(read_labels(&path).unwrap(), vec!["fire", "smoke"]);
    }

    #[test]
    fn class_names_come_from_model_metadata() {
        let raw = r#"{0: 'fire', 1: "smoke", 3: 'ember'}"#;
        let names = parse_class_names(raw);
        assert_eq!(names, vec!["fire", "smoke", "class2", "ember"]);

        let metadata = Some("{0: 'smoke', 1: 'fire'}");
        let labels = resolve_labels(None, metadata, Path::new("m.onnx")).unwrap();
        assert_eq!(labels, vec!["smoke", "fire"]);
    }

    #[test]
    fn labels_file_beats_model_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "wildfire\n").unwrap();
        let metadata = Some("{0: 'person'}");
        let labels = resolve_labels(Some(&path), metadata, Path::new("m.onnx")).unwrap();
        assert_eq!(labels, vec!["wildfire"]);
    }

    #[test]
    fn no_class_names_resolves_empty() {
        assert!(parse_class_names("").is_empty());
        assert!(parse_class_names("not a dict").is_empty());
        let labels = resolve_labels(None, None, Path::new("m.onnx")).unwrap();
        assert!(labels.is_empty());
    }
}
