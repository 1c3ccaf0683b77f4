use anyhow::{anyhow, Result};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::debounce::DEFAULT_CONFIRM_STREAK;
use crate::hazard::{DEFAULT_HAZARD_KEYWORDS, DEFAULT_HAZARD_THRESHOLD};

const DEFAULT_SOURCE: &str = "stub://drone";
const DEFAULT_FRAME_WIDTH: u32 = 640;
const DEFAULT_FRAME_HEIGHT: u32 = 360;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_MODEL_PATH: &str = "fireModel.onnx";
const DEFAULT_FALLBACK_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_INFER_EVERY: u64 = 3;
const DEFAULT_REPEAT_INTERVAL: u64 = 100;
const DEFAULT_SOUND_PATH: &str = "alert.mp3";
const DEFAULT_VOICE_MESSAGE: &str = "Critical Alert. Fire detected in sector 4.";
const DEFAULT_TWILIO_API_BASE: &str = "https://api.twilio.com";
const DEFAULT_MAP_CENTER: (f64, f64) = (30.7333, 76.7794);
const DEFAULT_MAP_ZOOM: u8 = 14;
const DEFAULT_MAP_RADIUS_M: f64 = 500.0;
const DEFAULT_MAP_TILES: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";
const DEFAULT_MAP_ATTRIBUTION: &str = "Esri World Imagery";

#[derive(Debug, Deserialize, Default)]
struct SentinelConfigFile {
    source: Option<SourceConfigFile>,
    detection: Option<DetectionConfigFile>,
    alert: Option<AlertConfigFile>,
    sms: Option<SmsConfigFile>,
    map: Option<MapConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    path: Option<String>,
    camera_index: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
    mirror_live: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    model_path: Option<PathBuf>,
    fallback_model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    replay_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    infer_every: Option<u64>,
    hazard_keywords: Option<Vec<String>>,
    debug: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    confirm_streak: Option<u32>,
    repeat_interval: Option<u64>,
    sound_path: Option<PathBuf>,
    sound_player: Option<String>,
    voice_command: Option<String>,
    voice_message: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct SmsConfigFile {
    account_sid: Option<String>,
    auth_token: Option<String>,
    from: Option<String>,
    to: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MapConfigFile {
    center_lat: Option<f64>,
    center_lon: Option<f64>,
    zoom: Option<u8>,
    radius_m: Option<f64>,
    tiles: Option<String>,
    attribution: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SentinelConfig {
    pub source: SourceSettings,
    pub detection: DetectionSettings,
    pub alert: AlertSettings,
    pub sms: SmsSettings,
    pub map: MapSettings,
}

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceInput {
    /// Local video file, image directory, or `stub://` synthetic source.
    Path(String),
    /// Live camera by index (`/dev/video{index}` on Linux).
    Camera(u32),
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub path: Option<String>,
    pub camera_index: Option<u32>,
    /// Frames are resized to this size before detection.
    pub width: u32,
    pub height: u32,
    pub target_fps: u32,
    /// Mirror live camera frames horizontally.
    pub mirror_live: bool,
}

impl SourceSettings {
    /// A camera index wins over a path.
    pub fn input(&self) -> SourceInput {
        match (self.camera_index, &self.path) {
            (Some(index), _) => SourceInput::Camera(index),
            (None, Some(path)) => SourceInput::Path(path.clone()),
            (None, None) => SourceInput::Path(DEFAULT_SOURCE.to_string()),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.input(), SourceInput::Camera(_))
    }
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub model_path: PathBuf,
    pub fallback_model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    /// JSON-lines detector replay; takes precedence over ONNX models.
    pub replay_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Run the detector on every Nth frame.
    pub infer_every: u64,
    pub hazard_keywords: Vec<String>,
    /// Draw every box, not only hazards.
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub confirm_streak: u32,
    /// Minimum processed frames between two alert firings.
    pub repeat_interval: u64,
    pub sound_path: PathBuf,
    /// Player command; autodetected when unset.
    pub sound_player: Option<String>,
    /// Text-to-speech command; voice alerts are off when unset.
    pub voice_command: Option<String>,
    pub voice_message: String,
}

#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub api_base: String,
}

impl SmsSettings {
    /// Names of the settings that still need a value before SMS can be sent.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("account_sid", &self.account_sid),
            ("auth_token", &self.auth_token),
            ("from", &self.from),
            ("to", &self.to),
        ] {
            if value.as_deref().map_or(true, |v| v.trim().is_empty()) {
                missing.push(name);
            }
        }
        missing
    }

    pub fn is_configured(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct MapSettings {
    pub center_lat: f64,
    pub center_lon: f64,
    pub zoom: u8,
    pub radius_m: f64,
    pub tiles: String,
    pub attribution: String,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self::from_file(SentinelConfigFile::default())
    }
}

impl SentinelConfig {
    /// Load from `SENTINEL_CONFIG` (if set), apply env overrides, validate.
    pub fn load() -> Result<Self> {
        let path = std::env::var("SENTINEL_CONFIG").ok().map(PathBuf::from);
        Self::load_with(path.as_deref())
    }

    /// Like `load`, with an explicit config file path.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => SentinelConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentinelConfigFile) -> Self {
        let src = file.source.unwrap_or_default();
        let det = file.detection.unwrap_or_default();
        let alert = file.alert.unwrap_or_default();
        let sms = file.sms.unwrap_or_default();
        let map = file.map.unwrap_or_default();

        Self {
            source: SourceSettings {
                path: src.path,
                camera_index: src.camera_index,
                width: src.width.unwrap_or(DEFAULT_FRAME_WIDTH),
                height: src.height.unwrap_or(DEFAULT_FRAME_HEIGHT),
                target_fps: src.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
                mirror_live: src.mirror_live.unwrap_or(true),
            },
            detection: DetectionSettings {
                model_path: det
                    .model_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                fallback_model_path: det
                    .fallback_model_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_FALLBACK_MODEL_PATH)),
                labels_path: det.labels_path,
                replay_path: det.replay_path,
                input_size: det.input_size.unwrap_or(DEFAULT_MODEL_INPUT),
                confidence_threshold: det
                    .confidence_threshold
                    .unwrap_or(DEFAULT_HAZARD_THRESHOLD),
                iou_threshold: det.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
                infer_every: det.infer_every.unwrap_or(DEFAULT_INFER_EVERY),
                hazard_keywords: det.hazard_keywords.unwrap_or_else(|| {
                    DEFAULT_HAZARD_KEYWORDS.iter().map(|k| k.to_string()).collect()
                }),
                debug: det.debug.unwrap_or(false),
            },
            alert: AlertSettings {
                confirm_streak: alert.confirm_streak.unwrap_or(DEFAULT_CONFIRM_STREAK),
                repeat_interval: alert.repeat_interval.unwrap_or(DEFAULT_REPEAT_INTERVAL),
                sound_path: alert
                    .sound_path
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SOUND_PATH)),
                sound_player: alert.sound_player,
                voice_command: alert.voice_command,
                voice_message: alert
                    .voice_message
                    .unwrap_or_else(|| DEFAULT_VOICE_MESSAGE.to_string()),
            },
            sms: SmsSettings {
                account_sid: sms.account_sid,
                auth_token: sms.auth_token,
                from: sms.from,
                to: sms.to,
                api_base: sms
                    .api_base
                    .unwrap_or_else(|| DEFAULT_TWILIO_API_BASE.to_string()),
            },
            map: MapSettings {
                center_lat: map.center_lat.unwrap_or(DEFAULT_MAP_CENTER.0),
                center_lon: map.center_lon.unwrap_or(DEFAULT_MAP_CENTER.1),
                zoom: map.zoom.unwrap_or(DEFAULT_MAP_ZOOM),
                radius_m: map.radius_m.unwrap_or(DEFAULT_MAP_RADIUS_M),
                tiles: map.tiles.unwrap_or_else(|| DEFAULT_MAP_TILES.to_string()),
                attribution: map
                    .attribution
                    .unwrap_or_else(|| DEFAULT_MAP_ATTRIBUTION.to_string()),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(source) = env_nonempty("SENTINEL_SOURCE") {
            self.source.path = Some(source);
            self.source.camera_index = None;
        }
        if let Some(index) = env_nonempty("SENTINEL_CAMERA_INDEX") {
            let index: u32 = index
                .parse()
                .map_err(|_| anyhow!("SENTINEL_CAMERA_INDEX must be a non-negative integer"))?;
            self.source.camera_index = Some(index);
        }
        if let Some(threshold) = env_nonempty("SENTINEL_CONF_THRESHOLD") {
            self.detection.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("SENTINEL_CONF_THRESHOLD must be a number"))?;
        }
        if let Some(path) = env_nonempty("SENTINEL_MODEL_PATH") {
            self.detection.model_path = PathBuf::from(path);
        }
        if let Some(streak) = env_nonempty("SENTINEL_CONFIRM_STREAK") {
            self.alert.confirm_streak = streak
                .parse()
                .map_err(|_| anyhow!("SENTINEL_CONFIRM_STREAK must be an integer"))?;
        }
        if let Some(path) = env_nonempty("SENTINEL_ALERT_SOUND") {
            self.alert.sound_path = PathBuf::from(path);
        }
        if let Some(sid) = env_nonempty("TWILIO_ACCOUNT_SID") {
            self.sms.account_sid = Some(sid);
        }
        if let Some(token) = env_nonempty("TWILIO_AUTH_TOKEN") {
            self.sms.auth_token = Some(token);
        }
        if let Some(from) = env_nonempty("TWILIO_FROM") {
            self.sms.from = Some(from);
        }
        if let Some(to) = env_nonempty("SENTINEL_ALERT_TO") {
            self.sms.to = Some(to);
        }
        Ok(())
    }

    /// Check ranges and normalize keywords. Called by `load`; call again
    /// after applying command-line overrides.
    pub fn validate(&mut self) -> Result<()> {
        let det = &mut self.detection;
        if !(0.0..=1.0).contains(&det.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&det.iou_threshold) {
            return Err(anyhow!("iou_threshold must be within [0, 1]"));
        }
        if det.infer_every == 0 {
            return Err(anyhow!("infer_every must be at least 1"));
        }
        if det.input_size == 0 {
            return Err(anyhow!("input_size must be greater than zero"));
        }
        det.hazard_keywords = det
            .hazard_keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if det.hazard_keywords.is_empty() {
            return Err(anyhow!("hazard_keywords must name at least one keyword"));
        }

        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("frame width and height must be greater than zero"));
        }
        if self.alert.confirm_streak == 0 {
            return Err(anyhow!("confirm_streak must be at least 1"));
        }
        if self.alert.repeat_interval == 0 {
            return Err(anyhow!("repeat_interval must be at least 1"));
        }

        for (name, number) in [("sms.from", &self.sms.from), ("sms.to", &self.sms.to)] {
            if let Some(number) = number.as_deref() {
                if !is_e164(number) {
                    return Err(anyhow!(
                        "{} must be an E.164 phone number (e.g. +15551234567), got '{}'",
                        name,
                        number
                    ));
                }
            }
        }

        if !(-90.0..=90.0).contains(&self.map.center_lat)
            || !(-180.0..=180.0).contains(&self.map.center_lon)
        {
            return Err(anyhow!("map center must be a valid latitude/longitude"));
        }
        if self.map.radius_m < 0.0 {
            return Err(anyhow!("map radius must not be negative"));
        }
        Ok(())
    }
}

pub fn is_e164(number: &str) -> bool {
    static E164: OnceLock<Regex> = OnceLock::new();
    E164.get_or_init(|| Regex::new(r"^\+[1-9][0-9]{6,14}$").expect("static regex"))
        .is_match(number)
}

fn read_config_file(path: &Path) -> Result<SentinelConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
