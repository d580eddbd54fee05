//! Configuration.
//!
//! The engine sees plain structs (`EngineConfig`, `PolicyConfig`), mutable
//! between frames and read-only during a frame. The daemon-level
//! `SentrycamConfig` loads from a JSON file pointed to by `SENTRYCAM_CONFIG`
//! with per-field environment overrides, then validates the merged result.
//! Named presets bundle the tunable thresholds for save/restore.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geometry::BoundingBox;

const DEFAULT_DB_PATH: &str = "sentrycam.db";
const DEFAULT_TARGET_FPS: u32 = 10;
const DEFAULT_FRAME_WIDTH: u32 = 800;
const DEFAULT_FRAME_HEIGHT: u32 = 600;
const DEFAULT_RETENTION_SECS: u64 = 60 * 60 * 24 * 30;
const DEFAULT_PRESETS_DIR: &str = "presets";

/// Thresholds and toggles read by the rule set each frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum detector confidence for a detection to be considered.
    pub confidence_threshold: f32,
    /// Restricted rectangle; `None` disables the dwell rule entirely.
    pub restricted_area: Option<BoundingBox>,
    /// Continuous presence in the restricted area before a dwell event.
    pub anomaly_threshold_secs: u64,
    /// Centroid displacement between consecutive frames counted as rapid.
    pub rapid_movement_px: f64,
    /// Age in frames under which appearance/disappearance count as sudden.
    pub sudden_appearance_frames: u64,
    /// Centroid distance under which two detections interact.
    pub interaction_distance_px: f64,
    /// Continuous presence of a person before a loitering event.
    pub loitering_threshold_secs: u64,
    /// Class labels admitted into tracking; empty admits everything.
    pub enabled_classes: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            restricted_area: None,
            anomaly_threshold_secs: 5,
            rapid_movement_px: 50.0,
            sudden_appearance_frames: 3,
            interaction_distance_px: 50.0,
            loitering_threshold_secs: 30,
            enabled_classes: vec![
                "person".to_string(),
                "car".to_string(),
                "animal".to_string(),
            ],
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(anyhow!("confidence_threshold must be within 0..=1"));
        }
        if let Some(area) = &self.restricted_area {
            area.validate()
                .map_err(|e| anyhow!("restricted_area: {}", e))?;
        }
        if self.rapid_movement_px <= 0.0 {
            return Err(anyhow!("rapid_movement_px must be positive"));
        }
        if self.interaction_distance_px <= 0.0 {
            return Err(anyhow!("interaction_distance_px must be positive"));
        }
        if self.sudden_appearance_frames == 0 {
            return Err(anyhow!("sudden_appearance_frames must be at least 1"));
        }
        Ok(())
    }
}

/// Recording and notification settings read by the action policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub automatic_recording: bool,
    /// Length of each automatic recording once started.
    pub recording_duration_secs: u64,
    pub notify_on_anomaly: bool,
    /// Detection count triggering a notification; 0 disables.
    pub notify_on_detection_threshold: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            automatic_recording: false,
            recording_duration_secs: 30,
            notify_on_anomaly: true,
            notify_on_detection_threshold: 10,
        }
    }
}

/// A named, saveable bundle of the tunable thresholds and toggles.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Preset {
    pub engine: EngineConfig,
    pub policy: PolicyConfig,
}

impl Preset {
    /// Load a named preset from `dir`.
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let path = preset_path(dir, name)?;
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| anyhow!("failed to read preset {}: {}", path.display(), e))?;
        let preset: Preset = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid preset {}: {}", path.display(), e))?;
        preset.engine.validate()?;
        Ok(preset)
    }

    /// Save under `dir/<name>.json`, creating `dir` if needed.
    pub fn save(&self, dir: &Path, name: &str) -> Result<()> {
        self.engine.validate()?;
        let path = preset_path(dir, name)?;
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)
            .map_err(|e| anyhow!("failed to write preset {}: {}", path.display(), e))?;
        Ok(())
    }

    /// Names of all presets stored in `dir`.
    pub fn list(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(names),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

fn preset_path(dir: &Path, name: &str) -> Result<PathBuf> {
    if name.is_empty() || name.contains(['/', '\\', '.']) {
        return Err(anyhow!("preset name must be a plain file stem"));
    }
    Ok(dir.join(format!("{}.json", name)))
}

#[derive(Debug, Deserialize, Default)]
struct SentrycamConfigFile {
    db_path: Option<String>,
    presets_dir: Option<String>,
    video: Option<VideoConfigFile>,
    retention: Option<RetentionConfigFile>,
    engine: Option<EngineConfig>,
    policy: Option<PolicyConfig>,
}

#[derive(Debug, Deserialize, Default)]
struct VideoConfigFile {
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct RetentionConfigFile {
    seconds: Option<u64>,
}

/// Daemon configuration: storage, frame cadence, and the engine/policy
/// settings handed to the kernel.
#[derive(Debug, Clone)]
pub struct SentrycamConfig {
    pub db_path: String,
    pub presets_dir: PathBuf,
    pub video: VideoSettings,
    pub retention: Duration,
    pub engine: EngineConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone)]
pub struct VideoSettings {
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

impl SentrycamConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTRYCAM_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentrycamConfigFile) -> Self {
        let video = VideoSettings {
            target_fps: file
                .video
                .as_ref()
                .and_then(|v| v.target_fps)
                .unwrap_or(DEFAULT_TARGET_FPS),
            width: file
                .video
                .as_ref()
                .and_then(|v| v.width)
                .unwrap_or(DEFAULT_FRAME_WIDTH),
            height: file
                .video
                .as_ref()
                .and_then(|v| v.height)
                .unwrap_or(DEFAULT_FRAME_HEIGHT),
        };
        let retention = Duration::from_secs(
            file.retention
                .and_then(|r| r.seconds)
                .unwrap_or(DEFAULT_RETENTION_SECS),
        );
        Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            presets_dir: PathBuf::from(
                file.presets_dir
                    .unwrap_or_else(|| DEFAULT_PRESETS_DIR.to_string()),
            ),
            video,
            retention,
            engine: file.engine.unwrap_or_default(),
            policy: file.policy.unwrap_or_default(),
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SENTRYCAM_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(dir) = std::env::var("SENTRYCAM_PRESETS_DIR") {
            if !dir.trim().is_empty() {
                self.presets_dir = PathBuf::from(dir);
            }
        }
        if let Ok(fps) = std::env::var("SENTRYCAM_TARGET_FPS") {
            self.video.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("SENTRYCAM_TARGET_FPS must be an integer"))?;
        }
        if let Ok(retention) = std::env::var("SENTRYCAM_RETENTION_SECS") {
            let seconds: u64 = retention.parse().map_err(|_| {
                anyhow!("SENTRYCAM_RETENTION_SECS must be an integer number of seconds")
            })?;
            self.retention = Duration::from_secs(seconds);
        }
        if let Ok(classes) = std::env::var("SENTRYCAM_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.engine.enabled_classes = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        if self.video.target_fps == 0 {
            return Err(anyhow!("video target_fps must be greater than zero"));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(anyhow!("video dimensions must be greater than zero"));
        }
        if self.retention.as_secs() == 0 {
            return Err(anyhow!("retention must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<SentrycamConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_engine_config_validates() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn validation_rejects_bad_thresholds() {
        let mut cfg = EngineConfig::default();
        cfg.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.restricted_area = Some(BoundingBox::new(400.0, 100.0, 100.0, 400.0));
        assert!(cfg.validate().is_err());

        let mut cfg = EngineConfig::default();
        cfg.sudden_appearance_frames = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn preset_names_must_be_plain_stems() {
        assert!(preset_path(Path::new("presets"), "night_watch").is_ok());
        assert!(preset_path(Path::new("presets"), "").is_err());
        assert!(preset_path(Path::new("presets"), "../escape").is_err());
    }
}
