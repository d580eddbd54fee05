use std::sync::Mutex;

use tempfile::NamedTempFile;

use sentrycam::config::SentrycamConfig;
use sentrycam::Preset;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "SENTRYCAM_CONFIG",
        "SENTRYCAM_DB_PATH",
        "SENTRYCAM_PRESETS_DIR",
        "SENTRYCAM_TARGET_FPS",
        "SENTRYCAM_RETENTION_SECS",
        "SENTRYCAM_CLASSES",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "db_path": "sentrycam_prod.db",
        "presets_dir": "site_presets",
        "video": {
            "target_fps": 12,
            "width": 1280,
            "height": 720
        },
        "retention": {
            "seconds": 43200
        },
        "engine": {
            "confidence_threshold": 0.6,
            "restricted_area": { "xmin": 100.0, "ymin": 100.0, "xmax": 400.0, "ymax": 400.0 },
            "anomaly_threshold_secs": 8,
            "rapid_movement_px": 75.0,
            "sudden_appearance_frames": 4,
            "interaction_distance_px": 60.0,
            "loitering_threshold_secs": 45,
            "enabled_classes": ["person", "car"]
        },
        "policy": {
            "automatic_recording": true,
            "recording_duration_secs": 60,
            "notify_on_anomaly": true,
            "notify_on_detection_threshold": 5
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("SENTRYCAM_CONFIG", file.path());
    std::env::set_var("SENTRYCAM_RETENTION_SECS", "86400");
    std::env::set_var("SENTRYCAM_CLASSES", "person, bicycle");

    let cfg = SentrycamConfig::load().expect("load config");

    assert_eq!(cfg.db_path, "sentrycam_prod.db");
    assert_eq!(cfg.presets_dir.to_str().unwrap(), "site_presets");
    assert_eq!(cfg.video.target_fps, 12);
    assert_eq!(cfg.video.width, 1280);
    assert_eq!(cfg.retention.as_secs(), 86400);
    assert_eq!(cfg.engine.confidence_threshold, 0.6);
    assert_eq!(cfg.engine.anomaly_threshold_secs, 8);
    assert_eq!(cfg.engine.restricted_area.unwrap().xmax, 400.0);
    assert_eq!(cfg.engine.enabled_classes, vec!["person", "bicycle"]);
    assert!(cfg.policy.automatic_recording);
    assert_eq!(cfg.policy.notify_on_detection_threshold, 5);

    clear_env();
}

#[test]
fn defaults_apply_without_a_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = SentrycamConfig::load().expect("load defaults");
    assert_eq!(cfg.db_path, "sentrycam.db");
    assert_eq!(cfg.video.target_fps, 10);
    assert!(cfg.engine.restricted_area.is_none());
    assert_eq!(cfg.engine.sudden_appearance_frames, 3);
    assert!(!cfg.policy.automatic_recording);

    clear_env();
}

#[test]
fn presets_round_trip_through_disk() {
    let dir = tempfile::tempdir().expect("temp dir");

    let mut preset = Preset::default();
    preset.engine.loitering_threshold_secs = 90;
    preset.policy.notify_on_detection_threshold = 3;
    preset.save(dir.path(), "night_watch").expect("save preset");

    let names = Preset::list(dir.path()).expect("list presets");
    assert_eq!(names, vec!["night_watch".to_string()]);

    let loaded = Preset::load(dir.path(), "night_watch").expect("load preset");
    assert_eq!(loaded.engine.loitering_threshold_secs, 90);
    assert_eq!(loaded.policy.notify_on_detection_threshold, 3);

    assert!(Preset::load(dir.path(), "missing").is_err());
}
