//! sentrycamd - sentrycam daemon
//!
//! This daemon:
//! 1. Pulls per-frame detection lists from the configured source
//! 2. Runs the tracking-and-anomaly engine on each frame
//! 3. Persists detections and anomaly events to the record store
//! 4. Hands recording/notification intents to external collaborators
//! 5. Enforces record retention periodically

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use sentrycam::{
    now_s, ActionIntent, DetectionSource, Engine, FrameDetections, LogSink, Notification,
    NotificationSink, RecordStore, ScriptedSource, SentrycamConfig,
};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = SentrycamConfig::load()?;
    let mut store = RecordStore::open(&cfg.db_path)?;
    let mut engine = Engine::new(cfg.engine.clone(), cfg.policy.clone());
    let mut sink = LogSink;

    // Stands in for a live detector; real deployments replace this with a
    // source bridging the inference process.
    let mut source = demo_source(cfg.video.width, cfg.video.height);

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let frame_interval = Duration::from_millis(1_000 / cfg.video.target_fps.max(1) as u64);
    let mut frame_number = 0u64;
    let mut last_prune = Instant::now();
    let mut event_count = 0u64;

    log::info!("sentrycamd running. writing to {}", cfg.db_path);
    log::info!(
        "video {}x{} @ {} fps, retention {}s",
        cfg.video.width,
        cfg.video.height,
        cfg.video.target_fps,
        cfg.retention.as_secs()
    );

    while running.load(Ordering::SeqCst) {
        let Some(frame) = source.next_frame()? else {
            log::info!("detection source exhausted");
            break;
        };

        frame_number += 1;
        let now = now_s()?;
        let result = engine.process_frame(
            frame_number,
            (frame.width, frame.height),
            frame.detections,
            now,
        );

        let created_at = now as u64;
        for detection in &result.detections {
            store.log_detection(detection, frame_number, created_at)?;
        }
        for event in &result.events {
            store.log_anomaly(event, created_at)?;
            event_count += 1;
        }

        for intent in &result.intents {
            match intent {
                ActionIntent::StartRecording => {
                    log::info!("frame {}: recording requested", frame_number);
                }
                ActionIntent::StopRecording => {
                    log::info!("frame {}: recording stop requested", frame_number);
                }
                ActionIntent::Notify { subject, body } => {
                    let notification = Notification::new(subject.clone(), body.clone());
                    if let Err(e) = sink.deliver(&notification) {
                        log::error!("notification delivery failed: {}", e);
                    }
                }
            }
        }

        if last_prune.elapsed() > Duration::from_secs(60) {
            let removed = store.enforce_retention(cfg.retention, created_at)?;
            if removed > 0 {
                log::info!("retention pass removed {} records", removed);
            }
            last_prune = Instant::now();
        }

        std::thread::sleep(frame_interval);
    }

    log::info!(
        "sentrycamd stopping after {} frames, {} anomaly events",
        frame_number,
        event_count
    );
    Ok(())
}

/// A short looping scene: a person lingers near a backpack while a car
/// passes through. Which detections survive filtering depends on the
/// configured class list.
fn demo_source(width: u32, height: u32) -> ScriptedSource {
    use sentrycam::{BoundingBox, Detection};

    let person = |x: f64| {
        Detection::new(
            "person",
            0.9,
            BoundingBox::new(x, 200.0, x + 80.0, 400.0),
        )
    };
    let backpack = Detection::new(
        "backpack",
        0.8,
        BoundingBox::new(260.0, 330.0, 320.0, 400.0),
    );
    let car = |x: f64| {
        Detection::new("car", 0.85, BoundingBox::new(x, 100.0, x + 160.0, 220.0))
    };

    let frames = vec![
        FrameDetections {
            width,
            height,
            detections: vec![person(200.0), backpack.clone()],
        },
        FrameDetections {
            width,
            height,
            detections: vec![person(205.0), backpack.clone(), car(40.0)],
        },
        FrameDetections {
            width,
            height,
            detections: vec![person(210.0), backpack, car(400.0)],
        },
        FrameDetections {
            width,
            height,
            detections: vec![person(215.0)],
        },
    ];
    ScriptedSource::new(frames).looping()
}
