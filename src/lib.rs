//! sentrycam - frame-synchronous tracking and anomaly classification kernel
//!
//! This crate is the behavioral core of a smart security camera: it ingests
//! a per-frame list of detected objects, maintains identity and history for
//! every tracked object, flags anomalous behavior, and turns rule firings
//! into side-effect intents for external collaborators.
//!
//! # Architecture
//!
//! - `geometry`: bounding-box math (centroid, distance, area, containment)
//! - `detect`: detector output types and the class/confidence filter
//! - `track`: keyed tracked-object store with age-based garbage collection
//! - `rules`: the anomaly rule set, one evaluator per rule kind
//! - `engine`: per-frame orchestration of tracking, rules, and sweep
//! - `policy`: recording/notification intents with debouncing
//! - `config`: engine/policy settings, daemon config loader, presets
//! - `storage`: SQLite sink for detection and anomaly records
//! - `notify`: notification delivery seam
//! - `source`: detection source seam plus a scripted stand-in
//!
//! Processing is single-threaded and frame-synchronous: one frame runs to
//! completion (tracker update, rules, sweep, action policy) before the next
//! is accepted. Detectors, video capture, rendering, and notification
//! transports are external; the kernel only consumes detection lists and
//! emits events and intents.

use anyhow::Result;
use std::time::{SystemTime, UNIX_EPOCH};

pub mod config;
pub mod detect;
pub mod engine;
pub mod geometry;
pub mod notify;
pub mod policy;
pub mod rules;
pub mod source;
pub mod storage;
pub mod track;

pub use config::{EngineConfig, PolicyConfig, Preset, SentrycamConfig};
pub use detect::Detection;
pub use engine::{Engine, FrameResult};
pub use geometry::BoundingBox;
pub use notify::{LogSink, MemorySink, Notification, NotificationSink};
pub use policy::{ActionIntent, ActionPolicy, RecordingState};
pub use rules::{AnomalyEvent, AnomalyKind};
pub use source::{DetectionSource, FrameDetections, ScriptedSource};
pub use storage::{RecordStore, RecordTable};
pub use track::{
    KeyResolver, ObjectKey, PositionalKeyResolver, TrackStore, TrackedObject,
};

/// Wall-clock seconds since the Unix epoch.
///
/// The engine itself never calls this; `process_frame` takes `now` from the
/// caller so frame processing stays deterministic.
pub fn now_s() -> Result<f64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs_f64())
}
