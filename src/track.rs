//! Tracked-object store.
//!
//! One `TrackedObject` per `ObjectKey` holds the cross-frame state the rule
//! set reads and writes. The store is exclusively owned and mutated by the
//! frame engine; rule evaluators receive access scoped to one evaluation
//! call. Deletion happens only through `sweep`, so the disappearance rule
//! can still see an entry the frame after its object vanishes.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::detect::Detection;
use crate::geometry::BoundingBox;

/// Capacity of the per-object position ring. Rapid movement only looks one
/// frame back; the ring keeps a short trail for windowed rules.
pub const POSITION_HISTORY_CAP: usize = 16;

/// Identity of a tracked object: label plus the top-left corner (whole
/// pixels) where it was first observed.
///
/// This is a positional scheme: detector jitter in the corner creates a new
/// identity. The rule set tolerates that; `KeyResolver` exists so a stronger
/// correspondence scheme can be substituted without touching rule logic.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub label: String,
    pub xmin: i64,
    pub ymin: i64,
}

impl ObjectKey {
    pub fn positional(detection: &Detection) -> Self {
        Self {
            label: detection.label.clone(),
            xmin: detection.bounds.xmin.round() as i64,
            ymin: detection.bounds.ymin.round() as i64,
        }
    }
}

/// Maps a detection to its tracking key.
pub trait KeyResolver {
    fn resolve(&self, detection: &Detection, store: &TrackStore) -> ObjectKey;
}

/// Default correspondence: label + first-seen top-left corner.
#[derive(Clone, Copy, Debug, Default)]
pub struct PositionalKeyResolver;

impl KeyResolver for PositionalKeyResolver {
    fn resolve(&self, detection: &Detection, _store: &TrackStore) -> ObjectKey {
        ObjectKey::positional(detection)
    }
}

/// Restricted-area dwell state of a tracked object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum AreaState {
    #[default]
    NotInArea,
    InArea {
        /// Epoch seconds at which the object entered the area.
        since: f64,
    },
}

/// Loitering state of a tracked object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum LoiterState {
    #[default]
    NotLoitering,
    Loitering {
        /// Epoch seconds at which continuous presence started.
        since: f64,
    },
}

/// Per-object state persisted across frames.
#[derive(Clone, Debug)]
pub struct TrackedObject {
    pub first_detected_frame: u64,
    pub last_detected_frame: u64,
    pub area_state: AreaState,
    pub loiter_state: LoiterState,
    positions: VecDeque<BoundingBox>,
}

impl TrackedObject {
    fn new(frame_number: u64) -> Self {
        Self {
            first_detected_frame: frame_number,
            last_detected_frame: frame_number,
            area_state: AreaState::default(),
            loiter_state: LoiterState::default(),
            positions: VecDeque::with_capacity(POSITION_HISTORY_CAP),
        }
    }

    /// Append a position, evicting the oldest when the ring is full.
    pub fn push_position(&mut self, bounds: BoundingBox) {
        if self.positions.len() == POSITION_HISTORY_CAP {
            self.positions.pop_front();
        }
        self.positions.push_back(bounds);
    }

    pub fn last_position(&self) -> Option<&BoundingBox> {
        self.positions.back()
    }

    pub fn positions(&self) -> impl Iterator<Item = &BoundingBox> {
        self.positions.iter()
    }
}

/// Keyed table of tracked objects. Ordered so per-frame iteration (and with
/// it the emitted event order) is deterministic for identical inputs.
#[derive(Default)]
pub struct TrackStore {
    objects: BTreeMap<ObjectKey, TrackedObject>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&TrackedObject> {
        self.objects.get(key)
    }

    pub fn get_mut(&mut self, key: &ObjectKey) -> Option<&mut TrackedObject> {
        self.objects.get_mut(key)
    }

    /// Lookup that creates a defaulted entry when absent.
    /// `first_detected_frame` is only ever set here, at creation.
    pub fn get_or_create(&mut self, key: &ObjectKey, frame_number: u64) -> &mut TrackedObject {
        self.objects
            .entry(key.clone())
            .or_insert_with(|| TrackedObject::new(frame_number))
    }

    /// Mark the object as seen in `frame_number`.
    pub fn touch(&mut self, key: &ObjectKey, frame_number: u64) {
        if let Some(obj) = self.objects.get_mut(key) {
            obj.last_detected_frame = frame_number;
        }
    }

    pub fn remove(&mut self, key: &ObjectKey) -> Option<TrackedObject> {
        self.objects.remove(key)
    }

    /// Garbage-collect objects unseen for more than `max_age_frames`.
    ///
    /// The sole deletion path; called once per frame after rule evaluation.
    /// Returns the number of objects removed. Sweeping an empty store is a
    /// no-op.
    pub fn sweep(&mut self, current_frame: u64, max_age_frames: u64) -> usize {
        let before = self.objects.len();
        self.objects
            .retain(|_, obj| current_frame.saturating_sub(obj.last_detected_frame) <= max_age_frames);
        before - self.objects.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectKey, &TrackedObject)> {
        self.objects.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.objects.keys()
    }
}
