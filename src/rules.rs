//! Anomaly rule set.
//!
//! One evaluator per rule kind, each reading/writing tracked-object state
//! and emitting zero or more [`AnomalyEvent`]s. Evaluators never fail:
//! missing context (no restricted area configured, no previous frame) is a
//! no-fire. The engine drives them in a fixed order per frame.

use serde::{Deserialize, Serialize};

use crate::detect::{Detection, CARRIED_OBJECT_LABELS};
use crate::geometry::{centroid_distance, BoundingBox};
use crate::track::{AreaState, LoiterState, ObjectKey, TrackedObject};

/// Behavioral deviation categories flagged by the rule set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    SuddenAppearance,
    SuddenDisappearance,
    RestrictedAreaDwell,
    RapidMovement,
    UnusualSize,
    Loitering,
    ObjectInteraction,
    SuspiciousInteraction,
}

impl AnomalyKind {
    /// Stable label used in persisted records and operator-facing logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::SuddenAppearance => "Sudden Appearance",
            AnomalyKind::SuddenDisappearance => "Sudden Disappearance",
            AnomalyKind::RestrictedAreaDwell => "Restricted Area",
            AnomalyKind::RapidMovement => "Rapid Movement",
            AnomalyKind::UnusualSize => "Unusual Size",
            AnomalyKind::Loitering => "Loitering",
            AnomalyKind::ObjectInteraction => "Object Interaction",
            AnomalyKind::SuspiciousInteraction => "Suspicious Interaction",
        }
    }
}

/// A flagged behavioral deviation. Immutable once created; the action
/// policy and external persistence consume it verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    pub kind: AnomalyKind,
    pub message: String,
    pub subject: BoundingBox,
    pub frame_number: u64,
    /// 1 (informational) to 3 (critical).
    pub severity: u8,
}

/// Pairwise interaction classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionClass {
    PersonPerson,
    PersonObject,
    ObjectObject,
}

impl InteractionClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionClass::PersonPerson => "Person-Person",
            InteractionClass::PersonObject => "Person-Object",
            InteractionClass::ObjectObject => "Object-Object",
        }
    }
}

fn classify_interaction(a: &Detection, b: &Detection) -> InteractionClass {
    match (a.is_person(), b.is_person()) {
        (true, true) => InteractionClass::PersonPerson,
        (true, false) | (false, true) => InteractionClass::PersonObject,
        (false, false) => InteractionClass::ObjectObject,
    }
}

/// Rule 1: sudden appearance.
///
/// Fires exactly once, on the frame the object's key was created. An object
/// tracked within `threshold_frames` of creation is by definition newly
/// appeared; repeating the event every frame inside the window would
/// triple-report a single entrance.
pub(crate) fn sudden_appearance(
    detection: &Detection,
    object: &TrackedObject,
    frame_number: u64,
    threshold_frames: u64,
) -> Option<AnomalyEvent> {
    let age = frame_number.saturating_sub(object.first_detected_frame);
    if age <= threshold_frames && object.first_detected_frame == frame_number {
        return Some(AnomalyEvent {
            kind: AnomalyKind::SuddenAppearance,
            message: format!("{} suddenly appeared", detection.label),
            subject: detection.bounds,
            frame_number,
            severity: 1,
        });
    }
    None
}

/// Rule 2: restricted-area dwell.
///
/// Entering the area arms the dwell clock at `now`; leaving clears it. The
/// event fires while continuous presence exceeds `threshold_secs`.
pub(crate) fn restricted_area_dwell(
    detection: &Detection,
    object: &mut TrackedObject,
    restricted_area: Option<&BoundingBox>,
    threshold_secs: u64,
    now: f64,
    frame_number: u64,
) -> Option<AnomalyEvent> {
    let area = restricted_area?;
    if area.encloses(&detection.bounds) {
        let since = match object.area_state {
            AreaState::InArea { since } => since,
            AreaState::NotInArea => {
                object.area_state = AreaState::InArea { since: now };
                now
            }
        };
        let elapsed = now - since;
        if elapsed > threshold_secs as f64 {
            return Some(AnomalyEvent {
                kind: AnomalyKind::RestrictedAreaDwell,
                message: format!("Object in restricted area for {:.2} seconds", elapsed),
                subject: detection.bounds,
                frame_number,
                severity: 2,
            });
        }
    } else {
        object.area_state = AreaState::NotInArea;
    }
    None
}

/// Rule 3: rapid movement.
///
/// Compares against the first same-labeled detection in the previous
/// frame's set. Label matching (not key matching) can cross-match when
/// several objects share a label; kept as a known limitation.
pub(crate) fn rapid_movement(
    detection: &Detection,
    previous_frame: Option<&[Detection]>,
    threshold_px: f64,
    frame_number: u64,
) -> Option<AnomalyEvent> {
    let prev = previous_frame?
        .iter()
        .find(|p| p.label == detection.label)?;
    let moved = centroid_distance(&prev.bounds, &detection.bounds);
    if moved > threshold_px {
        return Some(AnomalyEvent {
            kind: AnomalyKind::RapidMovement,
            message: format!("Object moved {:.2} pixels", moved),
            subject: detection.bounds,
            frame_number,
            severity: 2,
        });
    }
    None
}

/// Rule 4: unusual size. Fires while the box covers more than a quarter of
/// the frame.
pub(crate) fn unusual_size(
    detection: &Detection,
    frame_area: f64,
    frame_number: u64,
) -> Option<AnomalyEvent> {
    let object_area = detection.bounds.area().ok()?;
    if object_area > frame_area / 4.0 {
        return Some(AnomalyEvent {
            kind: AnomalyKind::UnusualSize,
            message: "Unusually large object detected".to_string(),
            subject: detection.bounds,
            frame_number,
            severity: 1,
        });
    }
    None
}

/// Rule 5: loitering. Persons only; a non-person detection on the same key
/// lineage clears the loiter clock.
pub(crate) fn loitering(
    detection: &Detection,
    object: &mut TrackedObject,
    threshold_secs: u64,
    now: f64,
    frame_number: u64,
) -> Option<AnomalyEvent> {
    if !detection.is_person() {
        object.loiter_state = LoiterState::NotLoitering;
        return None;
    }
    match object.loiter_state {
        LoiterState::NotLoitering => {
            object.loiter_state = LoiterState::Loitering { since: now };
            None
        }
        LoiterState::Loitering { since } => {
            let duration = now - since;
            if duration > threshold_secs as f64 {
                Some(AnomalyEvent {
                    kind: AnomalyKind::Loitering,
                    message: format!("Person loitering for {:.2} seconds", duration),
                    subject: detection.bounds,
                    frame_number,
                    severity: 2,
                })
            } else {
                None
            }
        }
    }
}

/// Rule 6: sudden disappearance, for one tracked object absent from the
/// current frame.
pub(crate) fn sudden_disappearance(
    key: &ObjectKey,
    object: &TrackedObject,
    frame_number: u64,
    threshold_frames: u64,
) -> Option<AnomalyEvent> {
    if frame_number.saturating_sub(object.last_detected_frame) <= threshold_frames {
        let bounds = object.last_position()?;
        return Some(AnomalyEvent {
            kind: AnomalyKind::SuddenDisappearance,
            message: format!("{} suddenly disappeared", key.label),
            subject: *bounds,
            frame_number,
            severity: 1,
        });
    }
    None
}

/// Rule 7: pairwise interactions over the whole detection set.
///
/// Each unordered pair is evaluated exactly once (`i < j`). A person close
/// to a carried object (bag, suitcase, backpack) is suspicious; every other
/// close pair is an ordinary interaction.
pub(crate) fn interactions(
    detections: &[Detection],
    threshold_px: f64,
    frame_number: u64,
) -> Vec<AnomalyEvent> {
    let mut events = Vec::new();
    for i in 0..detections.len() {
        for j in (i + 1)..detections.len() {
            let a = &detections[i];
            let b = &detections[j];
            let distance = centroid_distance(&a.bounds, &b.bounds);
            if distance >= threshold_px {
                continue;
            }
            let class = classify_interaction(a, b);
            let carried = match class {
                InteractionClass::PersonObject => {
                    let other = if a.is_person() { b } else { a };
                    CARRIED_OBJECT_LABELS
                        .contains(&other.label.as_str())
                        .then(|| other.label.clone())
                }
                _ => None,
            };
            let event = match carried {
                Some(label) => AnomalyEvent {
                    kind: AnomalyKind::SuspiciousInteraction,
                    message: format!("Person interacting with {}", label),
                    subject: a.bounds,
                    frame_number,
                    severity: 3,
                },
                None => AnomalyEvent {
                    kind: AnomalyKind::ObjectInteraction,
                    message: format!("{} interaction detected", class.as_str()),
                    subject: a.bounds,
                    frame_number,
                    severity: 1,
                },
            };
            events.push(event);
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackStore;

    fn det(label: &str, xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Detection {
        Detection::new(label, 0.9, BoundingBox::new(xmin, ymin, xmax, ymax))
    }

    #[test]
    fn appearance_fires_only_on_creation_frame() {
        let mut store = TrackStore::new();
        let d = det("person", 0.0, 0.0, 50.0, 50.0);
        let key = ObjectKey::positional(&d);

        store.get_or_create(&key, 10);
        let obj = store.get(&key).unwrap();
        assert!(sudden_appearance(&d, obj, 10, 3).is_some());

        store.touch(&key, 11);
        let obj = store.get(&key).unwrap();
        assert!(sudden_appearance(&d, obj, 11, 3).is_none());
    }

    #[test]
    fn dwell_clock_resets_on_reentry() {
        let mut store = TrackStore::new();
        let area = BoundingBox::new(100.0, 100.0, 400.0, 400.0);
        let inside = det("person", 150.0, 150.0, 250.0, 350.0);
        let outside = det("person", 500.0, 500.0, 550.0, 550.0);
        let key = ObjectKey::positional(&inside);
        let obj = store.get_or_create(&key, 0);

        // Enter at t=0: clock armed, no fire.
        assert!(restricted_area_dwell(&inside, obj, Some(&area), 5, 0.0, 0).is_none());
        // t=4: under threshold.
        assert!(restricted_area_dwell(&inside, obj, Some(&area), 5, 4.0, 1).is_none());
        // t=6: over threshold, fires with severity 2.
        let ev = restricted_area_dwell(&inside, obj, Some(&area), 5, 6.0, 2).unwrap();
        assert_eq!(ev.kind, AnomalyKind::RestrictedAreaDwell);
        assert_eq!(ev.severity, 2);

        // Leave, re-enter at t=10: clock restarts, so t=12 is under threshold.
        assert!(restricted_area_dwell(&outside, obj, Some(&area), 5, 8.0, 3).is_none());
        assert_eq!(obj.area_state, AreaState::NotInArea);
        assert!(restricted_area_dwell(&inside, obj, Some(&area), 5, 10.0, 4).is_none());
        assert!(restricted_area_dwell(&inside, obj, Some(&area), 5, 12.0, 5).is_none());
    }

    #[test]
    fn dwell_without_configured_area_never_fires() {
        let mut store = TrackStore::new();
        let inside = det("person", 150.0, 150.0, 250.0, 350.0);
        let key = ObjectKey::positional(&inside);
        let obj = store.get_or_create(&key, 0);
        assert!(restricted_area_dwell(&inside, obj, None, 5, 100.0, 0).is_none());
        assert_eq!(obj.area_state, AreaState::NotInArea);
    }

    #[test]
    fn rapid_movement_matches_previous_frame_by_label() {
        let prev = vec![det("car", 0.0, 0.0, 10.0, 10.0)];
        let moved = det("car", 100.0, 0.0, 110.0, 10.0);
        let ev = rapid_movement(&moved, Some(&prev), 50.0, 7).unwrap();
        assert_eq!(ev.kind, AnomalyKind::RapidMovement);
        assert_eq!(ev.severity, 2);

        // Different label: no match, no fire.
        let other = det("person", 100.0, 0.0, 110.0, 10.0);
        assert!(rapid_movement(&other, Some(&prev), 50.0, 7).is_none());
        // No previous frame: no fire.
        assert!(rapid_movement(&moved, None, 50.0, 7).is_none());
    }

    #[test]
    fn unusual_size_threshold_is_quarter_frame() {
        let frame_area = 800.0 * 600.0;
        let big = det("car", 0.0, 0.0, 400.0, 400.0);
        assert!(unusual_size(&big, frame_area, 1).is_some());
        let exactly_quarter = det("car", 0.0, 0.0, 400.0, 300.0);
        assert!(unusual_size(&exactly_quarter, frame_area, 1).is_none());
    }

    #[test]
    fn loitering_applies_to_persons_only() {
        let mut store = TrackStore::new();
        let person = det("person", 0.0, 0.0, 50.0, 50.0);
        let key = ObjectKey::positional(&person);
        let obj = store.get_or_create(&key, 0);

        assert!(loitering(&person, obj, 30, 0.0, 0).is_none());
        assert!(loitering(&person, obj, 30, 29.0, 1).is_none());
        let ev = loitering(&person, obj, 30, 31.0, 2).unwrap();
        assert_eq!(ev.kind, AnomalyKind::Loitering);

        // A non-person on the same lineage clears the clock.
        let car = det("car", 0.0, 0.0, 50.0, 50.0);
        assert!(loitering(&car, obj, 30, 32.0, 3).is_none());
        assert_eq!(obj.loiter_state, LoiterState::NotLoitering);
    }

    #[test]
    fn suspicious_interaction_requires_person_and_carried_object() {
        let detections = vec![
            det("person", 0.0, 0.0, 50.0, 50.0),
            det("backpack", 20.0, 20.0, 60.0, 60.0),
        ];
        let events = interactions(&detections, 50.0, 3);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AnomalyKind::SuspiciousInteraction);
        assert_eq!(events[0].severity, 3);
        assert_eq!(events[0].message, "Person interacting with backpack");
    }

    #[test]
    fn interactions_evaluate_each_unordered_pair_once() {
        let detections = vec![
            det("person", 0.0, 0.0, 10.0, 10.0),
            det("person", 5.0, 5.0, 15.0, 15.0),
            det("car", 500.0, 500.0, 520.0, 520.0),
        ];
        let events = interactions(&detections, 50.0, 3);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AnomalyKind::ObjectInteraction);
        assert_eq!(events[0].message, "Person-Person interaction detected");
    }

    #[test]
    fn carried_object_order_does_not_matter() {
        let detections = vec![
            det("suitcase", 0.0, 0.0, 50.0, 50.0),
            det("person", 20.0, 20.0, 60.0, 60.0),
        ];
        let events = interactions(&detections, 50.0, 3);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AnomalyKind::SuspiciousInteraction);
        assert_eq!(events[0].message, "Person interacting with suitcase");
    }
}
