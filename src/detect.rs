//! Detector output types.
//!
//! The detector itself (model loading, inference, video decode) lives
//! outside the kernel. This module defines the per-frame record the kernel
//! consumes and the class/confidence filter applied before tracking.

use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// Label used for people across the rule set.
pub const PERSON_LABEL: &str = "person";

/// Labels treated as carried objects by the suspicious-interaction rule.
pub const CARRIED_OBJECT_LABELS: [&str; 3] = ["bag", "suitcase", "backpack"];

/// One detector output for a single frame.
///
/// Detections are ephemeral: they exist for the duration of one
/// `process_frame` call and are owned by the caller.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Detector confidence in `0..=1`.
    pub confidence: f32,
    pub bounds: BoundingBox,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bounds: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bounds,
        }
    }

    pub fn is_person(&self) -> bool {
        self.label == PERSON_LABEL
    }
}

/// Apply the confidence threshold and enabled-class filter.
///
/// An empty class list disables class filtering entirely.
pub fn filter_detections(
    detections: Vec<Detection>,
    confidence_threshold: f32,
    enabled_classes: &[String],
) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= confidence_threshold)
        .filter(|d| {
            enabled_classes.is_empty() || enabled_classes.iter().any(|c| c == &d.label)
        })
        .collect()
}
