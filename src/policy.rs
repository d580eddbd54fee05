//! Action policy.
//!
//! Maps a frame's aggregated outcome (anomaly events, detection count) to
//! side-effect intents. The kernel never records video or delivers
//! notifications itself; external collaborators consume the intents.

use serde::{Deserialize, Serialize};

use crate::config::PolicyConfig;
use crate::rules::AnomalyEvent;

/// A requested side effect, consumed by external collaborators.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ActionIntent {
    StartRecording,
    StopRecording,
    Notify { subject: String, body: String },
}

/// Recording lifecycle. Recording is time-boxed once started: the stop
/// decision depends only on elapsed wall-clock, not on anomaly state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum RecordingState {
    #[default]
    Idle,
    Active {
        /// Epoch seconds at which recording started.
        started_at: f64,
    },
}

/// Per-frame intent derivation with recording debounce.
#[derive(Debug, Default)]
pub struct ActionPolicy {
    config: PolicyConfig,
    recording: RecordingState,
}

impl ActionPolicy {
    pub fn new(config: PolicyConfig) -> Self {
        Self {
            config,
            recording: RecordingState::default(),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut PolicyConfig {
        &mut self.config
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.recording, RecordingState::Active { .. })
    }

    /// Derive this frame's intents. Never fails; a non-positive notification
    /// threshold means "threshold never reached".
    pub fn evaluate(
        &mut self,
        detection_count: usize,
        events: &[AnomalyEvent],
        now: f64,
    ) -> Vec<ActionIntent> {
        let mut intents = Vec::new();
        let anomaly_occurred = !events.is_empty();

        if anomaly_occurred && self.config.automatic_recording && !self.is_recording() {
            self.recording = RecordingState::Active { started_at: now };
            intents.push(ActionIntent::StartRecording);
        }

        if let RecordingState::Active { started_at } = self.recording {
            if now - started_at > self.config.recording_duration_secs as f64 {
                self.recording = RecordingState::Idle;
                intents.push(ActionIntent::StopRecording);
            }
        }

        if self.config.notify_on_anomaly {
            if let Some(last) = events.last() {
                intents.push(ActionIntent::Notify {
                    subject: "Anomaly Detected".to_string(),
                    body: last.message.clone(),
                });
            }
        }

        let threshold = self.config.notify_on_detection_threshold;
        if threshold > 0 && detection_count >= threshold as usize {
            intents.push(ActionIntent::Notify {
                subject: "Detection Threshold Reached".to_string(),
                body: format!(
                    "The number of detections has reached the threshold of {}.",
                    threshold
                ),
            });
        }

        intents
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;
    use crate::rules::AnomalyKind;

    fn event(message: &str) -> AnomalyEvent {
        AnomalyEvent {
            kind: AnomalyKind::UnusualSize,
            message: message.to_string(),
            subject: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            frame_number: 1,
            severity: 1,
        }
    }

    fn recording_config() -> PolicyConfig {
        PolicyConfig {
            automatic_recording: true,
            recording_duration_secs: 30,
            notify_on_anomaly: false,
            notify_on_detection_threshold: 0,
        }
    }

    #[test]
    fn recording_starts_once_and_stops_after_duration() {
        let mut policy = ActionPolicy::new(recording_config());

        let intents = policy.evaluate(1, &[event("a")], 100.0);
        assert_eq!(intents, vec![ActionIntent::StartRecording]);
        assert!(policy.is_recording());

        // Still recording: no duplicate start even with a fresh anomaly.
        let intents = policy.evaluate(1, &[event("b")], 110.0);
        assert!(intents.is_empty());

        // Time-boxed stop fires regardless of anomaly state.
        let intents = policy.evaluate(0, &[], 131.0);
        assert_eq!(intents, vec![ActionIntent::StopRecording]);
        assert!(!policy.is_recording());
    }

    #[test]
    fn anomaly_notification_carries_last_event_message() {
        let mut policy = ActionPolicy::new(PolicyConfig {
            notify_on_anomaly: true,
            notify_on_detection_threshold: 0,
            automatic_recording: false,
            recording_duration_secs: 30,
        });
        let intents = policy.evaluate(1, &[event("first"), event("second")], 0.0);
        assert_eq!(
            intents,
            vec![ActionIntent::Notify {
                subject: "Anomaly Detected".to_string(),
                body: "second".to_string(),
            }]
        );
    }

    #[test]
    fn both_notification_kinds_can_fire_in_one_frame() {
        let mut policy = ActionPolicy::new(PolicyConfig {
            notify_on_anomaly: true,
            notify_on_detection_threshold: 2,
            automatic_recording: false,
            recording_duration_secs: 30,
        });
        let intents = policy.evaluate(3, &[event("a")], 0.0);
        assert_eq!(intents.len(), 2);
    }

    #[test]
    fn zero_threshold_disables_detection_notifications() {
        let mut policy = ActionPolicy::new(PolicyConfig {
            notify_on_anomaly: false,
            notify_on_detection_threshold: 0,
            automatic_recording: false,
            recording_duration_secs: 30,
        });
        assert!(policy.evaluate(1000, &[], 0.0).is_empty());
    }
}
