//! Frame anomaly orchestrator.
//!
//! Drives one frame to completion: filter detections, update the tracked
//! object store, run the rule set in fixed order, sweep stale objects, then
//! hand the frame's outcome to the action policy. Single-threaded and
//! frame-synchronous; the engine never blocks on I/O and nothing escapes
//! `process_frame` as an error.

use std::collections::HashSet;

use crate::config::{EngineConfig, PolicyConfig};
use crate::detect::{filter_detections, Detection};
use crate::policy::{ActionIntent, ActionPolicy};
use crate::rules::{self, AnomalyEvent};
use crate::track::{KeyResolver, PositionalKeyResolver, TrackStore};

/// Outcome of one processed frame.
#[derive(Clone, Debug, Default)]
pub struct FrameResult {
    /// Anomaly events fired this frame, in rule-evaluation order.
    pub events: Vec<AnomalyEvent>,
    /// Side-effect intents for external collaborators.
    pub intents: Vec<ActionIntent>,
    /// Detections that passed filtering and box validation.
    pub detections: Vec<Detection>,
}

impl FrameResult {
    pub fn anomaly_occurred(&self) -> bool {
        !self.events.is_empty()
    }
}

/// The tracking-and-anomaly-classification engine.
///
/// Owns the tracked-object store for the lifetime of a processing session.
/// Configuration may be changed between frames via `config_mut`; it is
/// read-only while a frame is being processed.
pub struct Engine {
    config: EngineConfig,
    store: TrackStore,
    policy: ActionPolicy,
    resolver: Box<dyn KeyResolver>,
    previous_detections: Option<Vec<Detection>>,
}

impl Engine {
    pub fn new(config: EngineConfig, policy: PolicyConfig) -> Self {
        Self::with_resolver(config, policy, Box::new(PositionalKeyResolver))
    }

    /// Build with a custom identity-resolution scheme.
    pub fn with_resolver(
        config: EngineConfig,
        policy: PolicyConfig,
        resolver: Box<dyn KeyResolver>,
    ) -> Self {
        Self {
            config,
            store: TrackStore::new(),
            policy: ActionPolicy::new(policy),
            resolver,
            previous_detections: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn policy(&self) -> &ActionPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut ActionPolicy {
        &mut self.policy
    }

    pub fn store(&self) -> &TrackStore {
        &self.store
    }

    /// Process one frame to completion.
    ///
    /// `now` is the caller's clock in epoch seconds; the engine never reads
    /// the system clock, so identical inputs yield identical results.
    /// Invalid detections are skipped and logged, never aborting the frame.
    pub fn process_frame(
        &mut self,
        frame_number: u64,
        frame_dims: (u32, u32),
        detections: Vec<Detection>,
        now: f64,
    ) -> FrameResult {
        let accepted = self.accept_detections(detections);
        let frame_area = frame_dims.0 as f64 * frame_dims.1 as f64;

        let mut events = Vec::new();
        let mut current_keys = HashSet::new();

        for detection in &accepted {
            let key = self.resolver.resolve(detection, &self.store);
            self.store.get_or_create(&key, frame_number);
            self.store.touch(&key, frame_number);
            let Some(object) = self.store.get_mut(&key) else {
                continue;
            };
            object.push_position(detection.bounds);

            if let Some(ev) = rules::sudden_appearance(
                detection,
                object,
                frame_number,
                self.config.sudden_appearance_frames,
            ) {
                events.push(ev);
            }
            if let Some(ev) = rules::restricted_area_dwell(
                detection,
                object,
                self.config.restricted_area.as_ref(),
                self.config.anomaly_threshold_secs,
                now,
                frame_number,
            ) {
                events.push(ev);
            }
            if let Some(ev) = rules::rapid_movement(
                detection,
                self.previous_detections.as_deref(),
                self.config.rapid_movement_px,
                frame_number,
            ) {
                events.push(ev);
            }
            if let Some(ev) = rules::unusual_size(detection, frame_area, frame_number) {
                events.push(ev);
            }
            if let Some(ev) = rules::loitering(
                detection,
                object,
                self.config.loitering_threshold_secs,
                now,
                frame_number,
            ) {
                events.push(ev);
            }

            current_keys.insert(key);
        }

        events.extend(rules::interactions(
            &accepted,
            self.config.interaction_distance_px,
            frame_number,
        ));

        for (key, object) in self.store.iter() {
            if current_keys.contains(key) {
                continue;
            }
            if let Some(ev) = rules::sudden_disappearance(
                key,
                object,
                frame_number,
                self.config.sudden_appearance_frames,
            ) {
                events.push(ev);
            }
        }

        let removed = self
            .store
            .sweep(frame_number, 2 * self.config.sudden_appearance_frames);
        if removed > 0 {
            log::debug!("frame {}: swept {} stale tracked objects", frame_number, removed);
        }

        for event in &events {
            log::info!(
                "frame {}: {} (severity {}): {}",
                frame_number,
                event.kind.as_str(),
                event.severity,
                event.message
            );
        }

        let intents = self.policy.evaluate(accepted.len(), &events, now);

        self.previous_detections = Some(accepted.clone());

        FrameResult {
            events,
            intents,
            detections: accepted,
        }
    }

    /// Apply the confidence/class filter and drop detections whose boxes
    /// are degenerate. Each rejection is isolated and logged.
    fn accept_detections(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let filtered = filter_detections(
            detections,
            self.config.confidence_threshold,
            &self.config.enabled_classes,
        );
        filtered
            .into_iter()
            .filter(|d| match d.bounds.validate() {
                Ok(()) => true,
                Err(e) => {
                    log::warn!("skipping detection '{}': {}", d.label, e);
                    false
                }
            })
            .collect()
    }
}
