use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::{AnalysisOutput, AnalysisResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CyclePhase {
    Waiting,
    Analyzing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum MonitorStatus {
    CameraUninitialized,
    CameraReady,
    Monitoring { phase: CyclePhase },
    CameraOff,
    CameraError { message: String },
}

impl Default for MonitorStatus {
    fn default() -> Self {
        MonitorStatus::CameraUninitialized
    }
}

impl MonitorStatus {
    pub fn is_monitoring(&self) -> bool {
        matches!(self, MonitorStatus::Monitoring { .. })
    }

    pub fn camera_on(&self) -> bool {
        matches!(
            self,
            MonitorStatus::CameraReady | MonitorStatus::Monitoring { .. }
        )
    }
}

/// One verdict recorded during a monitoring session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisEvent {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub is_suspicious: bool,
    pub reason: String,
}

impl AnalysisEvent {
    pub fn new(output: &AnalysisOutput, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            is_suspicious: output.is_suspicious,
            reason: output.reason.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorState {
    pub status: MonitorStatus,
    pub has_camera_permission: bool,
    pub head_movement: String,
    pub contextual_cues: String,
    pub last_result: Option<AnalysisResult>,
    /// Newest first.
    pub events: Vec<AnalysisEvent>,
    /// Bumped on every session start, stop and teardown. A cycle whose
    /// generation no longer matches drops its result.
    pub generation: u64,
    /// Generation of the cycle currently awaiting the classifier, if any.
    pub in_flight: Option<u64>,
    pub capture_error_reported: bool,
}

impl MonitorState {
    pub fn new(head_movement: String, contextual_cues: String) -> Self {
        Self {
            status: MonitorStatus::CameraUninitialized,
            has_camera_permission: false,
            head_movement,
            contextual_cues,
            last_result: None,
            events: Vec::new(),
            generation: 0,
            in_flight: None,
            capture_error_reported: false,
        }
    }

    pub fn begin_session(&mut self) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.events.clear();
        self.last_result = None;
        self.capture_error_reported = false;
        self.status = MonitorStatus::Monitoring {
            phase: CyclePhase::Waiting,
        };
        self.generation
    }

    /// Invalidates whatever cycle is currently awaiting the classifier.
    /// The marker stays set until that cycle returns, so no second call
    /// can start before it.
    pub fn invalidate_in_flight(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn set_phase(&mut self, phase: CyclePhase) {
        if self.status.is_monitoring() {
            self.status = MonitorStatus::Monitoring { phase };
        }
    }

    pub fn record(&mut self, event: AnalysisEvent) {
        self.events.insert(0, event);
    }

    pub fn snapshot(&self, interval_secs: u64) -> MonitorSnapshot {
        MonitorSnapshot {
            status: self.status.clone(),
            has_camera_permission: self.has_camera_permission,
            is_camera_on: self.status.camera_on(),
            is_analyzing: self.in_flight == Some(self.generation),
            head_movement: self.head_movement.clone(),
            contextual_cues: self.contextual_cues.clone(),
            last_result: self.last_result.clone(),
            events: self.events.clone(),
            interval_secs,
        }
    }
}

/// What the page renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSnapshot {
    pub status: MonitorStatus,
    pub has_camera_permission: bool,
    pub is_camera_on: bool,
    pub is_analyzing: bool,
    pub head_movement: String,
    pub contextual_cues: String,
    pub last_result: Option<AnalysisResult>,
    pub events: Vec<AnalysisEvent>,
    pub interval_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(reason: &str) -> AnalysisEvent {
        AnalysisEvent::new(
            &AnalysisOutput {
                is_suspicious: false,
                reason: reason.into(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn record_keeps_newest_first() {
        let mut state = MonitorState::new(String::new(), String::new());
        state.record(event("first"));
        state.record(event("second"));

        let reasons: Vec<_> = state.events.iter().map(|e| e.reason.as_str()).collect();
        assert_eq!(reasons, ["second", "first"]);
    }

    #[test]
    fn begin_session_clears_log_and_bumps_generation() {
        let mut state = MonitorState::new(String::new(), String::new());
        state.status = MonitorStatus::CameraReady;
        state.record(event("old"));
        let before = state.generation;

        let generation = state.begin_session();

        assert!(state.events.is_empty());
        assert_eq!(generation, before + 1);
        assert_eq!(
            state.status,
            MonitorStatus::Monitoring {
                phase: CyclePhase::Waiting
            }
        );
    }

    #[test]
    fn phase_only_changes_while_monitoring() {
        let mut state = MonitorState::new(String::new(), String::new());
        state.status = MonitorStatus::CameraReady;

        state.set_phase(CyclePhase::Analyzing);

        assert_eq!(state.status, MonitorStatus::CameraReady);
    }

    #[test]
    fn status_serializes_with_kind_tag() {
        let value = serde_json::to_value(MonitorStatus::Monitoring {
            phase: CyclePhase::Analyzing,
        })
        .unwrap();
        assert_eq!(value["kind"], "monitoring");
        assert_eq!(value["phase"], "analyzing");
    }
}
