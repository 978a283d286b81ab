use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::RecordingArtifact;

/// Lifecycle of one recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Recording {
        elapsed_secs: u32,
    },
    Finalized,
}

impl SessionState {
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording { .. })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Recording { .. } => "recording",
            SessionState::Finalized => "finalized",
        }
    }
}

/// Why a session left `Recording`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum StopReason {
    /// Caller invoked stop
    Manual,
    /// Session timer hit the ceiling
    CeilingReached,
    /// Device failed or hung up mid-recording
    StreamFailed(String),
    /// Every handle was dropped while recording
    Shutdown,
}

impl StopReason {
    pub fn is_fault(&self) -> bool {
        matches!(self, StopReason::StreamFailed(_))
    }
}

/// What a finished session produced
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Artifact(RecordingArtifact),
    /// Stopped before any audio arrived
    NoData,
}

/// Delivered exactly once per session when it leaves `Recording`
#[derive(Debug, Clone)]
pub struct Completion {
    pub session_id: Uuid,
    pub reason: StopReason,
    pub outcome: SessionOutcome,
    /// Buffers the device delivered that never reached the encoder
    pub dropped_buffers: u64,
}

impl Completion {
    pub fn artifact(&self) -> Option<&RecordingArtifact> {
        match &self.outcome {
            SessionOutcome::Artifact(artifact) => Some(artifact),
            SessionOutcome::NoData => None,
        }
    }

    pub fn into_artifact(self) -> Option<RecordingArtifact> {
        match self.outcome {
            SessionOutcome::Artifact(artifact) => Some(artifact),
            SessionOutcome::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self.outcome, SessionOutcome::NoData)
    }
}
