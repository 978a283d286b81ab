use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::state::{SessionState, StopReason};
use crate::audio::RecordingArtifact;

/// Point-in-time view of the recording session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    /// Current lifecycle state
    pub state: SessionState,

    /// Current or most recent session, cleared on reset
    pub session_id: Option<Uuid>,

    /// When the current session started recording
    pub started_at: Option<DateTime<Utc>>,

    /// Seconds left before auto-stop (derived from elapsed)
    pub remaining_secs: u32,

    /// Whether the input device is held (the hardware indicator)
    pub input_active: bool,

    /// Why the last session stopped
    pub last_stop: Option<StopReason>,

    /// Buffers lost because the session fell behind the device
    pub dropped_buffers: u64,

    /// Summary of the artifact held while finalized
    pub artifact: Option<ArtifactSummary>,

    /// The artifact itself, for download and synthesis handoff
    #[serde(skip)]
    pub held_artifact: Option<RecordingArtifact>,
}

/// Serializable description of a finished recording
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub session_id: Uuid,
    pub media_type: String,
    pub bytes: usize,
    pub chunk_count: usize,
    pub duration_secs: f64,
    pub recorded_at: DateTime<Utc>,
}

impl From<&RecordingArtifact> for ArtifactSummary {
    fn from(artifact: &RecordingArtifact) -> Self {
        Self {
            session_id: artifact.session_id(),
            media_type: artifact.media_type(),
            bytes: artifact.len(),
            chunk_count: artifact.chunk_count(),
            duration_secs: artifact.duration_secs(),
            recorded_at: artifact.recorded_at(),
        }
    }
}
