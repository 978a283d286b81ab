//! Recording session management
//!
//! This module provides the `RecordingSessionManager` that owns:
//! - The input device for the length of one session
//! - The session timer and its fixed 10 second ceiling
//! - The live spectrum feed
//! - The encoder sink that becomes the finished artifact

mod config;
mod error;
mod manager;
mod observer;
mod snapshot;
mod state;
mod timer;

pub use config::SessionConfig;
pub use error::SessionError;
pub use manager::{RecorderHandle, RecordingSessionManager};
pub use observer::{ChannelObserver, NullObserver, ObserverChannels, SessionEvent, SessionObserver};
pub use snapshot::{ArtifactSummary, SessionSnapshot};
pub use state::{Completion, SessionOutcome, SessionState, StopReason};
pub use timer::{Pulse, SessionTimer, RECORDING_CEILING_SECS};
