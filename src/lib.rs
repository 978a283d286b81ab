pub mod audio;
pub mod config;
pub mod http;
pub mod session;
pub mod synthesis;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioSource, AudioStream,
    EncodedChunk, EncoderSink, RecordingArtifact, StreamEvent, StreamFormat, VisualizationFrame,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use session::{
    ChannelObserver, Completion, RecorderHandle, RecordingSessionManager, SessionConfig,
    SessionError, SessionObserver, SessionOutcome, SessionSnapshot, SessionState, StopReason,
};
pub use synthesis::{SynthesisClient, SynthesisError, SynthesisRequest, SynthesizedAudio};
