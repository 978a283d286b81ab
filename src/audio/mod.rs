pub mod backend;
pub mod convert;
pub mod encoder;
pub mod file;
pub mod visualization;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{
    AnalyserTap, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioSource, AudioStream,
    DroppedBuffers, EncodedChunk, StreamEvent, StreamFormat,
};
pub use convert::FormatConverter;
pub use encoder::{EncoderSink, RecordingArtifact, ARTIFACT_MEDIA_TYPE};
pub use file::{AudioFile, FileBackend};
pub use visualization::{SpectrumAnalyser, VisualizationConfig, VisualizationFeed, VisualizationFrame};
