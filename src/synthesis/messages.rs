use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::audio::RecordingArtifact;

/// Errors from building or sending a synthesis request
#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("Please enter text to convert")]
    EmptyText,

    #[error("Please record a voice sample first")]
    MissingRecording,

    #[error("Failed to encode voice sample: {0}")]
    Encoding(String),

    #[error("Synthesis service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Synthesis service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// `GET /health` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub device: String,
}

/// `GET /config` response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub device: String,
    pub model: String,
    pub max_text_length: usize,
}

/// Error body returned by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub error: String,
}

/// Voice sample plus the text to speak in that voice
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    artifact: RecordingArtifact,
    text: String,
}

impl SynthesisRequest {
    /// Validate text: text over `max_text_length` characters is clipped to the
    /// limit, and text that is blank before or after clipping is rejected.
    pub fn new(
        artifact: RecordingArtifact,
        text: &str,
        max_text_length: usize,
    ) -> Result<Self, SynthesisError> {
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        let char_count = text.chars().count();
        let text = if char_count > max_text_length {
            warn!(
                "Text is {} characters, clipping to {}",
                char_count, max_text_length
            );
            text.chars().take(max_text_length).collect()
        } else {
            text.to_string()
        };

        // Clipping can leave nothing but the leading whitespace
        if text.trim().is_empty() {
            return Err(SynthesisError::EmptyText);
        }

        Ok(Self { artifact, text })
    }

    /// Like `new`, for callers that may not hold a recording yet
    pub fn from_optional(
        artifact: Option<RecordingArtifact>,
        text: &str,
        max_text_length: usize,
    ) -> Result<Self, SynthesisError> {
        let artifact = artifact.ok_or(SynthesisError::MissingRecording)?;
        Self::new(artifact, text, max_text_length)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn artifact(&self) -> &RecordingArtifact {
        &self.artifact
    }
}

/// Generated speech returned by the service
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Bytes,
    pub content_type: String,
}

impl SynthesizedAudio {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create output directory")?;
        }
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("Failed to write generated audio: {:?}", path))?;
        info!("Saved generated voice ({} bytes) to {:?}", self.bytes.len(), path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{EncodedChunk, EncoderSink, StreamFormat};
    use uuid::Uuid;

    fn artifact() -> RecordingArtifact {
        let mut sink = EncoderSink::new(
            Uuid::new_v4(),
            StreamFormat {
                sample_rate: 16000,
                channels: 1,
            },
        );
        sink.append(EncodedChunk::from_samples(&[1, 2, 3]));
        sink.finalize().unwrap()
    }

    #[test]
    fn test_blank_text_rejected() {
        assert!(matches!(
            SynthesisRequest::new(artifact(), "   \n", 500),
            Err(SynthesisError::EmptyText)
        ));
    }

    #[test]
    fn test_text_blank_after_clipping_rejected() {
        assert!(matches!(
            SynthesisRequest::new(artifact(), "hello", 0),
            Err(SynthesisError::EmptyText)
        ));
        assert!(matches!(
            SynthesisRequest::new(artifact(), "   hello", 3),
            Err(SynthesisError::EmptyText)
        ));
    }

    #[test]
    fn test_long_text_clipped_on_char_boundary() {
        let text = "héllo wörld";
        let request = SynthesisRequest::new(artifact(), text, 7).unwrap();
        assert_eq!(request.text(), "héllo w");
    }

    #[test]
    fn test_text_within_limit_untouched() {
        let request = SynthesisRequest::new(artifact(), " Hello there ", 500).unwrap();
        assert_eq!(request.text(), " Hello there ");
    }

    #[test]
    fn test_missing_recording() {
        let err = SynthesisRequest::from_optional(None, "hi", 500).unwrap_err();
        assert!(matches!(err, SynthesisError::MissingRecording));
        assert_eq!(err.to_string(), "Please record a voice sample first");
    }

    #[test]
    fn test_server_config_deserialization() {
        let json = r#"{"device":"cuda","model":"ChatterboxTurboTTS","max_text_length":500}"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_text_length, 500);
        assert_eq!(config.device, "cuda");
    }
}
