//! Client for the voice-cloning service
//!
//! Hands a finished recording to the service together with the text to speak:
//! - GET /health - Service status and compute device
//! - GET /config - Model name and text length limit
//! - POST /generate - Multipart voice sample + text, returns WAV

mod client;
mod messages;

pub use client::{SynthesisClient, VOICE_SAMPLE_FILE_NAME};
pub use messages::{
    ErrorMessage, HealthResponse, ServerConfig, SynthesisError, SynthesisRequest, SynthesizedAudio,
};
