//! HTTP API server for driving the recorder from a UI
//!
//! This module provides a REST API over the single recording session:
//! - POST /recorder/start - Acquire the input and start recording
//! - POST /recorder/stop - Stop early and keep the recording
//! - POST /recorder/reset - Discard the recording
//! - GET /recorder/status - Query session state and countdown
//! - GET /recorder/frame - Newest spectrum frame
//! - GET /recorder/artifact - Download the recording as WAV
//! - POST /synthesize - Send the recording and text to the voice service
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use handlers::{ErrorResponse, SynthesizeRequest};
pub use routes::create_router;
pub use state::AppState;
