use crate::audio::VisualizationFrame;
use crate::session::RecorderHandle;
use crate::synthesis::SynthesisClient;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Front end to the single recording session
    pub recorder: RecorderHandle,

    /// Newest visualization frame published by the session
    pub frames: watch::Receiver<VisualizationFrame>,

    /// Voice-cloning service the finished recording is handed to
    pub synthesis: Arc<SynthesisClient>,

    /// Text longer than this is clipped before synthesis
    pub max_text_length: usize,
}

impl AppState {
    pub fn new(
        recorder: RecorderHandle,
        frames: watch::Receiver<VisualizationFrame>,
        synthesis: SynthesisClient,
        max_text_length: usize,
    ) -> Self {
        Self {
            recorder,
            frames,
            synthesis: Arc::new(synthesis),
            max_text_length,
        }
    }
}
