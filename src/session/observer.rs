use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::state::Completion;
use crate::audio::VisualizationFrame;

/// Outbound notifications from a recording session.
///
/// Called from the session's event loop; implementations must not block.
pub trait SessionObserver: Send {
    /// Once per elapsed second while recording
    fn on_tick(&mut self, _elapsed_secs: u32) {}

    /// Once per display refresh while recording. The slice is only valid for this call.
    fn on_frame(&mut self, _magnitudes: &[f32]) {}

    /// Exactly once per session, after the device has been released
    fn on_complete(&mut self, _completion: Completion) {}

    /// After reset; no artifact is held any more
    fn on_cleared(&mut self) {}
}

/// Observer that ignores everything
pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Discrete session notifications, as forwarded by [`ChannelObserver`]
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Tick { elapsed_secs: u32 },
    Completed(Completion),
    Cleared,
}

/// Forwards discrete events over a channel and keeps only the newest frame
pub struct ChannelObserver {
    events: mpsc::UnboundedSender<SessionEvent>,
    frames: watch::Sender<VisualizationFrame>,
}

/// Receiving side of a [`ChannelObserver`]
pub struct ObserverChannels {
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub frames: watch::Receiver<VisualizationFrame>,
}

impl ChannelObserver {
    pub fn new() -> (Self, ObserverChannels) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (frames_tx, frames_rx) = watch::channel(VisualizationFrame::default());

        (
            Self {
                events: events_tx,
                frames: frames_tx,
            },
            ObserverChannels {
                events: events_rx,
                frames: frames_rx,
            },
        )
    }

    fn forward(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("Session event receiver dropped");
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_tick(&mut self, elapsed_secs: u32) {
        self.forward(SessionEvent::Tick { elapsed_secs });
    }

    fn on_frame(&mut self, magnitudes: &[f32]) {
        self.frames.send_modify(|frame| {
            frame.magnitudes.clear();
            frame.magnitudes.extend_from_slice(magnitudes);
        });
    }

    fn on_complete(&mut self, completion: Completion) {
        self.forward(SessionEvent::Completed(completion));
    }

    fn on_cleared(&mut self) {
        self.frames.send_replace(VisualizationFrame::default());
        self.forward(SessionEvent::Cleared);
    }
}
