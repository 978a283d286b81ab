use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SessionConfig;
use super::error::SessionError;
use super::observer::SessionObserver;
use super::snapshot::{ArtifactSummary, SessionSnapshot};
use super::state::{Completion, SessionOutcome, SessionState, StopReason};
use super::timer::{Pulse, SessionTimer};
use crate::audio::{
    AudioBackend, AudioStream, EncodedChunk, EncoderSink, RecordingArtifact, StreamEvent,
    VisualizationFeed,
};

/// Caller requests, answered from inside the event loop
enum Command {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop(oneshot::Sender<()>),
    Reset(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
}

/// Everything the event loop reacts to, funnelled through `dispatch`
enum LoopEvent {
    Command(Command),
    Pulse(Pulse),
    Frame,
    Stream(Option<StreamEvent>),
}

/// Owns the input device for one session at a time and drives
/// idle → recording → finalized.
///
/// Stream deliveries, timer pulses and display refreshes are all polled from
/// one task, so a state transition never interleaves with a callback. Every
/// way out of `Recording` goes through `finish`, which releases the device
/// before the new state becomes observable.
pub struct RecordingSessionManager {
    backend: Box<dyn AudioBackend>,
    observer: Box<dyn SessionObserver>,
    state: SessionState,
    session_id: Option<Uuid>,
    started_at: Option<DateTime<Utc>>,
    stream: Option<AudioStream>,
    encoder: Option<EncoderSink>,
    timer: SessionTimer,
    feed: VisualizationFeed,
    artifact: Option<RecordingArtifact>,
    last_stop: Option<StopReason>,
    dropped_buffers: u64,
    command_capacity: usize,
}

impl RecordingSessionManager {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        observer: Box<dyn SessionObserver>,
        config: SessionConfig,
    ) -> Self {
        Self {
            backend,
            observer,
            state: SessionState::Idle,
            session_id: None,
            started_at: None,
            stream: None,
            encoder: None,
            timer: SessionTimer::new(config.ceiling_secs(), config.tick_period),
            feed: VisualizationFeed::new(config.visualization),
            artifact: None,
            last_stop: None,
            dropped_buffers: 0,
            command_capacity: config.command_capacity.max(1),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let elapsed = match self.state {
            SessionState::Idle => 0,
            SessionState::Recording { elapsed_secs } => elapsed_secs,
            SessionState::Finalized => self.timer.elapsed_secs(),
        };

        SessionSnapshot {
            state: self.state,
            session_id: self.session_id,
            started_at: self.started_at,
            remaining_secs: self.timer.ceiling_secs().saturating_sub(elapsed),
            input_active: self.backend.is_capturing(),
            last_stop: self.last_stop.clone(),
            dropped_buffers: self
                .stream
                .as_ref()
                .map_or(self.dropped_buffers, |stream| stream.dropped().count()),
            artifact: self.artifact.as_ref().map(ArtifactSummary::from),
            held_artifact: self.artifact.clone(),
        }
    }

    /// Acquire the device and begin recording
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Idle {
            warn!("Start rejected: session is {}", self.state.as_str());
            return Err(SessionError::SessionAlreadyActive);
        }

        info!("Requesting audio input from {} backend", self.backend.name());

        let stream = match self.backend.start().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Audio input unavailable: {:#}", e);
                return Err(SessionError::DeviceUnavailable(format!("{:#}", e)));
            }
        };

        let session_id = Uuid::new_v4();
        self.encoder = Some(EncoderSink::new(session_id, stream.format()));
        self.feed.arm(stream.tap().clone());
        self.timer.arm();
        self.stream = Some(stream);

        self.session_id = Some(session_id);
        self.started_at = Some(Utc::now());
        self.last_stop = None;
        self.dropped_buffers = 0;
        self.state = SessionState::Recording { elapsed_secs: 0 };

        info!("Recording session started: {}", session_id);
        Ok(())
    }

    /// Stop recording and deliver the result. No-op unless recording.
    pub async fn stop(&mut self) {
        if !self.state.is_recording() {
            debug!("Stop ignored: session is {}", self.state.as_str());
            return;
        }

        self.finish(StopReason::Manual).await;
    }

    /// Discard the finished recording. No-op unless finalized.
    pub fn reset(&mut self) {
        if self.state != SessionState::Finalized {
            debug!("Reset ignored: session is {}", self.state.as_str());
            return;
        }

        if let Some(session_id) = self.session_id.take() {
            info!("Discarding recording session: {}", session_id);
        }

        self.artifact = None;
        self.started_at = None;
        self.last_stop = None;
        self.dropped_buffers = 0;
        self.state = SessionState::Idle;
        self.observer.on_cleared();
    }

    /// Wait for and handle one stream, timer or display event.
    ///
    /// Returns `false` without waiting when nothing is recording. Lets a caller
    /// drive the session without spawning it.
    pub async fn turn(&mut self) -> bool {
        if !self.state.is_recording() {
            return false;
        }

        let event = self.next_source_event().await;
        self.dispatch(event).await;
        true
    }

    /// Run the event loop on its own task
    pub fn spawn(self) -> (RecorderHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(self.command_capacity);
        let task = tokio::spawn(self.run(rx));
        (RecorderHandle { commands: tx }, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        debug!("Session event loop started");

        loop {
            let event = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => LoopEvent::Command(command),
                    None => break,
                },
                event = self.next_source_event() => event,
            };

            self.dispatch(event).await;
        }

        if self.state.is_recording() {
            info!("All recorder handles dropped, stopping session");
            self.finish(StopReason::Shutdown).await;
        }

        debug!("Session event loop stopped");
    }

    /// Sources that only produce while recording; pending otherwise
    async fn next_source_event(&mut self) -> LoopEvent {
        tokio::select! {
            pulse = self.timer.pulse() => LoopEvent::Pulse(pulse),
            _ = self.feed.refresh() => LoopEvent::Frame,
            event = next_stream_event(&mut self.stream) => LoopEvent::Stream(event),
        }
    }

    async fn dispatch(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Command(Command::Start(reply)) => {
                let result = self.start().await;
                let _ = reply.send(result);
            }
            LoopEvent::Command(Command::Stop(reply)) => {
                self.stop().await;
                let _ = reply.send(());
            }
            LoopEvent::Command(Command::Reset(reply)) => {
                self.reset();
                let _ = reply.send(());
            }
            LoopEvent::Command(Command::Snapshot(reply)) => {
                let _ = reply.send(self.snapshot());
            }
            LoopEvent::Pulse(pulse) => self.on_pulse(pulse).await,
            LoopEvent::Frame => self.on_frame(),
            LoopEvent::Stream(Some(StreamEvent::Data(chunk))) => self.on_chunk(chunk),
            LoopEvent::Stream(Some(StreamEvent::Error(message))) => {
                error!("Audio stream failed: {}", message);
                self.finish(StopReason::StreamFailed(message)).await;
            }
            LoopEvent::Stream(None) => {
                error!("Audio stream closed while recording");
                self.finish(StopReason::StreamFailed("audio stream closed".to_string()))
                    .await;
            }
        }
    }

    async fn on_pulse(&mut self, pulse: Pulse) {
        if !self.state.is_recording() {
            return;
        }

        self.state = SessionState::Recording {
            elapsed_secs: pulse.elapsed_secs,
        };
        self.observer.on_tick(pulse.elapsed_secs);

        if pulse.terminal {
            info!("Recording ceiling reached ({}s)", pulse.elapsed_secs);
            self.finish(StopReason::CeilingReached).await;
        }
    }

    fn on_frame(&mut self) {
        if let Some(magnitudes) = self.feed.render() {
            self.observer.on_frame(magnitudes);
        }
    }

    fn on_chunk(&mut self, chunk: EncodedChunk) {
        match (self.state, self.encoder.as_mut()) {
            (SessionState::Recording { .. }, Some(encoder)) => {
                encoder.append(chunk);
            }
            _ => debug!("Dropping chunk delivered outside recording"),
        }
    }

    /// The single exit from `Recording`
    async fn finish(&mut self, reason: StopReason) {
        let session_id = self.session_id.unwrap_or_default();
        info!("Stopping recording session: {} ({:?})", session_id, reason);

        self.timer.disarm();
        self.feed.disarm();

        let mut encoder = self.encoder.take();
        if let Some(mut stream) = self.stream.take() {
            // Deliveries queued before the stop still belong to this session
            while let Some(event) = stream.try_next_event() {
                match (event, encoder.as_mut()) {
                    (StreamEvent::Data(chunk), Some(encoder)) => {
                        encoder.append(chunk);
                    }
                    (StreamEvent::Error(message), _) => {
                        debug!("Ignoring stream error during release: {}", message);
                    }
                    _ => {}
                }
            }

            self.dropped_buffers = stream.dropped().count();
            if self.dropped_buffers > 0 {
                warn!(
                    "Session {} lost {} buffers to a full queue",
                    session_id, self.dropped_buffers
                );
            }
        }

        if let Err(e) = self.backend.stop().await {
            warn!("Failed to release {} backend: {:#}", self.backend.name(), e);
        }

        let artifact = encoder.and_then(EncoderSink::finalize);
        self.artifact = artifact.clone();
        self.last_stop = Some(reason.clone());
        self.state = SessionState::Finalized;

        let outcome = match artifact {
            Some(artifact) => {
                info!(
                    "Recording session complete: {} ({} bytes, {:.1}s)",
                    session_id,
                    artifact.len(),
                    artifact.duration_secs()
                );
                SessionOutcome::Artifact(artifact)
            }
            None => {
                info!("Recording session complete: {} (no data)", session_id);
                SessionOutcome::NoData
            }
        };

        self.observer.on_complete(Completion {
            session_id,
            reason,
            outcome,
            dropped_buffers: self.dropped_buffers,
        });
    }
}

async fn next_stream_event(stream: &mut Option<AudioStream>) -> Option<StreamEvent> {
    match stream {
        Some(stream) => stream.next_event().await,
        None => std::future::pending().await,
    }
}

/// Cloneable front end to a spawned [`RecordingSessionManager`]
#[derive(Clone)]
pub struct RecorderHandle {
    commands: mpsc::Sender<Command>,
}

impl RecorderHandle {
    /// Start a session; waits until the device grants or denies access
    pub async fn start(&self) -> Result<(), SessionError> {
        self.request(Command::Start).await?
    }

    /// Stop the current session; returns once the device is released
    pub async fn stop(&self) -> Result<(), SessionError> {
        self.request(Command::Stop).await
    }

    /// Discard a finished session
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.request(Command::Reset).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.request(Command::Snapshot).await
    }

    pub async fn state(&self) -> Result<SessionState, SessionError> {
        Ok(self.snapshot().await?.state)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| SessionError::ManagerClosed)?;
        rx.await.map_err(|_| SessionError::ManagerClosed)
    }
}
