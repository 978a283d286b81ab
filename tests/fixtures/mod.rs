// Shared test doubles for session-level tests
//
// MockBackend stands in for the input device; its MockControl lets a test
// grant or deny access, push audio into the open stream, and inject failures.
// RecordingObserver keeps every notification for later assertions.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use voice_sampler::audio::{
    AnalyserTap, AudioBackend, AudioStream, DroppedBuffers, EncodedChunk, StreamEvent,
    StreamFormat,
};
use voice_sampler::session::{Completion, SessionObserver};

pub const MOCK_FORMAT: StreamFormat = StreamFormat {
    sample_rate: 16000,
    channels: 1,
};

#[derive(Default)]
struct MockState {
    deny: Option<String>,
    open: bool,
    starts: usize,
    stops: usize,
    sender: Option<mpsc::Sender<StreamEvent>>,
    tap: Option<AnalyserTap>,
    dropped: Option<DroppedBuffers>,
}

/// Test-side handle to a [`MockBackend`]
#[derive(Clone, Default)]
pub struct MockControl {
    state: Arc<Mutex<MockState>>,
}

impl MockControl {
    /// Make the next `start` fail, like a denied permission prompt
    pub fn deny(&self, reason: &str) {
        self.state.lock().unwrap().deny = Some(reason.to_string());
    }

    pub fn allow(&self) {
        self.state.lock().unwrap().deny = None;
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    pub fn starts(&self) -> usize {
        self.state.lock().unwrap().starts
    }

    pub fn stops(&self) -> usize {
        self.state.lock().unwrap().stops
    }

    /// Deliver one buffer; false if no stream is open
    pub fn push_samples(&self, samples: &[i16]) -> bool {
        let state = self.state.lock().unwrap();
        if let Some(tap) = &state.tap {
            tap.push_samples(samples, MOCK_FORMAT.channels);
        }
        Self::send(&state, StreamEvent::Data(EncodedChunk::from_samples(samples)))
    }

    pub fn push_chunk(&self, chunk: EncodedChunk) -> bool {
        let state = self.state.lock().unwrap();
        Self::send(&state, StreamEvent::Data(chunk))
    }

    /// Report a device failure on the open stream
    pub fn fail(&self, message: &str) -> bool {
        let state = self.state.lock().unwrap();
        Self::send(&state, StreamEvent::Error(message.to_string()))
    }

    /// Count buffers as lost, like a capture callback facing a full queue
    pub fn drop_buffers(&self, count: u64) {
        let state = self.state.lock().unwrap();
        if let Some(dropped) = &state.dropped {
            for _ in 0..count {
                dropped.record();
            }
        }
    }

    /// Hang up the stream without an error
    pub fn hang_up(&self) {
        self.state.lock().unwrap().sender = None;
    }

    fn send(state: &MockState, event: StreamEvent) -> bool {
        match &state.sender {
            Some(sender) => sender.try_send(event).is_ok(),
            None => false,
        }
    }
}

pub struct MockBackend {
    control: MockControl,
}

impl MockBackend {
    pub fn new() -> (Self, MockControl) {
        let control = MockControl::default();
        (
            Self {
                control: control.clone(),
            },
            control,
        )
    }
}

#[async_trait]
impl AudioBackend for MockBackend {
    async fn start(&mut self) -> Result<AudioStream> {
        let mut state = self.control.state.lock().unwrap();
        if let Some(reason) = &state.deny {
            bail!("{}", reason);
        }
        if state.open {
            bail!("Already capturing");
        }

        let (tx, rx) = mpsc::channel(1024);
        let tap = AnalyserTap::new(256);

        state.open = true;
        state.starts += 1;
        state.sender = Some(tx);
        state.tap = Some(tap.clone());
        let dropped = DroppedBuffers::default();
        state.dropped = Some(dropped.clone());

        Ok(AudioStream::new(MOCK_FORMAT, rx, tap).with_dropped(dropped))
    }

    async fn stop(&mut self) -> Result<()> {
        let mut state = self.control.state.lock().unwrap();
        state.open = false;
        state.stops += 1;
        state.sender = None;
        state.tap = None;
        state.dropped = None;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.control.is_open()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Default)]
pub struct ObserverLog {
    pub ticks: Vec<u32>,
    pub frames: usize,
    pub completions: Vec<Completion>,
    /// Frame count at the moment of each completion
    pub frames_at_completion: Vec<usize>,
    pub cleared: usize,
    pub last_frame: Vec<f32>,
}

/// Observer that records every notification
pub struct RecordingObserver {
    log: Arc<Mutex<ObserverLog>>,
}

impl RecordingObserver {
    pub fn new() -> (Self, Arc<Mutex<ObserverLog>>) {
        let log = Arc::new(Mutex::new(ObserverLog::default()));
        (Self { log: log.clone() }, log)
    }
}

impl SessionObserver for RecordingObserver {
    fn on_tick(&mut self, elapsed_secs: u32) {
        self.log.lock().unwrap().ticks.push(elapsed_secs);
    }

    fn on_frame(&mut self, magnitudes: &[f32]) {
        let mut log = self.log.lock().unwrap();
        log.frames += 1;
        log.last_frame.clear();
        log.last_frame.extend_from_slice(magnitudes);
    }

    fn on_complete(&mut self, completion: Completion) {
        let mut log = self.log.lock().unwrap();
        let frames = log.frames;
        log.frames_at_completion.push(frames);
        log.completions.push(completion);
    }

    fn on_cleared(&mut self) {
        self.log.lock().unwrap().cleared += 1;
    }
}

/// 100ms of a sine tone at 16kHz
pub fn tone_buffer(frequency: f32, amplitude: i16) -> Vec<i16> {
    (0..1600)
        .map(|i| {
            let t = i as f32 / MOCK_FORMAT.sample_rate as f32;
            ((2.0 * std::f32::consts::PI * frequency * t).sin() * amplitude as f32) as i16
        })
        .collect()
}

/// Write a 16-bit WAV file with hound
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) -> Result<()> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
