//! Default input device capture via cpal
//!
//! cpal streams are not `Send` on every platform, so the stream lives on a
//! dedicated thread that owns it until the backend is stopped.

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{
    AnalyserTap, AudioBackend, AudioBackendConfig, AudioStream, DroppedBuffers, EncodedChunk,
    StreamEvent, StreamFormat,
};
use super::convert::FormatConverter;

struct CaptureThread {
    shutdown: std_mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Microphone backend using the host's default input device
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    capture: Option<CaptureThread>,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            capture: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<AudioStream> {
        if self.capture.is_some() {
            bail!("Already capturing");
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel();
        let config = self.config.clone();

        let handle = std::thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || run_capture(config, ready_tx, shutdown_rx))
            .context("Failed to spawn capture thread")?;

        let stream = ready_rx
            .await
            .map_err(|_| anyhow!("Capture thread exited before the device answered"))?;

        match stream {
            Ok(stream) => {
                self.capture = Some(CaptureThread {
                    shutdown: shutdown_tx,
                    handle,
                });
                Ok(stream)
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(capture) = self.capture.take() else {
            return Ok(());
        };

        info!("Stopping microphone capture");
        let _ = capture.shutdown.send(());
        tokio::task::spawn_blocking(move || capture.handle.join())
            .await
            .context("Failed to join capture thread")?
            .map_err(|_| anyhow!("Capture thread panicked"))?;

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

/// Owns the cpal stream for its whole life
fn run_capture(
    config: AudioBackendConfig,
    ready: oneshot::Sender<Result<AudioStream>>,
    shutdown: std_mpsc::Receiver<()>,
) {
    let (tx, rx) = mpsc::channel(256);
    let tap = AnalyserTap::new(config.analyser_window);
    let dropped = DroppedBuffers::default();

    let stream = match open_default_input(&config, tx, tap.clone(), dropped.clone()) {
        Ok((stream, format)) => {
            let audio = AudioStream::new(format, rx, tap).with_dropped(dropped);
            let _ = ready.send(Ok(audio));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Blocks until stop() or the backend is dropped
    let _ = shutdown.recv();
    drop(stream);
    info!("Microphone released");
}

fn open_default_input(
    config: &AudioBackendConfig,
    tx: mpsc::Sender<StreamEvent>,
    tap: AnalyserTap,
    dropped: DroppedBuffers,
) -> Result<(cpal::Stream, StreamFormat)> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .context("No audio input device found")?;

    info!("Using audio input device: {:?}", device.name());

    let supported = device
        .default_input_config()
        .context("No supported audio configuration")?;
    let sample_format = supported.sample_format();
    let mut stream_config: cpal::StreamConfig = supported.into();
    let native = StreamFormat {
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
    };

    // Ask for callbacks of about one buffer; hosts may ignore the hint
    let frames = native.samples_per_buffer(config.buffer_duration_ms) / native.channels.max(1) as usize;
    stream_config.buffer_size = match u32::try_from(frames) {
        Ok(frames) => cpal::BufferSize::Fixed(frames),
        Err(_) => cpal::BufferSize::Default,
    };

    let delivery = Delivery::new(native, config.format(), tx, tap, dropped);
    let format = delivery.format();

    info!(
        "Audio config: {} Hz, {} channels, {:?}, delivering {} Hz, {} channels",
        native.sample_rate, native.channels, sample_format, format.sample_rate, format.channels
    );

    let stream = match build_stream(&device, &stream_config, sample_format, delivery.clone()) {
        Ok(stream) => stream,
        Err(e) => {
            // Some hosts refuse a fixed buffer size
            warn!("Retrying with the default buffer size: {:#}", e);
            stream_config.buffer_size = cpal::BufferSize::Default;
            build_stream(&device, &stream_config, sample_format, delivery)?
        }
    };

    stream.play().context("Failed to start input stream")?;
    Ok((stream, format))
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    delivery: Delivery,
) -> Result<cpal::Stream> {
    match sample_format {
        SampleFormat::I16 => build_typed_stream::<i16>(device, config, delivery),
        SampleFormat::U16 => build_typed_stream::<u16>(device, config, delivery),
        SampleFormat::F32 => build_typed_stream::<f32>(device, config, delivery),
        other => bail!("Unsupported sample format: {:?}", other),
    }
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut delivery: Delivery,
) -> Result<cpal::Stream>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    let error_tx = delivery.tx.clone();

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| delivery.deliver(data),
            move |err| {
                error!("Audio stream error: {}", err);
                let _ = error_tx.try_send(StreamEvent::Error(err.to_string()));
            },
            None,
        )
        .context("Failed to create audio stream")?;

    Ok(stream)
}

/// Callback-side state: converts device buffers and hands them to the session
#[derive(Clone)]
struct Delivery {
    converter: FormatConverter,
    tx: mpsc::Sender<StreamEvent>,
    tap: AnalyserTap,
    dropped: DroppedBuffers,
}

impl Delivery {
    fn new(
        native: StreamFormat,
        target: StreamFormat,
        tx: mpsc::Sender<StreamEvent>,
        tap: AnalyserTap,
        dropped: DroppedBuffers,
    ) -> Self {
        Self {
            converter: FormatConverter::new(native, target),
            tx,
            tap,
            dropped,
        }
    }

    fn format(&self) -> StreamFormat {
        self.converter.output_format()
    }

    fn deliver<T>(&mut self, data: &[T])
    where
        T: SizedSample,
        i16: FromSample<T>,
    {
        let native: Vec<i16> = data.iter().map(|&s| i16::from_sample(s)).collect();
        let samples = self.converter.process(&native);
        if samples.is_empty() {
            return;
        }

        self.tap.push_samples(&samples, self.format().channels);
        if self.tx.try_send(StreamEvent::Data(EncodedChunk::from_samples(&samples))).is_err() {
            let total = self.dropped.record();
            warn!("Session loop is behind, dropped buffer ({} so far)", total);
        }
    }
}
