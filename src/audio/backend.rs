use anyhow::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Sample layout of a live stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl StreamFormat {
    /// Bytes per second of 16-bit PCM in this format
    pub fn byte_rate(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * 2
    }

    /// Interleaved samples in one buffer of the given duration
    pub fn samples_per_buffer(&self, buffer_duration_ms: u64) -> usize {
        let frames = self.sample_rate as u64 * buffer_duration_ms / 1000;
        (frames as usize).max(1) * self.channels.max(1) as usize
    }
}

/// One unit of encoded audio delivered by the capture callback.
///
/// Payload is 16-bit signed big-endian PCM (`audio/L16`), interleaved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedChunk(Bytes);

impl EncodedChunk {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Encode interleaved samples
    pub fn from_samples(samples: &[i16]) -> Self {
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_be_bytes()).collect();
        Self(Bytes::from(bytes))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }
}

/// Delivery from a live stream into the session's event loop
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// Data became available
    Data(EncodedChunk),
    /// Device failed mid-capture (disconnected, revoked, ...)
    Error(String),
}

/// Most recent time-domain window of a live stream.
///
/// Written by the capture callback, read by the visualization feed.
/// Holds mono samples normalized to -1.0..=1.0.
#[derive(Debug, Clone)]
pub struct AnalyserTap {
    window: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl AnalyserTap {
    pub fn new(capacity: usize) -> Self {
        Self {
            window: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Push interleaved samples, downmixing to mono and keeping only the newest `capacity`
    pub fn push_samples(&self, samples: &[i16], channels: u16) {
        let channels = channels.max(1) as usize;
        let mono = samples.chunks(channels).map(|frame| {
            let sum: f32 = frame.iter().map(|&s| s as f32 / i16::MAX as f32).sum();
            sum / frame.len() as f32
        });

        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        window.extend(mono);

        let excess = window.len().saturating_sub(self.capacity);
        if excess > 0 {
            window.drain(0..excess);
        }
    }

    /// Copy the current window into `out`, right-aligned and zero-padded at the front
    pub fn snapshot(&self, out: &mut [f32]) {
        let window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        let take = window.len().min(out.len());
        let pad = out.len() - take;

        out[..pad].fill(0.0);
        for (dst, src) in out[pad..].iter_mut().zip(window.iter().skip(window.len() - take)) {
            *dst = *src;
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.window.lock().unwrap().len()
    }
}

/// Count of buffers a capture callback discarded because the session queue was full
#[derive(Debug, Clone, Default)]
pub struct DroppedBuffers(Arc<AtomicU64>);

impl DroppedBuffers {
    pub fn record(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn count(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Live handle to an opened input device.
///
/// Owned by exactly one recording session; dropped on release.
#[derive(Debug)]
pub struct AudioStream {
    format: StreamFormat,
    events: mpsc::Receiver<StreamEvent>,
    tap: AnalyserTap,
    dropped: DroppedBuffers,
}

impl AudioStream {
    pub fn new(format: StreamFormat, events: mpsc::Receiver<StreamEvent>, tap: AnalyserTap) -> Self {
        Self {
            format,
            events,
            tap,
            dropped: DroppedBuffers::default(),
        }
    }

    /// Share a drop counter the capture side already holds
    pub fn with_dropped(mut self, dropped: DroppedBuffers) -> Self {
        self.dropped = dropped;
        self
    }

    /// Buffers the capture side discarded for this stream
    pub fn dropped(&self) -> &DroppedBuffers {
        &self.dropped
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn tap(&self) -> &AnalyserTap {
        &self.tap
    }

    /// Wait for the next delivery. `None` means the device side hung up.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.events.recv().await
    }

    /// Take a delivery that is already queued, without waiting
    pub fn try_next_event(&mut self) -> Option<StreamEvent> {
        self.events.try_recv().ok()
    }
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate (will resample if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
    /// Samples kept in the analyser tap (visualization FFT size)
    pub analyser_window: usize,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz speech
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
            analyser_window: 256,
        }
    }
}

impl AudioBackendConfig {
    pub fn format(&self) -> StreamFormat {
        StreamFormat {
            sample_rate: self.target_sample_rate,
            channels: self.target_channels,
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - File: replay an audio file at real-time pace (testing, batch use)
/// - Microphone: cpal default input device (`microphone` feature)
///
/// `start` must either return a live stream or fail without holding the device.
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Suspends until the device grants or denies access.
    async fn start(&mut self) -> Result<AudioStream>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend based on source and configuration
    pub fn create(
        source: AudioSource,
        config: AudioBackendConfig,
    ) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    use super::microphone::MicrophoneBackend;
                    Ok(Box::new(MicrophoneBackend::new(config)))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    let _ = config;
                    anyhow::bail!("Microphone capture requires the `microphone` feature")
                }
            }

            AudioSource::File(path) => {
                use super::file::FileBackend;
                Ok(Box::new(FileBackend::new(path, config)))
            }
        }
    }
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Default input device
    Microphone,
    /// File input (for testing/batch processing)
    File(PathBuf),
}
