use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

use super::backend::{
    AnalyserTap, AudioBackend, AudioBackendConfig, AudioStream, EncodedChunk, StreamEvent,
    StreamFormat,
};
use super::convert::FormatConverter;

/// Decoded audio file (16-bit PCM, interleaved)
pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    /// Decode any format symphonia understands (WAV, FLAC, MP3, OGG, M4A)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let file = File::open(path)
            .with_context(|| format!("Failed to open audio file: {}", path.display()))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .context("Unsupported audio format")?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .context("No audio track found")?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(0);

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to create decoder")?;

        let mut samples: Vec<i16> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(e) => return Err(e).context("Failed to read audio packet"),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e).context("Failed to decode audio packet"),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channels = spec.channels.count() as u16;

            let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        if sample_rate == 0 || channels == 0 {
            bail!("Audio file has no decodable samples: {}", path.display());
        }

        let duration_seconds = samples.len() as f64 /
            (sample_rate as f64 * channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            sample_rate,
            channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate,
            channels,
            samples,
        })
    }

    /// Convert to the target format, returning the format actually produced
    pub fn conform(&self, target: StreamFormat) -> (StreamFormat, Vec<i16>) {
        let source = StreamFormat {
            sample_rate: self.sample_rate,
            channels: self.channels,
        };
        let mut converter = FormatConverter::new(source, target);
        let samples = converter.process(&self.samples);
        (converter.output_format(), samples)
    }
}

/// Replays an audio file as if it were a live input device.
///
/// Buffers are delivered at real-time pace. Once the file is exhausted the
/// stream stays open and silent until stopped.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<AudioStream> {
        if self.task.is_some() {
            bail!("Already capturing");
        }

        let path = self.path.clone();
        let target = self.config.format();
        let (format, samples) = tokio::task::spawn_blocking(move || {
            AudioFile::open(&path).map(|file| file.conform(target))
        })
        .await
        .context("Audio file decode task failed")??;

        let buffer_len = format.samples_per_buffer(self.config.buffer_duration_ms);
        let period = Duration::from_millis(self.config.buffer_duration_ms.max(1));

        let (tx, rx) = mpsc::channel(64);
        let tap = AnalyserTap::new(self.config.analyser_window);
        let task_tap = tap.clone();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);

            for block in samples.chunks(buffer_len) {
                ticker.tick().await;
                task_tap.push_samples(block, format.channels);
                debug!("Replaying buffer: {} samples", block.len());
                if tx.send(StreamEvent::Data(EncodedChunk::from_samples(block))).await.is_err() {
                    return;
                }
            }

            debug!("File exhausted, holding stream open");
            tx.closed().await;
        });

        self.task = Some(task);

        info!(
            "File capture started: {} ({}Hz, {} channels)",
            self.path.display(),
            format.sample_rate,
            format.channels
        );

        Ok(AudioStream::new(format, rx, tap))
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped: {}", self.path.display());
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.is_some()
    }

    fn name(&self) -> &str {
        "file"
    }
}
