use anyhow::{Context, Result};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::backend::{EncodedChunk, StreamFormat};

/// Media type of every artifact: RFC 2586 linear PCM, 16-bit big-endian
pub const ARTIFACT_MEDIA_TYPE: &str = "audio/L16";

/// Finished recording handed to the caller once per session
#[derive(Debug, Clone)]
pub struct RecordingArtifact {
    session_id: Uuid,
    data: Bytes,
    format: StreamFormat,
    chunk_count: usize,
    recorded_at: DateTime<Utc>,
}

impl RecordingArtifact {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Concatenated chunk payload, in delivery order
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// Full media type including rate and channel parameters
    pub fn media_type(&self) -> String {
        format!(
            "{};rate={};channels={}",
            ARTIFACT_MEDIA_TYPE, self.format.sample_rate, self.format.channels
        )
    }

    pub fn duration_secs(&self) -> f64 {
        self.data.len() as f64 / self.format.byte_rate().max(1) as f64
    }

    /// Decode the payload back into interleaved samples. A trailing odd byte is dropped.
    pub fn samples(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Wrap the payload in a RIFF/WAV container
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::with_capacity(self.data.len() + 44));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.wav_spec())
                .context("Failed to create WAV encoder")?;
            for sample in self.samples() {
                writer.write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize()
                .context("Failed to finalize WAV data")?;
        }
        Ok(cursor.into_inner())
    }

    /// File name used when the artifact is saved or uploaded
    pub fn file_name(&self) -> String {
        format!("voice_sample-{}.wav", self.session_id)
    }

    /// Save as a WAV file inside `output_dir`, returning its path
    pub fn save_wav(&self, output_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let output_dir = output_dir.as_ref();
        fs::create_dir_all(output_dir)
            .context("Failed to create output directory")?;

        let path = output_dir.join(self.file_name());
        let mut writer = hound::WavWriter::create(&path, self.wav_spec())
            .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
        for sample in self.samples() {
            writer.write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize()
            .context("Failed to finalize WAV file")?;

        info!("Saved recording {} ({:.1}s) to {:?}", self.session_id, self.duration_secs(), path);
        Ok(path)
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }
}

/// Accumulates encoded chunks for one session.
///
/// Append-only; `finalize` consumes the sink.
pub struct EncoderSink {
    session_id: Uuid,
    format: StreamFormat,
    chunks: Vec<EncodedChunk>,
    byte_len: usize,
}

impl EncoderSink {
    pub fn new(session_id: Uuid, format: StreamFormat) -> Self {
        Self {
            session_id,
            format,
            chunks: Vec::new(),
            byte_len: 0,
        }
    }

    /// Append a chunk. Zero-length chunks are ignored and `false` is returned.
    pub fn append(&mut self, chunk: EncodedChunk) -> bool {
        if chunk.is_empty() {
            debug!("Ignoring empty chunk");
            return false;
        }

        self.byte_len += chunk.len();
        self.chunks.push(chunk);
        true
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate everything received into an artifact, or `None` if nothing arrived
    pub fn finalize(self) -> Option<RecordingArtifact> {
        if self.chunks.is_empty() {
            info!("Encoder finalized with no data");
            return None;
        }

        let mut data = BytesMut::with_capacity(self.byte_len);
        for chunk in &self.chunks {
            data.extend_from_slice(chunk.as_bytes());
        }

        info!(
            "Encoder finalized: {} chunks, {} bytes",
            self.chunks.len(),
            self.byte_len
        );

        Some(RecordingArtifact {
            session_id: self.session_id,
            data: data.freeze(),
            format: self.format,
            chunk_count: self.chunks.len(),
            recorded_at: Utc::now(),
        })
    }
}
