use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{AudioBackendConfig, AudioSource, VisualizationConfig};
use crate::session::SessionConfig;

/// Default location of the config file (extension resolved by `config`)
pub const DEFAULT_CONFIG_PATH: &str = "config/voice-sampler";

/// Environment overrides, e.g. `VOICE_SAMPLER__AUDIO__SOURCE=microphone`
pub const ENV_PREFIX: &str = "VOICE_SAMPLER";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub visualization: VisualizationSettings,
    pub synthesis: SynthesisSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voice-sampler".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    File,
    Microphone,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub source: SourceKind,
    /// Recording to replay when `source = "file"`
    pub input_path: Option<String>,
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub buffer_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::File,
            input_path: None,
            recordings_path: "recordings".to_string(),
            sample_rate: 16000,
            channels: 1,
            buffer_duration_ms: 100,
        }
    }
}

impl AudioConfig {
    /// Resolve the configured source; `input` overrides `input_path` and
    /// implies the file source
    pub fn source(&self, input: Option<PathBuf>) -> Result<AudioSource> {
        if let Some(path) = input {
            return Ok(AudioSource::File(path));
        }

        match self.source {
            SourceKind::Microphone => Ok(AudioSource::Microphone),
            SourceKind::File => {
                let path = self
                    .input_path
                    .as_ref()
                    .context("audio.input_path is required when audio.source = \"file\"")?;
                Ok(AudioSource::File(PathBuf::from(path)))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualizationSettings {
    pub frame_interval_ms: u64,
    pub fft_size: usize,
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
}

impl Default for VisualizationSettings {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            fft_size: 256,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisSettings {
    pub endpoint: String,
    pub max_text_length: usize,
    pub timeout_secs: u64,
}

impl Default for SynthesisSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5000".to_string(),
            max_text_length: 500,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load from `path` (optional file), then `VOICE_SAMPLER__*` variables
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }

    pub fn backend_config(&self) -> AudioBackendConfig {
        AudioBackendConfig {
            target_sample_rate: self.audio.sample_rate,
            target_channels: self.audio.channels,
            buffer_duration_ms: self.audio.buffer_duration_ms,
            analyser_window: self.visualization.fft_size,
        }
    }

    pub fn visualization_config(&self) -> VisualizationConfig {
        let v = &self.visualization;
        VisualizationConfig {
            frame_interval: Duration::from_millis(v.frame_interval_ms.max(1)),
            fft_size: v.fft_size,
            smoothing: v.smoothing,
            min_db: v.min_db,
            max_db: v.max_db,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            visualization: self.visualization_config(),
            ..SessionConfig::default()
        }
    }
}
