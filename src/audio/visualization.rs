//! Live spectrum feed for the recording HUD
//!
//! On every display refresh the feed reads the newest time-domain window
//! from the stream's analyser tap, runs a windowed real FFT, smooths the
//! magnitudes over time and maps them onto 0.0-1.0 bars.

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use super::backend::AnalyserTap;

/// Feed and analyser settings
#[derive(Debug, Clone)]
pub struct VisualizationConfig {
    /// Display refresh cadence (~60fps by default)
    pub frame_interval: Duration,
    /// Samples per transform; frames have `fft_size / 2` bins
    pub fft_size: usize,
    /// Time smoothing, 0.0 (none) to just below 1.0
    pub smoothing: f32,
    /// Level mapped to 0.0
    pub min_db: f32,
    /// Level mapped to 1.0
    pub max_db: f32,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_millis(16),
            fft_size: 256,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Owned copy of one frame, for consumers that need to keep it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizationFrame {
    pub magnitudes: Vec<f32>,
}

impl VisualizationFrame {
    pub fn copy_from(magnitudes: &[f32]) -> Self {
        Self {
            magnitudes: magnitudes.to_vec(),
        }
    }

    /// Mean bar height, handy for a one-line level meter
    pub fn level(&self) -> f32 {
        if self.magnitudes.is_empty() {
            return 0.0;
        }
        self.magnitudes.iter().sum::<f32>() / self.magnitudes.len() as f32
    }
}

/// Windowed real FFT with exponential time smoothing
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    windowed: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    frame: Vec<f32>,
}

impl SpectrumAnalyser {
    pub fn new(config: &VisualizationConfig) -> Self {
        let n = config.fft_size.max(2);
        let bins = n / 2;

        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(n);

        // Blackman window
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();

        Self {
            fft_size: n,
            smoothing: config.smoothing.clamp(0.0, 0.99),
            min_db: config.min_db,
            max_db: config.max_db,
            window,
            input: vec![0.0; n],
            windowed: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
            smoothed: vec![0.0; bins],
            frame: vec![0.0; bins],
        }
    }

    pub fn bins(&self) -> usize {
        self.frame.len()
    }

    /// Analyse the tap's current window
    pub fn analyse(&mut self, tap: &AnalyserTap) -> &[f32] {
        tap.snapshot(&mut self.input);
        self.transform()
    }

    /// Analyse the newest `fft_size` samples of `samples`
    pub fn analyse_samples(&mut self, samples: &[f32]) -> &[f32] {
        let take = samples.len().min(self.fft_size);
        let pad = self.fft_size - take;
        self.input[..pad].fill(0.0);
        self.input[pad..].copy_from_slice(&samples[samples.len() - take..]);
        self.transform()
    }

    /// Forget smoothing history
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
        self.frame.fill(0.0);
    }

    fn transform(&mut self) -> &[f32] {
        for ((dst, &x), &w) in self.windowed.iter_mut().zip(&self.input).zip(&self.window) {
            *dst = x * w;
        }

        // The forward transform overwrites its input, hence the separate buffer
        if let Err(e) =
            self.fft
                .process_with_scratch(&mut self.windowed, &mut self.spectrum, &mut self.scratch)
        {
            warn!("Spectrum transform failed: {}", e);
            self.frame.fill(0.0);
            return &self.frame;
        }

        let n = self.fft_size as f32;
        let range = (self.max_db - self.min_db).max(f32::EPSILON);

        for (k, bin) in self.spectrum.iter().take(self.frame.len()).enumerate() {
            let magnitude = bin.norm() / n;
            let smoothed = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = smoothed;

            let db = if smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            self.frame[k] = ((db - self.min_db) / range).clamp(0.0, 1.0);
        }

        &self.frame
    }
}

struct ActiveFeed {
    tap: AnalyserTap,
    ticker: Interval,
}

/// Per-display-frame spectrum source, armed only while recording
pub struct VisualizationFeed {
    config: VisualizationConfig,
    analyser: SpectrumAnalyser,
    active: Option<ActiveFeed>,
    frames: u64,
}

impl VisualizationFeed {
    pub fn new(config: VisualizationConfig) -> Self {
        let analyser = SpectrumAnalyser::new(&config);
        Self {
            config,
            analyser,
            active: None,
            frames: 0,
        }
    }

    /// Start reading from a stream's tap
    pub fn arm(&mut self, tap: AnalyserTap) {
        let period = self.config.frame_interval.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.analyser.reset();
        self.frames = 0;
        self.active = Some(ActiveFeed { tap, ticker });
        debug!("Visualization feed armed ({:?} cadence)", period);
    }

    /// Stop producing frames. Idempotent.
    pub fn disarm(&mut self) {
        if self.active.take().is_some() {
            self.analyser.reset();
            debug!("Visualization feed disarmed after {} frames", self.frames);
        }
    }

    pub fn is_armed(&self) -> bool {
        self.active.is_some()
    }

    /// Wait for the next display refresh. Never resolves while disarmed.
    pub async fn refresh(&mut self) {
        match self.active.as_mut() {
            Some(active) => {
                active.ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Produce the current frame. Valid until the next call.
    pub fn render(&mut self) -> Option<&[f32]> {
        let active = self.active.as_ref()?;
        self.frames += 1;
        Some(self.analyser.analyse(&active.tap))
    }
}
