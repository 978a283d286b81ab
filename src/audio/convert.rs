use tracing::warn;

use super::backend::StreamFormat;

/// Streaming sample-format conversion toward a target format.
///
/// Downsampling is by integer decimation; upsampling is not supported and
/// keeps the source rate. Decimation phase carries across calls, so a live
/// stream converted buffer by buffer matches converting it in one piece.
#[derive(Debug, Clone)]
pub struct FormatConverter {
    source: StreamFormat,
    output: StreamFormat,
    ratio: usize,
    phase: usize,
}

impl FormatConverter {
    pub fn new(source: StreamFormat, target: StreamFormat) -> Self {
        let mut output = source;
        let mut ratio = 1;

        if source.sample_rate != target.sample_rate {
            let r = source.sample_rate / target.sample_rate.max(1);
            if r > 1 {
                ratio = r as usize;
                output.sample_rate = source.sample_rate / r;
            } else {
                warn!(
                    "Cannot upsample {}Hz to {}Hz, keeping source rate",
                    source.sample_rate, target.sample_rate
                );
            }
        }

        match (source.channels, target.channels) {
            (from, to) if from == to => {}
            (2, 1) => output.channels = 1,
            (1, 2) => output.channels = 2,
            (from, to) => warn!("Cannot convert {} channels to {}", from, to),
        }

        Self {
            source,
            output,
            ratio,
            phase: 0,
        }
    }

    /// Format of the samples `process` produces
    pub fn output_format(&self) -> StreamFormat {
        self.output
    }

    /// Convert one buffer of interleaved source samples
    pub fn process(&mut self, samples: &[i16]) -> Vec<i16> {
        let channels = self.source.channels.max(1) as usize;
        let mut out = Vec::with_capacity(samples.len() / self.ratio + channels);

        for frame in samples.chunks_exact(channels) {
            let keep = self.phase == 0;
            self.phase = (self.phase + 1) % self.ratio;
            if !keep {
                continue;
            }

            match (self.source.channels, self.output.channels) {
                (2, 1) => out.push(downmix(frame[0], frame[1])),
                (1, 2) => out.extend_from_slice(&[frame[0], frame[0]]),
                _ => out.extend_from_slice(frame),
            }
        }

        out
    }
}

/// Average a stereo pair into one mono sample
fn downmix(left: i16, right: i16) -> i16 {
    ((left as i32 + right as i32) / 2) as i16
}
