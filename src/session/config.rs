use std::time::Duration;

use super::timer::RECORDING_CEILING_SECS;
use crate::audio::VisualizationConfig;

/// Configuration for the recording session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Spectrum feed settings
    pub visualization: VisualizationConfig,

    /// Timer resolution; one pulse per period
    /// Default: 1 second
    pub tick_period: Duration,

    /// Pending caller commands before `RecorderHandle` calls wait
    pub command_capacity: usize,
}

impl SessionConfig {
    /// Ceiling is fixed, not configurable
    pub fn ceiling_secs(&self) -> u32 {
        RECORDING_CEILING_SECS
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            visualization: VisualizationConfig::default(),
            tick_period: Duration::from_secs(1),
            command_capacity: 32,
        }
    }
}
