//! Real-time spectral cross-synthesis engine.
//!
//! Pipeline per channel: [`accumulator`] → [`analyzer`] (main and sidechain) →
//! [`exchange`] → [`synthesis`] → overlap-add output, orchestrated by
//! [`driver::StreamDriver`] once per audio callback.

pub mod accumulator;
pub mod analyzer;
pub mod driver;
pub mod error;
pub mod exchange;
pub mod params;
pub mod spectrum;
pub mod synthesis;
pub mod window;

use serde::{Deserialize, Serialize};

pub use driver::{DriverState, StreamDriver};
pub use error::EngineError;
pub use exchange::BandWidthPolicy;
pub use params::{BandParams, ExchangeMode, ParamId, SharedParams};
pub use spectrum::Spectrum;

pub const MIN_FFT_SIZE: usize = 64;
pub const MAX_FFT_SIZE: usize = 32768;
pub const DEFAULT_FFT_SIZE: usize = 2048;
/// Smallest overlap for which squared Hann windows sum to a constant
pub const DEFAULT_OVERLAP: usize = 4;

/// Engine settings fixed for the lifetime of a [`StreamDriver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Transform size N (power of two)
    pub fft_size: usize,
    /// Frames per transform length; hop = fft_size / overlap
    pub overlap: usize,
    pub channels: usize,
    pub band_width: BandWidthPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            overlap: DEFAULT_OVERLAP,
            channels: 2,
            band_width: BandWidthPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.fft_size.is_power_of_two()
            || self.fft_size < MIN_FFT_SIZE
            || self.fft_size > MAX_FFT_SIZE
        {
            return Err(EngineError::InvalidFftSize(self.fft_size));
        }
        if !matches!(self.overlap, 1 | 2 | 4 | 8) {
            return Err(EngineError::InvalidOverlap(self.overlap));
        }
        if self.channels == 0 {
            return Err(EngineError::NoChannels);
        }
        Ok(())
    }

    pub fn hop(&self) -> usize {
        self.fft_size / self.overlap.max(1)
    }

    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.hop(), 512);
        assert_eq!(config.num_bins(), 1025);
    }

    #[test]
    fn rejects_bad_transform_sizes() {
        for fft_size in [0, 1000, 32, 65536] {
            let config = EngineConfig { fft_size, ..Default::default() };
            assert!(matches!(config.validate(), Err(EngineError::InvalidFftSize(n)) if n == fft_size));
        }
    }

    #[test]
    fn rejects_bad_overlap_and_channels() {
        let config = EngineConfig { overlap: 3, ..Default::default() };
        assert!(matches!(config.validate(), Err(EngineError::InvalidOverlap(3))));
        let config = EngineConfig { channels: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(EngineError::NoChannels)));
    }

    #[test]
    fn config_reads_from_toml() {
        let config: EngineConfig =
            toml::from_str("fft_size = 1024\nband_width = \"absolute-hz\"\n").unwrap();
        assert_eq!(config.fft_size, 1024);
        assert_eq!(config.overlap, DEFAULT_OVERLAP);
        assert_eq!(config.band_width, BandWidthPolicy::AbsoluteHz);
    }
}
