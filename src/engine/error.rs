use thiserror::Error;

/// Construction-time failures of the spectral engine.
///
/// Nothing on the audio callback path returns these; a failed cycle degrades to
/// a skipped cycle instead.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transform size {0} must be a power of two in [{min}, {max}]", min = super::MIN_FFT_SIZE, max = super::MAX_FFT_SIZE)]
    InvalidFftSize(usize),

    #[error("overlap factor {0} not supported (expected 1, 2, 4 or 8)")]
    InvalidOverlap(usize),

    #[error("channel count must be at least 1")]
    NoChannels,

    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),
}
