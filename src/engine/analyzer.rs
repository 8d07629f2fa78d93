use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

use super::spectrum::Spectrum;
use super::window::hann;
use super::EngineError;

/// Windowed forward real FFT producing magnitude/phase spectra.
///
/// Every buffer is allocated in [`SpectralAnalyzer::new`]; the scratch contents
/// are overwritten on each call, so [`analyze`](Self::analyze) depends on its
/// frame argument only.
pub struct SpectralAnalyzer {
    fft_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    bins: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralAnalyzer {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        Self {
            fft_size,
            window: hann(fft_size),
            input: fft.make_input_vec(),
            bins: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Window `frame` and write its spectrum into `out`.
    ///
    /// `frame` must hold `fft_size` samples and `out` `fft_size / 2 + 1` bins.
    pub fn analyze(&mut self, frame: &[f32], out: &mut Spectrum) -> Result<(), EngineError> {
        // realfft clobbers its input, so every slot is rewritten (short frames zero-pad)
        for (i, (dst, &w)) in self.input.iter_mut().zip(&self.window).enumerate() {
            *dst = frame.get(i).copied().unwrap_or(0.0) * w;
        }
        self.fft
            .process_with_scratch(&mut self.input, &mut self.bins, &mut self.scratch)?;

        for ((bin, mag), phase) in self
            .bins
            .iter()
            .zip(out.magnitude.iter_mut())
            .zip(out.phase.iter_mut())
        {
            *mag = bin.norm();
            *phase = bin.im.atan2(bin.re);
        }
        Ok(())
    }
}
