//! Inverse transform and overlap-add reconstruction.

use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner};
use rustfft::num_complex::Complex;

use super::spectrum::Spectrum;
use super::window::{hann, overlap_gain};
use super::EngineError;

/// Magnitude/phase spectrum back to a windowed time-domain frame.
pub struct SpectralSynthesizer {
    fft_size: usize,
    window: Vec<f32>,
    /// 1 / COLA gain of the analysis * synthesis window pair at this hop
    output_gain: f32,
    ifft: Arc<dyn ComplexToReal<f32>>,
    bins: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralSynthesizer {
    pub fn new(fft_size: usize, hop: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let ifft = planner.plan_fft_inverse(fft_size);
        let window = hann(fft_size);
        let gain = overlap_gain(&window, hop);
        Self {
            fft_size,
            output_gain: if gain > 0.0 { 1.0 / gain } else { 1.0 },
            window,
            bins: ifft.make_input_vec(),
            scratch: ifft.make_scratch_vec(),
            ifft,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Gain applied after windowing so overlapped frames sum to unity.
    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    /// Rebuild the frame for `spectrum` into `out` (`fft_size` samples).
    ///
    /// Only bins `0..=N/2` are materialized; the inverse real transform treats
    /// the upper half as their complex conjugate mirror.
    pub fn synthesize(&mut self, spectrum: &Spectrum, out: &mut [f32]) -> Result<(), EngineError> {
        for ((bin, &mag), &phase) in self
            .bins
            .iter_mut()
            .zip(&spectrum.magnitude)
            .zip(&spectrum.phase)
        {
            *bin = Complex::from_polar(mag, phase);
        }
        // DC and Nyquist carry no imaginary part in a real signal
        let last = self.bins.len() - 1;
        self.bins[0].im = 0.0;
        self.bins[last].im = 0.0;

        self.ifft
            .process_with_scratch(&mut self.bins, out, &mut self.scratch)?;

        let scale = self.output_gain / self.fft_size as f32;
        for (sample, &w) in out.iter_mut().zip(&self.window) {
            *sample *= w * scale;
        }
        Ok(())
    }
}

/// Running output stream: synthesized frames are summed in, finished samples
/// are read out and zeroed.
///
/// Sample positions line up as `input time t -> buffer[(t + frame_size) % len]`,
/// so every frame lands strictly ahead of the read cursor.
#[derive(Debug, Clone)]
pub struct OverlapAddBuffer {
    buffer: Vec<f32>,
    frame_size: usize,
    hop: usize,
    write_index: usize,
    read_index: usize,
}

impl OverlapAddBuffer {
    /// `2 * frame_size` long, which leaves room for any hop up to a full frame.
    pub fn new(frame_size: usize, hop: usize) -> Self {
        Self {
            buffer: vec![0.0; frame_size * 2],
            frame_size,
            hop: hop.clamp(1, frame_size),
            write_index: frame_size,
            read_index: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn write_index(&self) -> usize {
        self.write_index
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// `buffer[write_index + k] += frame[k]`, then advance by one hop.
    pub fn add_frame(&mut self, frame: &[f32]) {
        let len = self.buffer.len();
        for (k, &sample) in frame.iter().take(self.frame_size).enumerate() {
            self.buffer[(self.write_index + k) % len] += sample;
        }
        self.write_index = (self.write_index + self.hop) % len;
    }

    /// Emit `out.len()` finished samples.
    pub fn pop_into(&mut self, out: &mut [f32]) {
        let len = self.buffer.len();
        for sample in out.iter_mut() {
            *sample = self.buffer[self.read_index];
            self.buffer[self.read_index] = 0.0;
            self.read_index = (self.read_index + 1) % len;
        }
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_index = self.frame_size;
        self.read_index = 0;
    }
}
