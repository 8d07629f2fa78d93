/// Magnitude/phase view of one frame, `fft_size / 2 + 1` bins long.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    /// Linear magnitude per bin (non-negative)
    pub magnitude: Vec<f32>,
    /// Phase per bin in radians, (-pi, pi] straight out of analysis
    pub phase: Vec<f32>,
}

impl Spectrum {
    pub fn new(num_bins: usize) -> Self {
        Self {
            magnitude: vec![0.0; num_bins],
            phase: vec![0.0; num_bins],
        }
    }

    pub fn for_fft_size(fft_size: usize) -> Self {
        Self::new(fft_size / 2 + 1)
    }

    pub fn len(&self) -> usize {
        self.magnitude.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitude.is_empty()
    }

    pub fn clear(&mut self) {
        self.magnitude.fill(0.0);
        self.phase.fill(0.0);
    }

    pub fn copy_from(&mut self, other: &Spectrum) {
        self.magnitude.copy_from_slice(&other.magnitude);
        self.phase.copy_from_slice(&other.phase);
    }

    /// Bin with the largest magnitude.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitude
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }

    /// Sum of squared magnitudes over `bins` (clamped to the spectrum).
    pub fn energy(&self, bins: std::ops::Range<usize>) -> f32 {
        let end = bins.end.min(self.len());
        let start = bins.start.min(end);
        self.magnitude[start..end].iter().map(|m| m * m).sum()
    }
}
