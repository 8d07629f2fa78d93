//! Analysis/synthesis window and its overlap-add gain.

/// Periodic Hann window of `size` samples.
///
/// The periodic form (denominator `size`, not `size - 1`) is the one whose
/// shifted copies sum to a constant, which the overlap-add path relies on.
pub fn hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
        })
        .collect()
}

/// Sum of the squared window at every hop offset, for each position in one hop.
///
/// This is the gain an unmodified signal picks up after analysis windowing,
/// synthesis windowing and overlap-add.
pub fn squared_overlap_sum(window: &[f32], hop: usize) -> Vec<f32> {
    let size = window.len();
    if hop == 0 || size == 0 {
        return Vec::new();
    }
    (0..hop.min(size))
        .map(|n| {
            (n..size)
                .step_by(hop)
                .map(|k| window[k] * window[k])
                .sum::<f32>()
        })
        .collect()
}

/// Mean squared-window overlap gain; constant across positions when the
/// window/hop pair satisfies COLA.
pub fn overlap_gain(window: &[f32], hop: usize) -> f32 {
    let sums = squared_overlap_sum(window, hop);
    if sums.is_empty() {
        return 1.0;
    }
    sums.iter().sum::<f32>() / sums.len() as f32
}

/// Largest deviation of the overlap sum from its mean, relative to the mean.
pub fn overlap_ripple(window: &[f32], hop: usize) -> f32 {
    let sums = squared_overlap_sum(window, hop);
    let mean = overlap_gain(window, hop);
    sums.iter()
        .map(|s| (s - mean).abs() / mean)
        .fold(0.0f32, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn hann_is_periodic() {
        let w = hann(8);
        assert_abs_diff_eq!(w[0], 0.0);
        assert_abs_diff_eq!(w[4], 1.0, epsilon = 1e-6);
        // symmetric around the center sample, last sample is not zero
        assert_abs_diff_eq!(w[1], w[7], epsilon = 1e-6);
        assert!(w[7] > 0.0);
    }

    #[test]
    fn squared_hann_is_cola_at_quarter_hop() {
        let w = hann(2048);
        let sums = squared_overlap_sum(&w, 512);
        for s in &sums {
            assert_abs_diff_eq!(*s, 1.5, epsilon = 1e-4);
        }
        assert!(overlap_ripple(&w, 512) < 1e-4);
    }

    #[test]
    fn squared_hann_ripples_at_half_hop() {
        // sin^4 + cos^4 swings between 0.5 and 1.0
        let w = hann(2048);
        let sums = squared_overlap_sum(&w, 1024);
        let min = sums.iter().copied().fold(f32::MAX, f32::min);
        let max = sums.iter().copied().fold(0.0f32, f32::max);
        assert_abs_diff_eq!(min, 0.5, epsilon = 1e-3);
        assert_abs_diff_eq!(max, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(overlap_gain(&w, 1024), 0.75, epsilon = 1e-3);
    }

    #[test]
    fn plain_hann_is_cola_at_half_hop() {
        let w = hann(1024);
        for n in 0..512 {
            assert_abs_diff_eq!(w[n] + w[n + 512], 1.0, epsilon = 1e-6);
        }
    }
}
