//! Band selection and main/sidechain spectral recombination.

use serde::{Deserialize, Serialize};

use super::params::{BandParams, ExchangeMode, MIN_BAND_WIDTH_HZ, MIN_FREQUENCY};
use super::spectrum::Spectrum;

/// How the band-width control turns into a width in Hz.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandWidthPolicy {
    /// `width = frequencyBandLength * center`, limited to [20 Hz, sampleRate / 2].
    #[default]
    RatioOfCenter,
    /// `width = bandWidthHz`, independent of the center frequency.
    AbsoluteHz,
}

/// Closed interval of bin indices `[start, end]`, always inside `[0, N/2]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinRange {
    pub start: usize,
    pub end: usize,
}

impl BinRange {
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, bin: usize) -> bool {
        bin >= self.start && bin <= self.end
    }

    pub fn iter(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

/// Frequency/bin arithmetic for one sample rate and transform size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandLayout {
    sample_rate: f32,
    fft_size: usize,
}

impl BandLayout {
    pub fn new(sample_rate: f32, fft_size: usize) -> Self {
        Self { sample_rate, fft_size }
    }

    pub fn nyquist_bin(&self) -> usize {
        self.fft_size / 2
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate / 2.0
    }

    pub fn bin_frequency(&self, bin: usize) -> f32 {
        bin as f32 * self.sample_rate / self.fft_size as f32
    }

    /// `round(freq * N / sampleRate)`, clamped to `[0, N/2]`.
    pub fn bin_index(&self, freq: f32) -> usize {
        let bin = (freq * self.fft_size as f32 / self.sample_rate).round();
        if bin.is_nan() || bin <= 0.0 {
            0
        } else {
            (bin as usize).min(self.nyquist_bin())
        }
    }

    /// Half band width in bins, never below one bin.
    pub fn half_width_bins(&self, width_hz: f32) -> usize {
        let half = ((width_hz / 2.0) * self.fft_size as f32 / self.sample_rate).round();
        if half.is_nan() || half < 1.0 {
            1
        } else {
            (half as usize).min(self.nyquist_bin().max(1))
        }
    }

    /// Bin interval for a band of `width_hz` around `center_hz`.
    pub fn band_interval(&self, center_hz: f32, width_hz: f32) -> BinRange {
        let center = self.bin_index(self.clamp_center(center_hz));
        let half = self.half_width_bins(width_hz);
        BinRange {
            start: center.saturating_sub(half),
            end: (center + half).min(self.nyquist_bin()),
        }
    }

    fn clamp_center(&self, freq: f32) -> f32 {
        let max = self.nyquist().max(MIN_FREQUENCY);
        if freq.is_nan() {
            MIN_FREQUENCY
        } else {
            freq.clamp(MIN_FREQUENCY, max)
        }
    }

    /// Width in Hz of the band centered on `center_hz` under `policy`.
    pub fn band_width(&self, policy: BandWidthPolicy, center_hz: f32, params: &BandParams) -> f32 {
        let width = match policy {
            BandWidthPolicy::RatioOfCenter => self.clamp_center(center_hz) * params.band_length,
            BandWidthPolicy::AbsoluteHz => params.band_width_hz,
        };
        let max = self.nyquist().max(MIN_BAND_WIDTH_HZ);
        if width.is_nan() {
            MIN_BAND_WIDTH_HZ
        } else {
            width.clamp(MIN_BAND_WIDTH_HZ, max)
        }
    }

    /// Both band intervals for one parameter snapshot.
    pub fn intervals(&self, policy: BandWidthPolicy, params: &BandParams) -> (BinRange, BinRange) {
        let width_1 = self.band_width(policy, params.cut_frequency_1, params);
        let width_2 = self.band_width(policy, params.cut_frequency_2, params);
        (
            self.band_interval(params.cut_frequency_1, width_1),
            self.band_interval(params.cut_frequency_2, width_2),
        )
    }
}

/// Recombines a main and a sidechain spectrum in place.
///
/// After [`exchange`](Self::exchange) the main spectrum is the mixed output and
/// the sidechain spectrum holds the sidechain's side of the trade.
#[derive(Clone, Debug)]
pub struct BandExchanger {
    layout: BandLayout,
    policy: BandWidthPolicy,
}

impl BandExchanger {
    pub fn new(layout: BandLayout, policy: BandWidthPolicy) -> Self {
        Self { layout, policy }
    }

    pub fn layout(&self) -> &BandLayout {
        &self.layout
    }

    pub fn policy(&self) -> BandWidthPolicy {
        self.policy
    }

    pub fn exchange(&self, main: &mut Spectrum, side: &mut Spectrum, params: &BandParams) {
        let (band_1, band_2) = self.layout.intervals(self.policy, params);
        // intervals are clamped to N/2; also never walk past a short spectrum
        let last = main.len().min(side.len());
        if last == 0 {
            return;
        }
        let band_1 = clip(band_1, last - 1);
        let band_2 = clip(band_2, last - 1);

        match params.mode() {
            ExchangeMode::Proportional => {
                blend_in_place(main, side, band_1, params.band1_mix);
                blend_in_place(main, side, band_2, params.band2_mix);
            }
            ExchangeMode::Full => {
                swap_bands(main, side, band_1, band_2, params.band1_mix, params.band2_mix);
            }
        }
    }
}

fn clip(range: BinRange, last: usize) -> BinRange {
    BinRange {
        start: range.start,
        end: range.end.min(last),
    }
}

#[inline]
fn lerp(from: f32, to: f32, amount: f32) -> f32 {
    from * (1.0 - amount) + to * amount
}

/// Same-bin blend. Main moves `mix` of the way towards the sidechain, then the
/// sidechain moves `mix` of the way towards the already blended main.
fn blend_in_place(main: &mut Spectrum, side: &mut Spectrum, band: BinRange, mix: f32) {
    if band.is_empty() {
        return;
    }
    for i in band.iter() {
        main.magnitude[i] = lerp(main.magnitude[i], side.magnitude[i], mix);
        main.phase[i] = lerp(main.phase[i], side.phase[i], mix);
        side.magnitude[i] = lerp(side.magnitude[i], main.magnitude[i], mix);
        side.phase[i] = lerp(side.phase[i], main.phase[i], mix);
    }
}

/// Cross-band trade: bin `i` of band 1 pairs with bin `j` of band 2, walking
/// both intervals in lockstep until the shorter one runs out.
fn swap_bands(
    main: &mut Spectrum,
    side: &mut Spectrum,
    band_1: BinRange,
    band_2: BinRange,
    mix_1: f32,
    mix_2: f32,
) {
    if band_1.is_empty() || band_2.is_empty() {
        return;
    }
    for (i, j) in band_1.iter().zip(band_2.iter()) {
        let (main_mag, main_phase) = (main.magnitude[i], main.phase[i]);
        let (side_mag, side_phase) = (side.magnitude[j], side.phase[j]);
        main.magnitude[i] = lerp(main_mag, side_mag, mix_1);
        main.phase[i] = lerp(main_phase, side_phase, mix_1);
        side.magnitude[j] = lerp(side_mag, main_mag, mix_2);
        side.phase[j] = lerp(side_phase, main_phase, mix_2);
    }
}
