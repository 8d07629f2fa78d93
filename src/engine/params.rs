//! Band selector parameters and their thread-shared handle.
//!
//! A UI or automation thread writes through [`SharedParams`]; the audio thread
//! takes one [`BandParams`] snapshot at the top of every cycle and never waits
//! for the lock.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub const MIN_FREQUENCY: f32 = 20.0;
pub const MAX_FREQUENCY: f32 = 20000.0;
/// Split point of the nonlinear frequency range (normalized 0.5)
pub const MID_FREQUENCY: f32 = 2000.0;
pub const DEFAULT_FREQUENCY: f32 = 2000.0;

pub const MAX_BAND_LENGTH: f32 = 2.0;
pub const MIN_BAND_WIDTH_HZ: f32 = 20.0;
pub const MAX_BAND_WIDTH_HZ: f32 = 2000.0;

pub const MIX_STEP: f32 = 0.01;
pub const DEFAULT_MIX: f32 = 0.01;

/// How the two bands are recombined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExchangeMode {
    /// Each band blends main and sidechain at the same bins.
    Proportional,
    /// Band 1 of one stream trades places with band 2 of the other.
    Full,
}

impl ExchangeMode {
    /// Interpret the host's boolean-like float.
    pub fn from_value(value: f32) -> Self {
        if value >= 0.5 {
            ExchangeMode::Full
        } else {
            ExchangeMode::Proportional
        }
    }

    pub fn value(self) -> f32 {
        match self {
            ExchangeMode::Proportional => 0.0,
            ExchangeMode::Full => 1.0,
        }
    }
}

/// The scalar parameter set. This is also the persisted state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandParams {
    /// Band 1 center frequency (Hz)
    #[serde(alias = "cutFrequencyFrom1")]
    pub cut_frequency_1: f32,
    /// Band 2 center frequency (Hz)
    #[serde(alias = "cutFrequencyFrom2")]
    pub cut_frequency_2: f32,
    /// Band width as a ratio of the center frequency
    #[serde(alias = "frequencyBandLength")]
    pub band_length: f32,
    /// Band width in Hz, used by the absolute-width policy
    #[serde(alias = "bandWidthHz")]
    pub band_width_hz: f32,
    /// 0 = proportional mix, 1 = full exchange
    #[serde(alias = "exchangeBandValue")]
    pub exchange: f32,
    #[serde(alias = "band1Mix")]
    pub band1_mix: f32,
    #[serde(alias = "band2Mix")]
    pub band2_mix: f32,
}

impl Default for BandParams {
    fn default() -> Self {
        Self {
            cut_frequency_1: DEFAULT_FREQUENCY,
            cut_frequency_2: DEFAULT_FREQUENCY,
            band_length: 1.0,
            band_width_hz: 200.0,
            exchange: 1.0,
            band1_mix: DEFAULT_MIX,
            band2_mix: DEFAULT_MIX,
        }
    }
}

impl BandParams {
    pub fn mode(&self) -> ExchangeMode {
        ExchangeMode::from_value(self.exchange)
    }

    pub fn get(&self, id: ParamId) -> f32 {
        match id {
            ParamId::CutFrequency1 => self.cut_frequency_1,
            ParamId::CutFrequency2 => self.cut_frequency_2,
            ParamId::BandLength => self.band_length,
            ParamId::BandWidthHz => self.band_width_hz,
            ParamId::Exchange => self.exchange,
            ParamId::Band1Mix => self.band1_mix,
            ParamId::Band2Mix => self.band2_mix,
        }
    }

    /// Set a plain value, clamped (and quantized where the parameter is stepped).
    pub fn set(&mut self, id: ParamId, value: f32) {
        let value = id.sanitize(value);
        match id {
            ParamId::CutFrequency1 => self.cut_frequency_1 = value,
            ParamId::CutFrequency2 => self.cut_frequency_2 = value,
            ParamId::BandLength => self.band_length = value,
            ParamId::BandWidthHz => self.band_width_hz = value,
            ParamId::Exchange => self.exchange = value,
            ParamId::Band1Mix => self.band1_mix = value,
            ParamId::Band2Mix => self.band2_mix = value,
        }
    }

    /// Copy with every field pulled back into its legal range.
    pub fn sanitized(&self) -> Self {
        let mut out = *self;
        for id in ParamId::ALL {
            out.set(id, self.get(id));
        }
        out
    }
}

/// Host-facing parameter identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamId {
    CutFrequency1,
    CutFrequency2,
    BandLength,
    BandWidthHz,
    Exchange,
    Band1Mix,
    Band2Mix,
}

impl ParamId {
    pub const ALL: [ParamId; 7] = [
        ParamId::CutFrequency1,
        ParamId::CutFrequency2,
        ParamId::BandLength,
        ParamId::BandWidthHz,
        ParamId::Exchange,
        ParamId::Band1Mix,
        ParamId::Band2Mix,
    ];

    pub fn host_id(self) -> &'static str {
        match self {
            ParamId::CutFrequency1 => "cutFrequencyFrom1",
            ParamId::CutFrequency2 => "cutFrequencyFrom2",
            ParamId::BandLength => "frequencyBandLength",
            ParamId::BandWidthHz => "bandWidthHz",
            ParamId::Exchange => "exchangeBandValue",
            ParamId::Band1Mix => "band1Mix",
            ParamId::Band2Mix => "band2Mix",
        }
    }

    /// Plain-value bounds `(min, max)`.
    pub fn range(self) -> (f32, f32) {
        match self {
            ParamId::CutFrequency1 | ParamId::CutFrequency2 => (MIN_FREQUENCY, MAX_FREQUENCY),
            ParamId::BandLength => (0.0, MAX_BAND_LENGTH),
            ParamId::BandWidthHz => (MIN_BAND_WIDTH_HZ, MAX_BAND_WIDTH_HZ),
            ParamId::Exchange | ParamId::Band1Mix | ParamId::Band2Mix => (0.0, 1.0),
        }
    }

    fn sanitize(self, value: f32) -> f32 {
        let (min, max) = self.range();
        // NaN from a misbehaving host lands on the lower bound
        let value = if value.is_nan() { min } else { value.clamp(min, max) };
        match self {
            ParamId::Exchange => ExchangeMode::from_value(value).value(),
            ParamId::Band1Mix | ParamId::Band2Mix => quantize_mix(value),
            _ => value,
        }
    }

    /// Map a normalized `0..=1` control position to a plain value.
    pub fn from_normalized(self, normalized: f32) -> f32 {
        let x = if normalized.is_nan() { 0.0 } else { normalized.clamp(0.0, 1.0) };
        match self {
            ParamId::CutFrequency1 | ParamId::CutFrequency2 => frequency_from_normalized(x),
            _ => {
                let (min, max) = self.range();
                self.sanitize(min + x * (max - min))
            }
        }
    }

    /// Inverse of [`from_normalized`](Self::from_normalized).
    pub fn to_normalized(self, value: f32) -> f32 {
        match self {
            ParamId::CutFrequency1 | ParamId::CutFrequency2 => normalized_from_frequency(value),
            _ => {
                let (min, max) = self.range();
                (self.sanitize(value) - min) / (max - min)
            }
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.host_id())
    }
}

impl FromStr for ParamId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().replace(['_', '-'], "").to_ascii_lowercase();
        let id = match key.as_str() {
            "cutfrequencyfrom1" | "cutfrequency1" | "freq1" => ParamId::CutFrequency1,
            "cutfrequencyfrom2" | "cutfrequency2" | "freq2" => ParamId::CutFrequency2,
            "frequencybandlength" | "bandlength" => ParamId::BandLength,
            "bandwidthhz" | "bandwidth" => ParamId::BandWidthHz,
            "exchangebandvalue" | "exchange" => ParamId::Exchange,
            "band1mix" | "mix1" => ParamId::Band1Mix,
            "band2mix" | "mix2" => ParamId::Band2Mix,
            _ => return Err(format!("unknown parameter '{}'", s)),
        };
        Ok(id)
    }
}

fn quantize_mix(value: f32) -> f32 {
    ((value / MIX_STEP).round() * MIX_STEP).clamp(0.0, 1.0)
}

/// Center-frequency control curve: exponential from 20 Hz to 2 kHz over the
/// lower half, quadratic from 2 kHz to 20 kHz over the upper half.
pub fn frequency_from_normalized(normalized: f32) -> f32 {
    let x = normalized.clamp(0.0, 1.0);
    if x < 0.5 {
        let fraction = x / 0.5;
        MIN_FREQUENCY * (MID_FREQUENCY / MIN_FREQUENCY).powf(fraction)
    } else {
        let fraction = (x - 0.5) / 0.5;
        MID_FREQUENCY + (MAX_FREQUENCY - MID_FREQUENCY) * fraction * fraction
    }
}

pub fn normalized_from_frequency(freq: f32) -> f32 {
    let freq = if freq.is_nan() { MIN_FREQUENCY } else { freq.clamp(MIN_FREQUENCY, MAX_FREQUENCY) };
    if freq < MID_FREQUENCY {
        0.5 * (freq / MIN_FREQUENCY).ln() / (MID_FREQUENCY / MIN_FREQUENCY).ln()
    } else {
        let fraction = (freq - MID_FREQUENCY) / (MAX_FREQUENCY - MID_FREQUENCY);
        0.5 + 0.5 * fraction.sqrt()
    }
}

/// Cloneable handle to the live parameter set.
#[derive(Clone, Debug, Default)]
pub struct SharedParams {
    inner: Arc<Mutex<BandParams>>,
}

impl SharedParams {
    pub fn new(params: BandParams) -> Self {
        Self {
            inner: Arc::new(Mutex::new(params.sanitized())),
        }
    }

    pub fn set(&self, id: ParamId, value: f32) {
        self.inner.lock().set(id, value);
    }

    pub fn set_normalized(&self, id: ParamId, normalized: f32) {
        self.set(id, id.from_normalized(normalized));
    }

    pub fn get(&self, id: ParamId) -> f32 {
        self.inner.lock().get(id)
    }

    pub fn replace(&self, params: BandParams) {
        *self.inner.lock() = params.sanitized();
    }

    /// Consistent copy of every parameter. May wait for a writer.
    pub fn snapshot(&self) -> BandParams {
        *self.inner.lock()
    }

    /// Non-blocking snapshot for the audio thread; `None` while a writer holds
    /// the lock.
    pub fn try_snapshot(&self) -> Option<BandParams> {
        self.inner.try_lock().map(|guard| *guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut p = BandParams::default();
        p.set(ParamId::CutFrequency1, 5.0);
        p.set(ParamId::CutFrequency2, 96000.0);
        p.set(ParamId::BandLength, -1.0);
        p.set(ParamId::Band1Mix, 3.0);
        p.set(ParamId::Band2Mix, f32::NAN);
        assert_eq!(p.cut_frequency_1, MIN_FREQUENCY);
        assert_eq!(p.cut_frequency_2, MAX_FREQUENCY);
        assert_eq!(p.band_length, 0.0);
        assert_eq!(p.band1_mix, 1.0);
        assert_eq!(p.band2_mix, 0.0);
    }

    #[test]
    fn mix_is_step_quantized() {
        let mut p = BandParams::default();
        p.set(ParamId::Band1Mix, 0.256);
        assert_abs_diff_eq!(p.band1_mix, 0.26, epsilon = 1e-6);
        p.set(ParamId::Band2Mix, 0.004);
        assert_eq!(p.band2_mix, 0.0);
    }

    #[test]
    fn exchange_flag_is_binary() {
        let mut p = BandParams::default();
        assert_eq!(p.mode(), ExchangeMode::Full);
        p.set(ParamId::Exchange, 0.3);
        assert_eq!(p.exchange, 0.0);
        assert_eq!(p.mode(), ExchangeMode::Proportional);
        p.set(ParamId::Exchange, 0.7);
        assert_eq!(p.mode(), ExchangeMode::Full);
    }

    #[test]
    fn frequency_curve_hits_anchor_points() {
        assert_abs_diff_eq!(frequency_from_normalized(0.0), 20.0, epsilon = 1e-3);
        assert_abs_diff_eq!(frequency_from_normalized(0.25), 200.0, epsilon = 1e-2);
        assert_abs_diff_eq!(frequency_from_normalized(0.5), 2000.0, epsilon = 1e-2);
        assert_abs_diff_eq!(frequency_from_normalized(0.75), 6500.0, epsilon = 1e-1);
        assert_abs_diff_eq!(frequency_from_normalized(1.0), 20000.0, epsilon = 1e-1);
    }

    #[test]
    fn frequency_curve_inverts() {
        for i in 0..=20 {
            let x = i as f32 / 20.0;
            let back = normalized_from_frequency(frequency_from_normalized(x));
            assert_abs_diff_eq!(back, x, epsilon = 1e-4);
        }
    }

    #[test]
    fn frequency_curve_is_monotonic() {
        let mut last = 0.0;
        for i in 0..=1000 {
            let f = frequency_from_normalized(i as f32 / 1000.0);
            assert!(f >= last);
            last = f;
        }
    }

    #[test]
    fn param_ids_parse_host_and_short_names() {
        assert_eq!("cutFrequencyFrom1".parse::<ParamId>(), Ok(ParamId::CutFrequency1));
        assert_eq!("band_2_mix".parse::<ParamId>(), Ok(ParamId::Band2Mix));
        assert_eq!("ExchangeBandValue".parse::<ParamId>(), Ok(ParamId::Exchange));
        assert!("gain".parse::<ParamId>().is_err());
        for id in ParamId::ALL {
            assert_eq!(id.host_id().parse::<ParamId>(), Ok(id));
        }
    }

    #[test]
    fn normalized_linear_params_round_trip() {
        assert_abs_diff_eq!(ParamId::BandLength.from_normalized(0.5), 1.0);
        assert_abs_diff_eq!(ParamId::BandLength.to_normalized(1.5), 0.75);
        assert_abs_diff_eq!(ParamId::BandWidthHz.from_normalized(0.0), MIN_BAND_WIDTH_HZ);
    }

    #[test]
    fn shared_snapshot_sees_latest_write() {
        let shared = SharedParams::default();
        let ui = shared.clone();
        ui.set(ParamId::CutFrequency1, 440.0);
        ui.set_normalized(ParamId::CutFrequency2, 0.5);
        let snap = shared.try_snapshot().unwrap();
        assert_eq!(snap.cut_frequency_1, 440.0);
        assert_abs_diff_eq!(snap.cut_frequency_2, 2000.0, epsilon = 1e-2);
    }

    #[test]
    fn try_snapshot_does_not_wait_for_writer() {
        let shared = SharedParams::default();
        let guard = shared.inner.lock();
        assert!(shared.try_snapshot().is_none());
        drop(guard);
        assert!(shared.try_snapshot().is_some());
    }

    #[test]
    fn params_deserialize_from_host_ids() {
        let p: BandParams = toml::from_str("cutFrequencyFrom1 = 1000.0\nband1Mix = 0.5\n").unwrap();
        assert_eq!(p.cut_frequency_1, 1000.0);
        assert_eq!(p.band1_mix, 0.5);
        assert_eq!(p.cut_frequency_2, DEFAULT_FREQUENCY);
    }
}
