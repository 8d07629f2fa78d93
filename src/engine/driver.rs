use super::accumulator::{FrameAccumulator, StreamId};
use super::analyzer::SpectralAnalyzer;
use super::exchange::{BandExchanger, BandLayout};
use super::params::{BandParams, SharedParams};
use super::spectrum::Spectrum;
use super::synthesis::{OverlapAddBuffer, SpectralSynthesizer};
use super::{EngineConfig, EngineError};

/// Where the driver is in its accumulate/process cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Not prepared, released, or prepared with a degenerate sample rate.
    /// Audio passes through untouched.
    Unprepared,
    /// Prepared, nothing buffered. Also the bypass state while the sidechain
    /// is missing.
    Idle,
    /// Filling both streams' rings towards the next frame.
    Accumulating,
    /// Running analyze -> exchange -> synthesize for one frame.
    Cycle,
}

/// Buffers that only exist between `prepare` and `release`.
struct Pipeline {
    accumulator: FrameAccumulator,
    analyzer: SpectralAnalyzer,
    synthesizer: SpectralSynthesizer,
    exchanger: BandExchanger,
    outputs: Vec<OverlapAddBuffer>,
    frame: Vec<f32>,
    main_spectrum: Spectrum,
    side_spectrum: Spectrum,
}

impl Pipeline {
    fn new(config: &EngineConfig, sample_rate: f32) -> Self {
        let n = config.fft_size;
        let hop = config.hop();
        Self {
            accumulator: FrameAccumulator::new(config.channels, n, hop),
            analyzer: SpectralAnalyzer::new(n),
            synthesizer: SpectralSynthesizer::new(n, hop),
            exchanger: BandExchanger::new(BandLayout::new(sample_rate, n), config.band_width),
            outputs: (0..config.channels)
                .map(|_| OverlapAddBuffer::new(n, hop))
                .collect(),
            frame: vec![0.0; n],
            main_spectrum: Spectrum::for_fft_size(n),
            side_spectrum: Spectrum::for_fft_size(n),
        }
    }

    fn reset(&mut self) {
        self.accumulator.clear();
        for output in &mut self.outputs {
            output.clear();
        }
        self.frame.fill(0.0);
        self.main_spectrum.clear();
        self.side_spectrum.clear();
    }

    /// One frame for every channel. Returns the number of channels whose
    /// spectral path failed and fell back to the dry frame.
    fn run_cycle(&mut self, params: &BandParams) -> usize {
        let mut failed = 0;
        for ch in 0..self.outputs.len() {
            if self.process_channel(ch, params).is_err() {
                self.dry_frame(ch);
                failed += 1;
            }
            self.outputs[ch].add_frame(&self.frame);
        }
        self.accumulator.consume_hop();
        failed
    }

    fn process_channel(&mut self, ch: usize, params: &BandParams) -> Result<(), EngineError> {
        self.accumulator.read_frame(StreamId::Main, ch, &mut self.frame);
        self.analyzer.analyze(&self.frame, &mut self.main_spectrum)?;
        self.accumulator.read_frame(StreamId::Sidechain, ch, &mut self.frame);
        self.analyzer.analyze(&self.frame, &mut self.side_spectrum)?;

        self.exchanger
            .exchange(&mut self.main_spectrum, &mut self.side_spectrum, params);

        self.synthesizer
            .synthesize(&self.main_spectrum, &mut self.frame)
    }

    /// Main frame through both windows without the spectral round trip, so a
    /// failed cycle still overlap-adds to the dry signal.
    fn dry_frame(&mut self, ch: usize) {
        self.accumulator.read_frame(StreamId::Main, ch, &mut self.frame);
        let gain = self.synthesizer.output_gain();
        for (sample, &w) in self.frame.iter_mut().zip(self.analyzer.window()) {
            *sample *= w * w * gain;
        }
    }
}

/// Drives the cross-synthesis pipeline from an audio callback.
///
/// Output is delayed by [`latency_samples`](Self::latency_samples) while the
/// sidechain is active; without a usable sidechain the main input is left
/// exactly as it was.
pub struct StreamDriver {
    config: EngineConfig,
    params: SharedParams,
    snapshot: BandParams,
    state: DriverState,
    sample_rate: f32,
    max_block_size: usize,
    pipeline: Option<Pipeline>,
    cycles: u64,
    skipped_cycles: u64,
}

impl StreamDriver {
    pub fn new(config: EngineConfig, params: SharedParams) -> Result<Self, EngineError> {
        config.validate()?;
        let snapshot = params.snapshot();
        Ok(Self {
            config,
            params,
            snapshot,
            state: DriverState::Unprepared,
            sample_rate: 0.0,
            max_block_size: 0,
            pipeline: None,
            cycles: 0,
            skipped_cycles: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle for writing parameters from another thread.
    pub fn params(&self) -> &SharedParams {
        &self.params
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Delay between a main input sample and its processed output.
    pub fn latency_samples(&self) -> usize {
        self.config.fft_size
    }

    /// Completed analysis/synthesis cycles since `prepare`.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Cycles in which at least one channel fell back to the dry frame.
    pub fn skipped_cycles(&self) -> u64 {
        self.skipped_cycles
    }

    /// (Re)allocate every buffer for `sample_rate` and clear all state.
    ///
    /// A zero or non-finite sample rate leaves the driver unprepared, which
    /// passes audio through until a usable rate arrives.
    pub fn prepare(&mut self, sample_rate: f64, max_block_size: usize) {
        self.cycles = 0;
        self.skipped_cycles = 0;
        self.max_block_size = max_block_size;
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            log::warn!("prepare: unusable sample rate {}, passing audio through", sample_rate);
            self.pipeline = None;
            self.sample_rate = 0.0;
            self.state = DriverState::Unprepared;
            return;
        }

        self.sample_rate = sample_rate as f32;
        self.pipeline = Some(Pipeline::new(&self.config, self.sample_rate));
        self.snapshot = self.params.snapshot();
        self.state = DriverState::Idle;
        log::info!(
            "Prepared: {}Hz, fft={}, hop={}, channels={}, max block={}",
            sample_rate,
            self.config.fft_size,
            self.config.hop(),
            self.config.channels,
            max_block_size
        );
    }

    /// Drop transient buffers. Safe to call repeatedly.
    pub fn release(&mut self) {
        if self.pipeline.take().is_some() {
            log::info!("Released after {} cycles ({} skipped)", self.cycles, self.skipped_cycles);
        }
        self.state = DriverState::Unprepared;
    }

    /// Process one callback block in place.
    ///
    /// `main` holds one slice per channel and receives the output. The
    /// sidechain is used only when it has exactly as many channels as the
    /// engine and at least as many samples per channel as `main`.
    pub fn process<M: AsMut<[f32]>>(&mut self, main: &mut [M], sidechain: Option<&[&[f32]]>) {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };

        let num_samples = main.first_mut().map_or(0, |ch| ch.as_mut().len());
        let channels = self.config.channels;
        let main_ok =
            main.len() == channels && main.iter_mut().all(|ch| ch.as_mut().len() == num_samples);
        let side = match sidechain {
            Some(side)
                if main_ok
                    && side.len() == channels
                    && side.iter().all(|ch| ch.len() >= num_samples) =>
            {
                side
            }
            _ => {
                if self.state != DriverState::Idle {
                    log::debug!("Sidechain unavailable, bypassing");
                    pipeline.reset();
                    self.state = DriverState::Idle;
                }
                return;
            }
        };

        if self.state == DriverState::Idle {
            log::debug!("Sidechain active, accumulating");
        }
        self.state = DriverState::Accumulating;

        let mut offset = 0;
        while offset < num_samples {
            // never cross a frame boundary inside one chunk
            let until_ready = pipeline.accumulator.samples_until_ready(StreamId::Main).max(1);
            let chunk = (num_samples - offset).min(until_ready);
            let range = offset..offset + chunk;

            for (ch, (out, side_ch)) in main.iter_mut().zip(side.iter()).enumerate() {
                let out = out.as_mut();
                pipeline.accumulator.write(StreamId::Main, ch, &out[range.clone()]);
                pipeline.accumulator.write(StreamId::Sidechain, ch, &side_ch[range.clone()]);
                pipeline.outputs[ch].pop_into(&mut out[range.clone()]);
            }

            if pipeline.accumulator.both_ready() {
                self.state = DriverState::Cycle;
                if let Some(snapshot) = self.params.try_snapshot() {
                    self.snapshot = snapshot;
                }
                if pipeline.run_cycle(&self.snapshot) > 0 {
                    self.skipped_cycles += 1;
                }
                self.cycles += 1;
                self.state = DriverState::Accumulating;
            }
            offset += chunk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::params::ParamId;

    fn driver(channels: usize, fft_size: usize) -> StreamDriver {
        let config = EngineConfig {
            fft_size,
            channels,
            ..Default::default()
        };
        StreamDriver::new(config, SharedParams::default()).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        let config = EngineConfig { fft_size: 1000, ..Default::default() };
        assert!(StreamDriver::new(config, SharedParams::default()).is_err());
    }

    #[test]
    fn unprepared_driver_passes_through() {
        let mut d = driver(1, 256);
        let mut block = vec![vec![0.25f32; 64]];
        let side = vec![0.5f32; 64];
        d.process(&mut block, Some(&[side.as_slice()]));
        assert_eq!(block[0], vec![0.25f32; 64]);
        assert_eq!(d.state(), DriverState::Unprepared);
    }

    #[test]
    fn zero_sample_rate_stays_unprepared() {
        let mut d = driver(1, 256);
        d.prepare(0.0, 128);
        assert_eq!(d.state(), DriverState::Unprepared);
        d.prepare(f64::NAN, 128);
        assert_eq!(d.state(), DriverState::Unprepared);
        d.prepare(48000.0, 128);
        assert_eq!(d.state(), DriverState::Idle);
    }

    #[test]
    fn state_transitions() {
        let mut d = driver(1, 256);
        d.prepare(48000.0, 64);
        assert_eq!(d.state(), DriverState::Idle);

        let side = vec![0.1f32; 64];
        let mut block = vec![vec![0.1f32; 64]];
        d.process(&mut block, Some(&[side.as_slice()]));
        assert_eq!(d.state(), DriverState::Accumulating);
        assert_eq!(d.cycles(), 0);

        for _ in 0..3 {
            d.process(&mut block, Some(&[side.as_slice()]));
        }
        // 256 samples in: first frame done
        assert_eq!(d.cycles(), 1);

        d.process(&mut block, None);
        assert_eq!(d.state(), DriverState::Idle);

        d.release();
        assert_eq!(d.state(), DriverState::Unprepared);
        d.release();
        assert_eq!(d.state(), DriverState::Unprepared);
    }

    #[test]
    fn cycles_follow_hop_regardless_of_block_size() {
        for block_size in [1usize, 7, 64, 100, 300, 1024] {
            let mut d = driver(1, 256);
            d.prepare(44100.0, block_size);
            let total = 256 * 6;
            let side = vec![0.0f32; block_size];
            let mut done = 0;
            while done < total {
                let n = block_size.min(total - done);
                let mut block = vec![vec![0.0f32; n]];
                d.process(&mut block, Some(&[&side[..n]]));
                done += n;
            }
            // first frame after 256 samples, then every hop of 64
            assert_eq!(d.cycles(), 1 + (total as u64 - 256) / 64, "block {}", block_size);
            assert_eq!(d.skipped_cycles(), 0);
        }
    }

    #[test]
    fn mismatched_sidechain_channels_bypass() {
        let mut d = driver(2, 256);
        d.prepare(44100.0, 64);
        let input: Vec<Vec<f32>> = vec![(0..64).map(|i| i as f32).collect(); 2];
        let mut block = input.clone();
        let side = vec![1.0f32; 64];
        d.process(&mut block, Some(&[side.as_slice()]));
        assert_eq!(block, input);
        assert_eq!(d.state(), DriverState::Idle);
    }

    #[test]
    fn short_sidechain_bypasses() {
        let mut d = driver(1, 256);
        d.prepare(44100.0, 64);
        let input = vec![(0..64).map(|i| i as f32 * 0.01).collect::<Vec<f32>>()];
        let mut block = input.clone();
        let side = vec![1.0f32; 32];
        d.process(&mut block, Some(&[side.as_slice()]));
        assert_eq!(block, input);
    }

    #[test]
    fn prepare_is_idempotent() {
        let mut d = driver(1, 256);
        d.prepare(44100.0, 64);
        d.prepare(44100.0, 64);
        assert_eq!(d.state(), DriverState::Idle);
        assert_eq!(d.cycles(), 0);
        assert_eq!(d.latency_samples(), 256);
    }

    #[test]
    fn snapshot_taken_per_cycle() {
        let mut d = driver(1, 256);
        d.prepare(44100.0, 256);
        let ui = d.params().clone();
        ui.set(ParamId::Band1Mix, 0.75);
        let side = vec![0.0f32; 256];
        let mut block = vec![vec![0.0f32; 256]];
        d.process(&mut block, Some(&[side.as_slice()]));
        assert_eq!(d.snapshot.band1_mix, 0.75);
    }
}
