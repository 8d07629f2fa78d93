use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use bandswap::config::Config;
use bandswap::engine::{BandWidthPolicy, ParamId};

#[derive(Parser, Debug)]
#[command(name = "bandswap", about = "Spectral band exchange between a main signal and a sidechain")]
pub struct Cli {
    /// Main input audio file (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Sidechain audio file. Without one the input is copied through unchanged.
    #[arg(short, long)]
    pub sidechain: Option<PathBuf>,

    /// Output WAV file
    #[arg(short, long, default_value = "output.wav")]
    pub output: PathBuf,

    /// Config file (defaults to ./bandswap.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Transform size, a power of two between 64 and 32768
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Frames per transform length (1, 2, 4 or 8)
    #[arg(long)]
    pub overlap: Option<usize>,

    /// Samples per processing block
    #[arg(long)]
    pub block_size: Option<usize>,

    /// How band width is derived
    #[arg(long, value_enum)]
    pub band_width_policy: Option<WidthPolicyArg>,

    /// Band 1 center frequency in Hz
    #[arg(long)]
    pub freq1: Option<f32>,

    /// Band 2 center frequency in Hz
    #[arg(long)]
    pub freq2: Option<f32>,

    /// Band width as a ratio of the center frequency (0-2)
    #[arg(long)]
    pub band_length: Option<f32>,

    /// Band width in Hz for the absolute-hz policy
    #[arg(long)]
    pub band_width_hz: Option<f32>,

    /// 0 = proportional mix, 1 = full exchange
    #[arg(long)]
    pub exchange: Option<f32>,

    /// Band 1 mix (0.0-1.0)
    #[arg(long)]
    pub mix1: Option<f32>,

    /// Band 2 mix (0.0-1.0)
    #[arg(long)]
    pub mix2: Option<f32>,

    /// Parameter override by id, e.g. cutFrequencyFrom1=440 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub dump_config: bool,

    /// Keep the engine's latency in the output instead of trimming it
    #[arg(long)]
    pub no_latency_compensation: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum WidthPolicyArg {
    RatioOfCenter,
    AbsoluteHz,
}

impl From<WidthPolicyArg> for BandWidthPolicy {
    fn from(arg: WidthPolicyArg) -> Self {
        match arg {
            WidthPolicyArg::RatioOfCenter => BandWidthPolicy::RatioOfCenter,
            WidthPolicyArg::AbsoluteHz => BandWidthPolicy::AbsoluteHz,
        }
    }
}

impl Cli {
    /// Layer command-line values over `config`. Flags given explicitly win,
    /// `--set` entries are applied last.
    pub fn apply(&self, config: &mut Config) -> Result<()> {
        if let Some(fft_size) = self.fft_size {
            config.engine.fft_size = fft_size;
        }
        if let Some(overlap) = self.overlap {
            config.engine.overlap = overlap;
        }
        if let Some(block_size) = self.block_size {
            config.engine.block_size = block_size;
        }
        if let Some(policy) = self.band_width_policy {
            config.engine.band_width = policy.into();
        }

        let flags = [
            (ParamId::CutFrequency1, self.freq1),
            (ParamId::CutFrequency2, self.freq2),
            (ParamId::BandLength, self.band_length),
            (ParamId::BandWidthHz, self.band_width_hz),
            (ParamId::Exchange, self.exchange),
            (ParamId::Band1Mix, self.mix1),
            (ParamId::Band2Mix, self.mix2),
        ];
        for (id, value) in flags {
            if let Some(value) = value {
                config.exchange.set(id, value);
            }
        }

        for entry in &self.params {
            let (id, value) = parse_param(entry)?;
            config.exchange.set(id, value);
        }
        Ok(())
    }
}

fn parse_param(entry: &str) -> Result<(ParamId, f32)> {
    let (key, value) = entry
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{}'", entry))?;
    let id: ParamId = key.parse().map_err(anyhow::Error::msg)?;
    let value: f32 = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: '{}'", id, value))?;
    Ok((id, value))
}
