use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::engine::{BandParams, BandWidthPolicy, DEFAULT_FFT_SIZE, DEFAULT_OVERLAP};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub exchange: BandParams,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct EngineSection {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    #[serde(default)]
    pub band_width: BandWidthPolicy,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            overlap: default_overlap(),
            block_size: default_block_size(),
            band_width: BandWidthPolicy::default(),
        }
    }
}

fn default_fft_size() -> usize { DEFAULT_FFT_SIZE }
fn default_overlap() -> usize { DEFAULT_OVERLAP }
fn default_block_size() -> usize { 512 }

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Invalid config: {}", path.display()))
}

/// Explicit path first, then `./bandswap.toml`, then the per-user config files.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("bandswap.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("bandswap").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("bandswap").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

impl Config {
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }
}
