use anyhow::{Context, Result};
use std::path::Path;

/// Write planar channels as a 32-bit float WAV file.
pub fn write_wav(path: &Path, channels: &[Vec<f32>], sample_rate: u32) -> Result<()> {
    let num_channels = u16::try_from(channels.len())
        .ok()
        .filter(|&n| n > 0)
        .context("WAV output needs between 1 and 65535 channels")?;
    let frames = channels[0].len();
    if channels.iter().any(|c| c.len() != frames) {
        anyhow::bail!("All output channels must have the same length");
    }

    let spec = hound::WavSpec {
        channels: num_channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;

    for i in 0..frames {
        for channel in channels {
            writer
                .write_sample(channel[i])
                .context("Failed to write sample")?;
        }
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    log::info!(
        "Wrote {}: {} frames x {} channels, {}Hz",
        path.display(),
        frames,
        num_channels,
        sample_rate
    );
    Ok(())
}
