//! Offline rendering: stream whole decoded files through a [`StreamDriver`]
//! in fixed-size blocks, the same way a host would call it.

use indicatif::ProgressBar;

use crate::engine::{DriverState, StreamDriver};

#[derive(Clone, Copy, Debug)]
pub struct RenderOptions {
    /// Samples per simulated callback
    pub block_size: usize,
    /// Feed `latency` trailing zeros and drop the first `latency` outputs so
    /// the result lines up with the input.
    pub latency_compensation: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            block_size: 512,
            latency_compensation: true,
        }
    }
}

/// True when `driver` will run the spectral path for these buffers rather
/// than bypass them.
pub fn engages(driver: &StreamDriver, main: &[Vec<f32>], sidechain: Option<&[Vec<f32>]>) -> bool {
    let channels = driver.config().channels;
    let frames = main.first().map_or(0, Vec::len);
    let Some(side) = sidechain else {
        return false;
    };
    driver.state() != DriverState::Unprepared
        && main.len() == channels
        && main.iter().all(|c| c.len() == frames)
        && side.len() == channels
        && side.iter().all(|c| c.len() >= frames)
}

/// Run `main` (planar) against an optional sidechain and return the processed
/// channels, each as long as the input.
pub fn render(
    driver: &mut StreamDriver,
    main: &[Vec<f32>],
    sidechain: Option<&[Vec<f32>]>,
    options: RenderOptions,
    progress: &ProgressBar,
) -> Vec<Vec<f32>> {
    let frames = main.first().map_or(0, Vec::len);
    let block_size = options.block_size.max(1);
    let latency = if options.latency_compensation && engages(driver, main, sidechain) {
        driver.latency_samples()
    } else {
        0
    };
    let total = frames + latency;

    let mut output: Vec<Vec<f32>> = main.iter().map(|_| Vec::with_capacity(frames)).collect();
    let mut block: Vec<Vec<f32>> = main.iter().map(|_| vec![0.0; block_size]).collect();
    let mut side_block: Vec<Vec<f32>> = sidechain
        .map(|side| side.iter().map(|_| vec![0.0; block_size]).collect())
        .unwrap_or_default();

    progress.set_length(total as u64);

    let mut pos = 0;
    while pos < total {
        let len = block_size.min(total - pos);
        for (buf, src) in block.iter_mut().zip(main) {
            fill_block(&mut buf[..len], src, pos);
        }
        if let Some(side) = sidechain {
            for (buf, src) in side_block.iter_mut().zip(side) {
                fill_block(&mut buf[..len], src, pos);
            }
        }

        let mut views: Vec<&mut [f32]> = block.iter_mut().map(|b| &mut b[..len]).collect();
        if sidechain.is_some() {
            let side_views: Vec<&[f32]> = side_block.iter().map(|b| &b[..len]).collect();
            driver.process(&mut views, Some(side_views.as_slice()));
        } else {
            driver.process(&mut views, None);
        }

        // drop the warm-up samples that precede the first aligned output
        let skip = latency.saturating_sub(pos).min(len);
        for (out, buf) in output.iter_mut().zip(&block) {
            out.extend_from_slice(&buf[skip..len]);
        }

        pos += len;
        progress.inc(len as u64);
    }

    log::info!(
        "Rendered {} frames in {} cycles ({} skipped), latency {} compensated",
        frames,
        driver.cycles(),
        driver.skipped_cycles(),
        latency
    );
    output
}

/// Copy `src[pos..]` into `buf`, zero-filling past the end of `src`.
fn fill_block(buf: &mut [f32], src: &[f32], pos: usize) {
    let tail = src.get(pos..).unwrap_or_default();
    let available = tail.len().min(buf.len());
    buf[..available].copy_from_slice(&tail[..available]);
    buf[available..].fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BandParams, EngineConfig, SharedParams};
    use approx::assert_abs_diff_eq;

    fn driver(channels: usize) -> StreamDriver {
        let config = EngineConfig {
            fft_size: 512,
            channels,
            ..Default::default()
        };
        let params = BandParams {
            exchange: 0.0,
            band1_mix: 0.0,
            band2_mix: 0.0,
            ..Default::default()
        };
        let mut driver = StreamDriver::new(config, SharedParams::new(params)).unwrap();
        driver.prepare(44100.0, 256);
        driver
    }

    fn signal(len: usize, rate: f32) -> Vec<f32> {
        (0..len).map(|i| 0.5 * (i as f32 * rate).sin()).collect()
    }

    #[test]
    fn compensated_render_lines_up_with_input() {
        let mut driver = driver(2);
        let main = vec![signal(5000, 0.03), signal(5000, 0.11)];
        let side = vec![vec![0.0; 5000], vec![0.0; 5000]];
        let out = render(&mut driver, &main, Some(side.as_slice()), RenderOptions::default(), &ProgressBar::hidden());

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 5000);
        for ch in 0..2 {
            for t in 512..5000 {
                assert_abs_diff_eq!(out[ch][t], main[ch][t], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn uncompensated_render_is_delayed() {
        let mut driver = driver(1);
        let main = vec![signal(3000, 0.05)];
        let side = vec![vec![0.0; 3000]];
        let options = RenderOptions {
            block_size: 100,
            latency_compensation: false,
        };
        let out = render(&mut driver, &main, Some(side.as_slice()), options, &ProgressBar::hidden());

        assert_eq!(out[0].len(), 3000);
        assert!(out[0][..512].iter().all(|&s| s == 0.0));
        for t in 512..3000 - 512 {
            assert_abs_diff_eq!(out[0][t + 512], main[0][t], epsilon = 1e-4);
        }
    }

    #[test]
    fn missing_sidechain_passes_through_without_delay() {
        let mut driver = driver(1);
        let main = vec![signal(2000, 0.07)];
        assert!(!engages(&driver, &main, None));
        let out = render(&mut driver, &main, None, RenderOptions::default(), &ProgressBar::hidden());
        assert_eq!(out, main);
        assert_eq!(driver.cycles(), 0);
    }

    #[test]
    fn channel_mismatch_passes_through() {
        let mut driver = driver(2);
        let main = vec![signal(1500, 0.02), signal(1500, 0.09)];
        let side = vec![vec![0.3; 1500]];
        assert!(!engages(&driver, &main, Some(side.as_slice())));
        let out = render(&mut driver, &main, Some(side.as_slice()), RenderOptions::default(), &ProgressBar::hidden());
        assert_eq!(out, main);
    }

    #[test]
    fn fill_block_zero_pads_tail() {
        let mut buf = [9.0; 4];
        fill_block(&mut buf, &[1.0, 2.0, 3.0], 1);
        assert_eq!(buf, [2.0, 3.0, 0.0, 0.0]);
        fill_block(&mut buf, &[1.0], 5);
        assert_eq!(buf, [0.0; 4]);
    }
}
