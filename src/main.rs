mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};

use bandswap::audio::{decode, encode};
use bandswap::config::{self, Config};
use bandswap::engine::{EngineConfig, SharedParams, StreamDriver};
use bandswap::render::{self, RenderOptions};
use cli::Cli;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect bandswap.toml / global config
    let mut cfg = match config::find_config(cli.config.as_deref()) {
        Some(path) => match config::load_config(&path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) if cli.config.is_none() => {
                log::warn!("{:#}", err);
                Config::default()
            }
            Err(err) => return Err(err),
        },
        None => Config::default(),
    };
    cli.apply(&mut cfg)?;
    cfg.exchange = cfg.exchange.sanitized();

    if cli.dump_config {
        print!("{}", cfg.to_toml()?);
        return Ok(());
    }

    let input = cli.input.as_ref().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }

    log::info!("bandswap - spectral band exchange");
    log::info!("Input: {}", input.display());
    if let Some(ref side) = cli.sidechain {
        log::info!("Sidechain: {}", side.display());
    }
    log::info!("Output: {}", cli.output.display());

    // 1. Decode audio
    log::info!("Decoding audio...");
    let main_audio = decode::decode_audio(input)?;
    let side_audio = match cli.sidechain {
        Some(ref path) => {
            let mut side = decode::decode_audio(path)?;
            if side.sample_rate != main_audio.sample_rate {
                anyhow::bail!(
                    "Sample rate mismatch: input is {}Hz, sidechain is {}Hz",
                    main_audio.sample_rate,
                    side.sample_rate
                );
            }
            if side.num_channels() != main_audio.num_channels() {
                log::warn!(
                    "Sidechain has {} channels, input has {}; copying input through",
                    side.num_channels(),
                    main_audio.num_channels()
                );
            }
            side.fit_to(main_audio.num_frames());
            Some(side)
        }
        None => {
            log::warn!("No sidechain given; copying input through");
            None
        }
    };

    // 2. Build the engine
    let engine_config = EngineConfig {
        fft_size: cfg.engine.fft_size,
        overlap: cfg.engine.overlap,
        channels: main_audio.num_channels(),
        band_width: cfg.engine.band_width,
    };
    let mut driver = StreamDriver::new(engine_config, SharedParams::new(cfg.exchange))
        .context("Invalid engine configuration")?;
    driver.prepare(main_audio.sample_rate as f64, cfg.engine.block_size);

    log::info!(
        "Bands: {:.0}Hz / {:.0}Hz, mode {:?}, mix {:.2} / {:.2}",
        cfg.exchange.cut_frequency_1,
        cfg.exchange.cut_frequency_2,
        cfg.exchange.mode(),
        cfg.exchange.band1_mix,
        cfg.exchange.band2_mix
    );

    // 3. Render
    let pb = ProgressBar::new(main_audio.num_frames() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} samples ({eta} remaining)")?
            .progress_chars("=>-"),
    );

    let options = RenderOptions {
        block_size: cfg.engine.block_size,
        latency_compensation: !cli.no_latency_compensation,
    };
    let output = render::render(
        &mut driver,
        &main_audio.channels,
        side_audio.as_ref().map(|s| s.channels.as_slice()),
        options,
        &pb,
    );
    pb.finish_with_message("Rendering complete");
    driver.release();

    // 4. Write output
    encode::write_wav(&cli.output, &output, main_audio.sample_rate)?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}
