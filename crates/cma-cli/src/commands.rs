//! Command implementations
//!
//! Numeric results go to stdout as CSV; progress and diagnostics go through
//! the logger (stderr).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use cma_core::audio::{get_devices, start_session, AudioError, Direction};
use cma_core::beampattern::BeampatternEvaluator;
use cma_core::config::SessionConfig;
use cma_core::geometry::compute_delays;
use cma_core::measurement::measured_beampattern;
use cma_core::offline::OfflineProcessor;
use cma_core::quantize::{quantize_to_grid, quantize_to_samples};
use cma_core::recording::{
    read_wav, timestamped_stem, write_mono_wav, write_recordings, Recordings,
};
use cma_core::stream::ChannelMap;

use crate::args::Args;

/// Resolution used when none is given
const DEFAULT_RESOLUTION: usize = 360;

fn evaluator(config: &SessionConfig, args: &Args, resolution: usize) -> Result<BeampatternEvaluator> {
    let evaluator = BeampatternEvaluator::new(config.geometry()?, config.speed_of_sound, resolution)?;
    if args.quantize {
        Ok(evaluator.with_quantization(config.sample_rate as f64)?)
    } else {
        Ok(evaluator)
    }
}

pub fn pattern(config: &SessionConfig, args: &Args) -> Result<()> {
    let frequency = args.frequency.context("pattern needs --frequency")?;
    let evaluator = evaluator(config, args, args.resolution.unwrap_or(DEFAULT_RESOLUTION))?;
    let response = evaluator.evaluate(config.steering, frequency)?;

    println!("angle_deg,magnitude,db");
    for (k, (magnitude, db)) in response
        .magnitudes()
        .into_iter()
        .zip(response.to_decibels(1.0))
        .enumerate()
    {
        println!("{},{:.6},{:.3}", response.angle_deg(k), magnitude, db);
    }
    Ok(())
}

pub fn surface(config: &SessionConfig, args: &Args) -> Result<()> {
    let frequencies = args.sweep_frequencies()?;
    let resolution = args.resolution.unwrap_or(DEFAULT_RESOLUTION);
    let evaluator = evaluator(config, args, resolution)?;

    log::info!(
        "Sweeping {} frequencies from {} to {} Hz",
        frequencies.len(),
        frequencies.first().copied().unwrap_or_default(),
        frequencies.last().copied().unwrap_or_default()
    );
    let surface = evaluator.sweep(config.steering, &frequencies)?;

    println!("frequency_hz,angle_deg,db");
    for (frequency, response) in surface.frequencies.iter().zip(&surface.responses) {
        for (k, db) in response.to_decibels(1.0).into_iter().enumerate() {
            println!("{},{},{:.3}", frequency, response.angle_deg(k), db);
        }
    }
    Ok(())
}

pub fn delays(config: &SessionConfig) -> Result<()> {
    let geometry = config.geometry()?;
    let fs = config.sample_rate as f64;
    let delays = compute_delays(&geometry, config.steering, config.speed_of_sound)?;
    let on_grid = quantize_to_grid(&delays, fs)?;
    let samples = quantize_to_samples(&delays, fs)?;

    println!("mic,angle_deg,delay_s,quantized_s,samples");
    for i in 0..geometry.mic_count() {
        println!(
            "{},{},{:.9},{:.9},{}",
            i,
            geometry.mic_angle(i).to_degrees(),
            delays[i],
            on_grid[i],
            samples.as_slice()[i]
        );
    }

    if samples.max() > config.block_size {
        log::warn!(
            "Largest delay ({} samples) exceeds the block size ({}); streaming would fail",
            samples.max(),
            config.block_size
        );
    }
    Ok(())
}

pub fn stream(config: &SessionConfig) -> Result<()> {
    let duration = config
        .duration()
        .with_context(|| format!("Invalid session duration {}s", config.duration_secs))?;
    let settings = config.stream_settings()?;

    let session = start_session(&config.audio, &settings, duration)?;
    log::info!(
        "Recording {:.1}s (+{:.1}ms block latency)",
        duration.as_secs_f64(),
        session.latency_ms()
    );

    if !session.wait(duration) {
        log::error!("Processing failed, stopping early");
    }

    match session.finish() {
        Ok(recordings) => save_session(config, &recordings),
        Err(AudioError::SessionAborted { error, recordings }) => {
            // Flush what was captured before the failure
            if !recordings.is_empty() {
                save_session(config, &recordings)?;
            }
            bail!("Session aborted after {} frames: {}", recordings.frames(), error)
        }
        Err(e) => Err(e.into()),
    }
}

fn save_session(config: &SessionConfig, recordings: &Recordings) -> Result<()> {
    let stem = timestamped_stem("session");
    let paths = write_recordings(recordings, &config.recordings_dir, config.sample_rate, &stem)?;
    println!("{}", paths.raw.display());
    println!("{}", paths.mixed.display());
    Ok(())
}

/// `<out_dir or input dir>/<input stem>_processed.wav`
fn processed_path(input: &Path, out_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string());
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| input.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("{}_processed.wav", stem))
}

pub fn process(config: &SessionConfig, args: &Args) -> Result<()> {
    if args.inputs.is_empty() {
        bail!("process needs at least one WAV file");
    }
    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {:?}", dir))?;
    }

    let geometry = config.geometry()?;
    for input in &args.inputs {
        let wav = read_wav(input)?;
        if wav.sample_rate != config.sample_rate {
            log::warn!(
                "{:?} is {} Hz, quantizing delays for that rate instead of {} Hz",
                input,
                wav.sample_rate,
                config.sample_rate
            );
        }

        let channel_map = ChannelMap::new(args.order.map(config), config.mic_count, wav.block.channels())
            .with_context(|| format!("Channel order does not fit {:?}", input))?;
        let processor = OfflineProcessor::new(
            &geometry,
            config.steering,
            config.speed_of_sound,
            wav.sample_rate,
            channel_map,
            config.gain,
        )?;
        let mono = processor.process(&wav.block)?;

        let output = processed_path(input, args.out_dir.as_deref());
        write_mono_wav(&output, &mono, wav.sample_rate)?;
        log::info!("{:?} -> {:?} ({} samples)", input, output, mono.len());
        println!("{}", output.display());
    }
    Ok(())
}

pub fn measure(config: &SessionConfig, args: &Args) -> Result<()> {
    let frequency = args.frequency.context("measure needs --frequency")?;
    if args.inputs.is_empty() {
        bail!("measure needs the processed recordings, one per angle");
    }

    let mut sample_rate = None;
    let mut signals = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        let wav = read_wav(input)?;
        match sample_rate {
            None => sample_rate = Some(wav.sample_rate),
            Some(fs) if fs != wav.sample_rate => {
                bail!("{:?} is {} Hz, expected {} Hz", input, wav.sample_rate, fs)
            }
            Some(_) => {}
        }
        signals.push(wav.block.channel(0).to_vec());
    }
    let fs = sample_rate.unwrap_or(config.sample_rate) as f64;

    let measured = measured_beampattern(&signals, fs, frequency)?;
    let theory = evaluator(config, args, signals.len())?
        .evaluate(config.steering, frequency)?
        .to_decibels(1.0);

    println!("angle_deg,measured_db,theory_db");
    for (k, (m, t)) in measured.iter().zip(&theory).enumerate() {
        println!("{},{:.3},{:.3}", k as f64 * 360.0 / signals.len() as f64, m, t);
    }
    Ok(())
}

pub fn devices() -> Result<()> {
    for (label, direction) in [("Input", Direction::Input), ("Output", Direction::Output)] {
        println!("{} devices:", label);
        match get_devices(direction) {
            Ok(devices) => {
                for device in devices {
                    println!(
                        "  {}{} ({} ch, {:?} Hz)",
                        device,
                        if device.is_default { " [default]" } else { "" },
                        device.max_channels,
                        device.sample_rates
                    );
                }
            }
            Err(AudioError::NoDevices) => println!("  (none)"),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
