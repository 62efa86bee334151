//! CMA beamformer - command line front end
//!
//! Loads the session config, applies command line overrides and runs one
//! command. Set RUST_LOG=debug for delay vectors and stream details.

mod args;
mod commands;

use anyhow::{Context, Result};
use cma_core::config::{default_config_path, load_config, save_config, SessionConfig};

use args::{Args, Command, USAGE};

const CONFIG_FILENAME: &str = "session.yaml";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse(std::env::args().skip(1))?;
    let Some(command) = args.command else {
        eprint!("{}", USAGE);
        std::process::exit(2);
    };
    if command == Command::Help {
        print!("{}", USAGE);
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| default_config_path(CONFIG_FILENAME));
    let mut config: SessionConfig = load_config(&config_path);
    args.apply_to(&mut config);

    if args.save_config {
        save_config(&config, &config_path)
            .with_context(|| format!("Failed to save config to {:?}", config_path))?;
    }

    // Build the pool up front so the first sweep doesn't pay for it
    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .thread_name(|i| format!("rayon-sweep-{}", i))
        .build_global()
    {
        log::warn!("Could not configure Rayon thread pool: {}", e);
    }

    log::debug!(
        "{:?}: {} mics, r={}m, theta={} phi={}, c={}m/s, fs={}Hz",
        command,
        config.mic_count,
        config.radius,
        config.steering.theta,
        config.steering.phi,
        config.speed_of_sound,
        config.sample_rate
    );

    match command {
        Command::Pattern => commands::pattern(&config, &args),
        Command::Surface => commands::surface(&config, &args),
        Command::Delays => commands::delays(&config),
        Command::Stream => commands::stream(&config),
        Command::Process => commands::process(&config, &args),
        Command::Measure => commands::measure(&config, &args),
        Command::Devices => commands::devices(),
        Command::Help => Ok(()),
    }
}
