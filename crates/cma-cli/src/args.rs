//! Command line parsing
//!
//! `cma <command> [options] [files...]`. Options shared by all commands
//! override the loaded session config; the rest only matter to one command.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use cma_core::audio::DeviceId;
use cma_core::config::SessionConfig;
use cma_core::geometry::SteeringDirection;
use cma_core::stream::{MEASUREMENT_CHANNEL_ORDER, REALTIME_CHANNEL_ORDER};

/// Upper bound on the points of a frequency sweep
const MAX_SWEEP_POINTS: usize = 1_000_000;

pub const USAGE: &str = "\
Usage: cma <command> [options] [files...]

Commands:
  pattern    Beampattern at one frequency (CSV: angle, magnitude, dB)
  surface    Beampatterns over a frequency range (CSV: frequency, angle, dB)
  delays     Steering delays per microphone (CSV)
  stream     Capture, steer and record from the audio interface
  process    Steer complete multichannel WAV recordings offline
  measure    Beampattern from processed turntable recordings vs theory
  devices    List audio input and output devices

Options:
  --config <path>         Session config (default ~/cma-beamformer/session.yaml)
  --mics <n>              Number of microphones
  --radius <m>            Array radius in meters
  --theta <deg>           Steering polar angle
  --phi <deg>             Steering azimuth
  --speed <m/s>           Speed of sound
  --sample-rate <hz>      Sampling frequency
  --block-size <frames>   Processing block size
  --gain <x>              Linear output gain
  --frequency <hz>        Evaluation frequency (pattern, measure)
  --from/--to/--step <hz> Frequency range (surface)
  --resolution <n>        Evaluation angles over 360 degrees (default 360)
  --quantize              Quantize steering delays to the sampling grid
  --duration <s>          Capture length (stream)
  --monitor               Play the steered signal while capturing (stream)
  --input-device <name>   Capture device (stream)
  --output-device <name>  Monitor device, implies --monitor (stream)
  --order <name>          Channel order: config, realtime, measurement, identity
  --out <dir>             Output directory for WAV files
  --save-config           Write the effective config back to --config
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pattern,
    Surface,
    Delays,
    Stream,
    Process,
    Measure,
    Devices,
    Help,
}

impl Command {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "pattern" => Self::Pattern,
            "surface" => Self::Surface,
            "delays" => Self::Delays,
            "stream" => Self::Stream,
            "process" => Self::Process,
            "measure" => Self::Measure,
            "devices" => Self::Devices,
            "help" | "--help" | "-h" => Self::Help,
            other => bail!("Unknown command '{}'", other),
        })
    }
}

/// Physical channel order used for offline processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Whatever the session config says
    #[default]
    Config,
    Realtime,
    Measurement,
    Identity,
}

impl ChannelOrder {
    fn parse(name: &str) -> Result<Self> {
        Ok(match name {
            "config" => Self::Config,
            "realtime" => Self::Realtime,
            "measurement" => Self::Measurement,
            "identity" => Self::Identity,
            other => bail!("Unknown channel order '{}'", other),
        })
    }

    /// Channel map entries for `mic_count` microphones
    pub fn map(&self, config: &SessionConfig) -> Vec<usize> {
        match self {
            Self::Config => config.channel_map.clone(),
            Self::Realtime => REALTIME_CHANNEL_ORDER.to_vec(),
            Self::Measurement => MEASUREMENT_CHANNEL_ORDER.to_vec(),
            Self::Identity => (0..config.mic_count).collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Args {
    pub command: Option<Command>,
    pub config: Option<PathBuf>,
    pub save_config: bool,

    // Session overrides
    pub mic_count: Option<usize>,
    pub radius: Option<f64>,
    pub theta: Option<f64>,
    pub phi: Option<f64>,
    pub speed_of_sound: Option<f64>,
    pub sample_rate: Option<u32>,
    pub block_size: Option<usize>,
    pub gain: Option<f32>,
    pub duration: Option<f64>,
    pub monitor: bool,
    pub input_device: Option<String>,
    pub output_device: Option<String>,

    // Command specific
    pub frequency: Option<f64>,
    pub from: Option<f64>,
    pub to: Option<f64>,
    pub step: Option<f64>,
    pub resolution: Option<usize>,
    pub quantize: bool,
    pub order: ChannelOrder,
    pub out_dir: Option<PathBuf>,
    pub inputs: Vec<PathBuf>,
}

fn value<T: std::str::FromStr>(flag: &str, raw: Option<String>) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = raw.ok_or_else(|| anyhow!("{} needs a value", flag))?;
    raw.parse::<T>()
        .with_context(|| format!("Invalid value '{}' for {}", raw, flag))
}

impl Args {
    /// Parse arguments without the program name
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let flag = arg.as_str();
            match flag {
                "--config" => parsed.config = Some(value(flag, args.next())?),
                "--save-config" => parsed.save_config = true,
                "--mics" => parsed.mic_count = Some(value(flag, args.next())?),
                "--radius" => parsed.radius = Some(value(flag, args.next())?),
                "--theta" => parsed.theta = Some(value(flag, args.next())?),
                "--phi" => parsed.phi = Some(value(flag, args.next())?),
                "--speed" => parsed.speed_of_sound = Some(value(flag, args.next())?),
                "--sample-rate" => parsed.sample_rate = Some(value(flag, args.next())?),
                "--block-size" => parsed.block_size = Some(value(flag, args.next())?),
                "--gain" => parsed.gain = Some(value(flag, args.next())?),
                "--duration" => parsed.duration = Some(value(flag, args.next())?),
                "--monitor" => parsed.monitor = true,
                "--input-device" => parsed.input_device = Some(value(flag, args.next())?),
                "--output-device" => parsed.output_device = Some(value(flag, args.next())?),
                "--frequency" => parsed.frequency = Some(value(flag, args.next())?),
                "--from" => parsed.from = Some(value(flag, args.next())?),
                "--to" => parsed.to = Some(value(flag, args.next())?),
                "--step" => parsed.step = Some(value(flag, args.next())?),
                "--resolution" => parsed.resolution = Some(value(flag, args.next())?),
                "--quantize" => parsed.quantize = true,
                "--order" => {
                    let name: String = value(flag, args.next())?;
                    parsed.order = ChannelOrder::parse(&name)?;
                }
                "--out" => parsed.out_dir = Some(value(flag, args.next())?),
                _ if flag.starts_with("--") && flag != "--help" => {
                    bail!("Unknown option '{}'", flag)
                }
                _ if parsed.command.is_none() => parsed.command = Some(Command::parse(flag)?),
                _ => parsed.inputs.push(PathBuf::from(flag)),
            }
        }

        Ok(parsed)
    }

    /// Apply the session overrides given on the command line
    pub fn apply_to(&self, config: &mut SessionConfig) {
        if let Some(mic_count) = self.mic_count {
            config.mic_count = mic_count;
            // A resized array without an explicit map reads channels in order
            if config.channel_map.len() != mic_count {
                config.channel_map = (0..mic_count).collect();
                config.input_channels = config.input_channels.max(mic_count);
            }
        }
        if let Some(radius) = self.radius {
            config.radius = radius;
        }
        config.steering = SteeringDirection::new(
            self.theta.unwrap_or(config.steering.theta),
            self.phi.unwrap_or(config.steering.phi),
        );
        if let Some(c) = self.speed_of_sound {
            config.speed_of_sound = c;
        }
        if let Some(fs) = self.sample_rate {
            config.sample_rate = fs;
        }
        if let Some(block_size) = self.block_size {
            config.block_size = block_size;
        }
        if let Some(gain) = self.gain {
            config.gain = gain;
        }
        if let Some(duration) = self.duration {
            config.duration_secs = duration;
        }
        if self.monitor {
            config.audio.monitor = true;
        }
        if let Some(name) = &self.input_device {
            config.audio.input_device = Some(DeviceId::new(name.as_str()));
        }
        if let Some(name) = &self.output_device {
            config.audio.output_device = Some(DeviceId::new(name.as_str()));
            config.audio.monitor = true;
        }
        if let Some(dir) = &self.out_dir {
            config.recordings_dir = dir.clone();
        }
    }

    /// Frequencies of a surface sweep, `from..=to` in `step` increments
    pub fn sweep_frequencies(&self) -> Result<Vec<f64>> {
        let from = self.from.unwrap_or(100.0);
        let to = self.to.unwrap_or(8000.0);
        let step = self.step.unwrap_or(100.0);
        if !(step > 0.0) || !(to >= from) {
            bail!("Invalid frequency range {}..{} step {}", from, to, step);
        }
        let intervals = ((to - from) / step).floor();
        if !(intervals < MAX_SWEEP_POINTS as f64) {
            bail!(
                "Frequency range {}..{} step {} exceeds {} points",
                from,
                to,
                step,
                MAX_SWEEP_POINTS
            );
        }
        let count = intervals as usize + 1;
        Ok((0..count).map(|i| from + i as f64 * step).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args> {
        Args::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_command_options_and_inputs() {
        let args = parse(&[
            "process",
            "--order",
            "measurement",
            "krok_000.wav",
            "--out",
            "processed",
            "krok_002.wav",
        ])
        .unwrap();

        assert_eq!(args.command, Some(Command::Process));
        assert_eq!(args.order, ChannelOrder::Measurement);
        assert_eq!(args.out_dir, Some(PathBuf::from("processed")));
        assert_eq!(
            args.inputs,
            vec![PathBuf::from("krok_000.wav"), PathBuf::from("krok_002.wav")]
        );
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&["fly"]).is_err());
        assert!(parse(&["pattern", "--frequency"]).is_err());
        assert!(parse(&["pattern", "--frequency", "loud"]).is_err());
        assert!(parse(&["pattern", "--verbose"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = parse(&["pattern", "--mics", "4", "--phi", "45", "--gain", "2"]).unwrap();
        let mut config = SessionConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.mic_count, 4);
        assert_eq!(config.channel_map, vec![0, 1, 2, 3]);
        assert_eq!(config.steering, SteeringDirection::new(90.0, 45.0));
        assert_eq!(config.gain, 2.0);
        assert!(config.stream_settings().is_ok());
    }

    #[test]
    fn test_sweep_frequencies() {
        let args = parse(&["surface", "--from", "1000", "--to", "2000", "--step", "250"]).unwrap();
        assert_eq!(
            args.sweep_frequencies().unwrap(),
            vec![1000.0, 1250.0, 1500.0, 1750.0, 2000.0]
        );

        let bad = parse(&["surface", "--step", "0"]).unwrap();
        assert!(bad.sweep_frequencies().is_err());
    }

    #[test]
    fn test_sweep_point_count_is_bounded() {
        let huge = parse(&["surface", "--from", "0", "--to", "1e12", "--step", "1e-6"]).unwrap();
        assert!(huge.sweep_frequencies().is_err());

        let unbounded = parse(&["surface", "--to", "inf"]).unwrap();
        assert!(unbounded.sweep_frequencies().is_err());

        // 0..=999999 is exactly the limit
        let edge = parse(&["surface", "--from", "0", "--to", "999999", "--step", "1"]).unwrap();
        assert_eq!(edge.sweep_frequencies().unwrap().len(), MAX_SWEEP_POINTS);
    }

    #[test]
    fn test_device_options() {
        let args = parse(&["stream", "--input-device", "hw:2,0", "--output-device", "pulse"]).unwrap();
        let mut config = SessionConfig::default();
        args.apply_to(&mut config);

        assert_eq!(config.audio.input_device, Some(DeviceId::new("hw:2,0")));
        assert_eq!(config.audio.output_device, Some(DeviceId::new("pulse")));
        assert!(config.audio.monitor);
    }
}
