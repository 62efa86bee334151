//! Session configuration
//!
//! Everything needed to run the array: geometry, steering, the propagation
//! medium, sampling, routing and the capture devices. Stored as YAML; every
//! field has a default matching the 8-mic, 5 cm MEMS board at 48 kHz.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::default_recordings_path;
use crate::audio::AudioConfig;
use crate::error::Result;
use crate::geometry::{ArrayGeometry, SteeringDirection};
use crate::stream::{ChannelMap, StreamSettings, REALTIME_CHANNEL_ORDER};
use crate::types::{
    Sample, DEFAULT_BLOCK_SIZE, DEFAULT_MIC_COUNT, DEFAULT_RADIUS, DEFAULT_SAMPLE_RATE,
    DEFAULT_SPEED_OF_SOUND,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of microphones on the circle
    /// Default: 8
    pub mic_count: usize,

    /// Array radius in meters
    /// Default: 0.05
    pub radius: f64,

    /// Look direction in degrees
    /// Default: theta 90 (horizontal plane), phi 0 (towards mic 0)
    pub steering: SteeringDirection,

    /// Propagation speed in m/s
    /// Default: 343.0 (air at ~20 °C)
    pub speed_of_sound: f64,

    /// Sampling frequency in Hz
    /// Default: 48000
    pub sample_rate: u32,

    /// Processing block size in frames
    /// Bounds the largest usable delay. Default: 4800 (100 ms at 48 kHz)
    pub block_size: usize,

    /// Channels delivered by the capture device
    /// Default: 8
    pub input_channels: usize,

    /// Physical input channel of each logical microphone
    /// Default: wiring of the 8-mic board
    pub channel_map: Vec<usize>,

    /// Linear gain applied after averaging
    /// Default: 1.0
    pub gain: Sample,

    /// Length of a capture session in seconds
    /// Default: 3.0
    pub duration_secs: f64,

    /// Directory for session recordings
    /// Default: ~/cma-beamformer/recordings
    pub recordings_dir: PathBuf,

    /// Capture and monitor devices
    pub audio: AudioConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mic_count: DEFAULT_MIC_COUNT,
            radius: DEFAULT_RADIUS,
            steering: SteeringDirection::default(),
            speed_of_sound: DEFAULT_SPEED_OF_SOUND,
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
            input_channels: DEFAULT_MIC_COUNT,
            channel_map: REALTIME_CHANNEL_ORDER.to_vec(),
            gain: 1.0,
            duration_secs: 3.0,
            recordings_dir: default_recordings_path(),
            audio: AudioConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn geometry(&self) -> Result<ArrayGeometry> {
        ArrayGeometry::new(self.mic_count, self.radius)
    }

    pub fn channel_map(&self) -> Result<ChannelMap> {
        ChannelMap::new(self.channel_map.clone(), self.mic_count, self.input_channels)
    }

    /// Validate the array part of the config into processor settings
    pub fn stream_settings(&self) -> Result<StreamSettings> {
        Ok(StreamSettings {
            geometry: self.geometry()?,
            steering: self.steering,
            speed_of_sound: self.speed_of_sound,
            sample_rate: self.sample_rate,
            block_size: self.block_size,
            channel_map: self.channel_map()?,
            gain: self.gain,
        })
    }

    /// Session length, `None` if `duration_secs` is negative or not finite
    pub fn duration(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.duration_secs).ok()
    }
}
