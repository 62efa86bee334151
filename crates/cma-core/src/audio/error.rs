//! Audio host error types

use thiserror::Error;

use crate::error::BeamformError;
use crate::recording::Recordings;

/// Errors that can occur during audio operations
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio devices available
    #[error("No audio devices found")]
    NoDevices,

    /// Failed to get default device
    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    /// Device not found
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Failed to get device configuration
    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// The capture device cannot deliver the channels the array needs
    #[error("Device {device} offers at most {available} input channels, {requested} required")]
    ChannelCount {
        device: String,
        requested: usize,
        available: u16,
    },

    /// Delays are quantized for one rate, so there is no fallback
    #[error("Device {device} does not support {requested} Hz")]
    SampleRate { device: String, requested: u32 },

    /// Failed to build audio stream
    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    /// Failed to start/play stream
    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// Processing failed inside the capture callback
    ///
    /// Carries everything recorded before the failure.
    #[error("Session aborted after {} frames: {}", .recordings.frames(), .error)]
    SessionAborted {
        #[source]
        error: BeamformError,
        recordings: Recordings,
    },

    /// The processor could not be set up
    #[error(transparent)]
    Processing(#[from] BeamformError),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
