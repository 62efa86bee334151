//! Beamforming error types

use thiserror::Error;

/// Invalid configuration of the array, the medium or the sampling grid
///
/// These are caller mistakes and are never recovered from at runtime.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Microphone count must be at least 1, got {0}")]
    MicrophoneCount(usize),

    #[error("Array radius must be a finite non-negative number of meters, got {0}")]
    Radius(f64),

    #[error("Speed of sound must be positive, got {0} m/s")]
    SpeedOfSound(f64),

    #[error("Sampling frequency must be positive, got {0} Hz")]
    SamplingFrequency(f64),

    #[error("Beampattern resolution must be at least 1 point")]
    Resolution,

    #[error("Frequency must be finite, got {0} Hz")]
    Frequency(f64),

    #[error("Block size must be at least 1 frame")]
    BlockSize,

    #[error("Channel map {map:?} must list {mic_count} distinct input channels below {input_channels}")]
    ChannelMap {
        map: Vec<usize>,
        mic_count: usize,
        input_channels: usize,
    },

    #[error("Frequency {frequency} Hz lies above Nyquist for {sample_rate} Hz")]
    AboveNyquist { frequency: f64, sample_rate: f64 },

    #[error("Cannot analyse an empty signal")]
    EmptySignal,
}

/// A delay exceeds the one block of history a delay line keeps
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Delay of {delay_samples} samples exceeds the block size of {block_size} samples")]
pub struct CapacityError {
    pub delay_samples: usize,
    pub block_size: usize,
}

/// Errors raised by the beamforming core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BeamformError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Capacity(#[from] CapacityError),

    /// A buffer does not have the shape the processor was configured for
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    Shape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// An earlier block failed; the session cannot continue
    #[error("Streaming session aborted by an earlier failure")]
    SessionAborted,
}

impl BeamformError {
    pub(crate) fn shape(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::Shape {
            what,
            expected,
            actual,
        }
    }
}

/// Result type for beamforming operations
pub type Result<T> = std::result::Result<T, BeamformError>;
