//! CMA Core - Delay-and-sum beamforming for uniform circular microphone arrays
//!
//! The theory side computes steering delays, quantizes them to the sampling
//! grid and evaluates beampatterns. The streaming side applies the same delays
//! block by block to live multichannel input and records the result.

pub mod audio;
pub mod beampattern;
pub mod config;
pub mod delay_line;
pub mod error;
pub mod geometry;
pub mod measurement;
pub mod offline;
pub mod quantize;
pub mod recording;
pub mod stream;
pub mod types;

pub use beampattern::{decibels, BeampatternEvaluator, BeampatternResponse, MIN_DECIBELS};
pub use error::{BeamformError, CapacityError, DomainError, Result};
pub use geometry::{compute_delays, ArrayGeometry, DelayVector, SteeringDirection};
pub use quantize::{quantize_to_grid, quantize_to_samples, SampleDelays};
pub use stream::{ChannelMap, StreamProcessor, StreamSettings};
pub use types::*;
