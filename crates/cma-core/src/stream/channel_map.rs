//! Physical-to-logical channel routing
//!
//! The audio interface does not deliver microphones in array order. A channel
//! map lists, for every logical microphone index `0..M`, the physical input
//! channel wired to it.

use crate::error::{DomainError, Result};

/// Wiring of the 8-mic MEMS board as seen by the live capture path
pub const REALTIME_CHANNEL_ORDER: [usize; 8] = [4, 0, 5, 1, 6, 2, 7, 3];

/// Wiring of the 8-mic board in the turntable measurement recordings
pub const MEASUREMENT_CHANNEL_ORDER: [usize; 8] = [3, 4, 6, 0, 2, 5, 7, 1];

/// Validated mapping from logical microphone index to physical input channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMap {
    physical: Vec<usize>,
    input_channels: usize,
}

impl ChannelMap {
    /// Validate `map` against the array size and the number of input channels
    ///
    /// `map` must have exactly `mic_count` entries, all distinct and below
    /// `input_channels`.
    pub fn new(map: Vec<usize>, mic_count: usize, input_channels: usize) -> Result<Self> {
        let mut seen = vec![false; input_channels];
        let valid = map.len() == mic_count
            && map.iter().all(|&p| {
                p < input_channels && !std::mem::replace(&mut seen[p], true)
            });

        if !valid {
            return Err(DomainError::ChannelMap {
                map,
                mic_count,
                input_channels,
            }
            .into());
        }
        Ok(Self {
            physical: map,
            input_channels,
        })
    }

    /// Logical index `i` reads physical channel `i`
    pub fn identity(mic_count: usize) -> Self {
        Self {
            physical: (0..mic_count).collect(),
            input_channels: mic_count,
        }
    }

    /// Physical input channel feeding logical microphone `logical`
    #[inline]
    pub fn physical(&self, logical: usize) -> usize {
        self.physical[logical]
    }

    #[inline]
    pub fn mic_count(&self) -> usize {
        self.physical.len()
    }

    /// Width of the input blocks this map reads from
    #[inline]
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.physical
    }
}
