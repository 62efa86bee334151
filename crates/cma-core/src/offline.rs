//! Whole-recording delay-and-sum
//!
//! Offline counterpart of the stream processor for recordings that are
//! already complete (e.g. turntable measurements, one file per angle). With
//! the whole signal available there is no block limit: every channel is
//! padded with `d_i` leading zeros and `max(d) − d_i` trailing zeros, so the
//! mono output is `frames + max(d)` samples long and nothing is cut off.

use crate::error::{BeamformError, DomainError, Result};
use crate::geometry::{compute_delays, ArrayGeometry, SteeringDirection};
use crate::quantize::{quantize_to_samples, SampleDelays};
use crate::stream::ChannelMap;
use crate::types::{AudioBlock, Sample};

pub struct OfflineProcessor {
    channel_map: ChannelMap,
    sample_delays: SampleDelays,
    gain: Sample,
}

impl OfflineProcessor {
    pub fn new(
        geometry: &ArrayGeometry,
        steering: SteeringDirection,
        speed_of_sound: f64,
        sample_rate: u32,
        channel_map: ChannelMap,
        gain: Sample,
    ) -> Result<Self> {
        if channel_map.mic_count() != geometry.mic_count() {
            return Err(DomainError::ChannelMap {
                map: channel_map.as_slice().to_vec(),
                mic_count: geometry.mic_count(),
                input_channels: channel_map.input_channels(),
            }
            .into());
        }
        let delays = compute_delays(geometry, steering, speed_of_sound)?;
        let sample_delays = quantize_to_samples(&delays, sample_rate as f64)?;
        Ok(Self {
            channel_map,
            sample_delays,
            gain,
        })
    }

    #[inline]
    pub fn sample_delays(&self) -> &SampleDelays {
        &self.sample_delays
    }

    /// Steer a complete recording (physical channel order) into mono
    pub fn process(&self, recording: &AudioBlock) -> Result<Vec<Sample>> {
        let input_channels = self.channel_map.input_channels();
        if recording.channels() != input_channels {
            return Err(BeamformError::shape(
                "recording channels",
                input_channels,
                recording.channels(),
            ));
        }

        let frames = recording.frames();
        // Summed in f64 so a constant input averages back to itself exactly
        let mut sum = vec![0.0f64; frames + self.sample_delays.max()];
        for (logical, &delay) in self.sample_delays.iter().enumerate() {
            let channel = recording.channel(self.channel_map.physical(logical));
            for (acc, &s) in sum[delay..delay + frames].iter_mut().zip(channel) {
                *acc += s as f64;
            }
        }

        let mic_count = self.sample_delays.len() as f64;
        let gain = self.gain as f64;
        Ok(sum
            .into_iter()
            .map(|acc| (acc / mic_count * gain) as Sample)
            .collect())
    }
}
