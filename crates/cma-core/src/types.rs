//! Common types for the CMA beamformer
//!
//! This module contains the fundamental audio types shared by the streaming
//! path, the offline processor and the audio host: sample type, stereo frames
//! for the output side and planar multichannel blocks for the input side.

use std::ops::{Index, IndexMut};

/// Default sample rate of the MEMS microphone array (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default speed of sound in air at room temperature (m/s)
pub const DEFAULT_SPEED_OF_SOUND: f64 = 343.0;

/// Default number of microphones on the circular array
pub const DEFAULT_MIC_COUNT: usize = 8;

/// Default array radius in meters
pub const DEFAULT_RADIUS: f64 = 0.05;

/// Default block size for the streaming path (frames per callback)
/// 4800 frames @ 48kHz = 100ms, comfortably larger than the 2r/c spread
/// of a 5cm array (~14 samples)
pub const DEFAULT_BLOCK_SIZE: usize = 4800;

/// Audio sample type (32-bit float, same as the device streams)
pub type Sample = f32;

/// A single stereo frame (left and right channels)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }
}

/// A buffer of stereo frames
///
/// The steered mono signal leaves the stream processor in this form, with
/// both channels carrying the same value.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// A fixed-shape multichannel block of samples
///
/// Stored planar (channel-major): channel `c` occupies
/// `samples[c * frames..(c + 1) * frames]`. Device buffers arrive interleaved
/// and are converted with [`AudioBlock::from_interleaved`] or through the
/// block assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    channels: usize,
    frames: usize,
    samples: Vec<Sample>,
}

impl AudioBlock {
    /// Create a silent block of the given shape
    pub fn silence(channels: usize, frames: usize) -> Self {
        Self {
            channels,
            frames,
            samples: vec![0.0; channels * frames],
        }
    }

    /// Build a block from per-channel vectors (all must have equal length)
    pub fn from_channels(channels: &[Vec<Sample>]) -> Self {
        let frames = channels.first().map_or(0, Vec::len);
        assert!(
            channels.iter().all(|c| c.len() == frames),
            "Channel lengths must match"
        );
        Self {
            channels: channels.len(),
            frames,
            samples: channels.concat(),
        }
    }

    /// Build a block from interleaved frames [c0, c1, ..., cN, c0, c1, ...]
    pub fn from_interleaved(interleaved: &[Sample], channels: usize) -> Self {
        assert!(channels > 0, "Block must have at least one channel");
        assert!(
            interleaved.len() % channels == 0,
            "Interleaved buffer length must be a multiple of the channel count"
        );
        let frames = interleaved.len() / channels;
        let mut block = Self::silence(channels, frames);
        for (frame_idx, frame) in interleaved.chunks_exact(channels).enumerate() {
            for (ch, &sample) in frame.iter().enumerate() {
                block.samples[ch * frames + frame_idx] = sample;
            }
        }
        block
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.samples[index * self.frames..(index + 1) * self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.samples[index * self.frames..(index + 1) * self.frames]
    }

    /// Copy the block out as interleaved frames
    pub fn write_interleaved(&self, output: &mut Vec<Sample>) {
        output.reserve(self.samples.len());
        for frame in 0..self.frames {
            for ch in 0..self.channels {
                output.push(self.samples[ch * self.frames + frame]);
            }
        }
    }
}
