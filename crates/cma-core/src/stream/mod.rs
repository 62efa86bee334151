//! Real-time delay-and-sum processing
//!
//! The stream processor turns fixed-size multichannel blocks from the array
//! into a steered mono signal. The host calls [`StreamProcessor::process_block`]
//! synchronously, once per block period (`block_size / sample_rate`), and never
//! re-entrantly; the call must return before the next block arrives.
//!
//! Per block:
//!
//! 1. Reorder physical input channels into array order ([`ChannelMap`])
//! 2. Delay every channel by its compensation ([`DelayLine`])
//! 3. Average the delayed channels, times a static gain
//! 4. Store each channel's reordered *pre-delay* block as history
//! 5. Duplicate the mono mix into the stereo output
//! 6. Append raw and mixed audio to the session [`Recordings`]
//!
//! Any failure poisons the processor: the session is over and every later
//! call returns [`BeamformError::SessionAborted`].

mod assembler;
mod channel_map;

pub use assembler::BlockAssembler;
pub use channel_map::{ChannelMap, MEASUREMENT_CHANNEL_ORDER, REALTIME_CHANNEL_ORDER};

use std::time::Duration;

use crate::delay_line::DelayLine;
use crate::error::{BeamformError, CapacityError, DomainError, Result};
use crate::geometry::{compute_delays, ArrayGeometry, SteeringDirection};
use crate::quantize::{quantize_to_samples, SampleDelays};
use crate::recording::Recordings;
use crate::types::{AudioBlock, Sample, StereoBuffer, StereoSample};

/// Everything the processor needs, validated once at session start
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub geometry: ArrayGeometry,
    pub steering: SteeringDirection,
    pub speed_of_sound: f64,
    pub sample_rate: u32,
    pub block_size: usize,
    pub channel_map: ChannelMap,
    pub gain: Sample,
}

impl StreamSettings {
    /// Time budget of one callback
    pub fn block_period(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate as f64)
    }
}

/// Delay-and-sum session state: one delay line per microphone plus recordings
pub struct StreamProcessor {
    channel_map: ChannelMap,
    sample_delays: SampleDelays,
    gain: Sample,
    block_size: usize,
    delay_lines: Vec<DelayLine>,
    /// Pre-allocated working buffers (no allocation in the callback)
    reordered: AudioBlock,
    delayed: Vec<Sample>,
    /// Channel sum in f64, so a constant input averages back to itself exactly
    sum: Vec<f64>,
    mono: Vec<Sample>,
    recordings: Recordings,
    blocks_processed: u64,
    aborted: bool,
}

impl StreamProcessor {
    pub fn new(settings: &StreamSettings) -> Result<Self> {
        let mic_count = settings.geometry.mic_count();
        if settings.block_size == 0 {
            return Err(DomainError::BlockSize.into());
        }
        if settings.channel_map.mic_count() != mic_count {
            return Err(DomainError::ChannelMap {
                map: settings.channel_map.as_slice().to_vec(),
                mic_count,
                input_channels: settings.channel_map.input_channels(),
            }
            .into());
        }

        let delays = compute_delays(&settings.geometry, settings.steering, settings.speed_of_sound)?;
        let sample_delays = quantize_to_samples(&delays, settings.sample_rate as f64)?;

        // One block of history is all a delay line has; reject the steering
        // here instead of failing on the first callback
        if sample_delays.max() > settings.block_size {
            return Err(CapacityError {
                delay_samples: sample_delays.max(),
                block_size: settings.block_size,
            }
            .into());
        }

        let delay_lines = sample_delays
            .iter()
            .map(|&d| DelayLine::new(settings.block_size, d))
            .collect::<Result<Vec<_>>>()?;

        log::info!(
            "DSB processor: {} mics, r={}m, steering theta={} phi={}, {} frames/block ({:.1}ms)",
            mic_count,
            settings.geometry.radius(),
            settings.steering.theta,
            settings.steering.phi,
            settings.block_size,
            settings.block_period().as_secs_f64() * 1000.0
        );
        log::debug!("Sample delays: {:?}", sample_delays.as_slice());

        Ok(Self {
            channel_map: settings.channel_map.clone(),
            sample_delays,
            gain: settings.gain,
            block_size: settings.block_size,
            delay_lines,
            reordered: AudioBlock::silence(mic_count, settings.block_size),
            delayed: vec![0.0; settings.block_size],
            sum: vec![0.0; settings.block_size],
            mono: vec![0.0; settings.block_size],
            recordings: Recordings::new(mic_count),
            blocks_processed: 0,
            aborted: false,
        })
    }

    /// Reserve recording space for `frames` frames up front
    pub fn reserve_recording(&mut self, frames: usize) {
        let mic_count = self.channel_map.mic_count();
        if self.recordings.is_empty() {
            self.recordings = Recordings::with_capacity(mic_count, frames);
        }
    }

    #[inline]
    pub fn sample_delays(&self) -> &SampleDelays {
        &self.sample_delays
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Width of the input blocks expected by [`StreamProcessor::process_block`]
    #[inline]
    pub fn input_channels(&self) -> usize {
        self.channel_map.input_channels()
    }

    #[inline]
    pub fn blocks_processed(&self) -> u64 {
        self.blocks_processed
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    #[inline]
    pub fn recordings(&self) -> &Recordings {
        &self.recordings
    }

    /// Hand the recordings over, leaving empty ones behind
    pub fn take_recordings(&mut self) -> Recordings {
        std::mem::replace(&mut self.recordings, Recordings::new(self.channel_map.mic_count()))
    }

    /// Process one block of physical input into the stereo `output`
    ///
    /// `input` must be `input_channels × block_size`, `output` exactly
    /// `block_size` frames long.
    pub fn process_block(&mut self, input: &AudioBlock, output: &mut StereoBuffer) -> Result<()> {
        if self.aborted {
            return Err(BeamformError::SessionAborted);
        }
        let result = self.process_block_inner(input, output);
        if let Err(ref e) = result {
            log::error!(
                "DSB processing failed after {} blocks, aborting session: {}",
                self.blocks_processed,
                e
            );
            self.aborted = true;
        }
        result
    }

    fn process_block_inner(&mut self, input: &AudioBlock, output: &mut StereoBuffer) -> Result<()> {
        let input_channels = self.channel_map.input_channels();
        if input.channels() != input_channels {
            return Err(BeamformError::shape("input channels", input_channels, input.channels()));
        }
        if input.frames() != self.block_size {
            return Err(BeamformError::shape("input frames", self.block_size, input.frames()));
        }
        if output.len() != self.block_size {
            return Err(BeamformError::shape("output frames", self.block_size, output.len()));
        }

        // 1. Reorder
        for logical in 0..self.channel_map.mic_count() {
            let physical = self.channel_map.physical(logical);
            self.reordered
                .channel_mut(logical)
                .copy_from_slice(input.channel(physical));
        }

        // 2-3. Delay and sum
        self.sum.fill(0.0);
        for (logical, line) in self.delay_lines.iter().enumerate() {
            line.delay_into(self.reordered.channel(logical), &mut self.delayed)?;
            for (acc, &s) in self.sum.iter_mut().zip(&self.delayed) {
                *acc += s as f64;
            }
        }
        let mic_count = self.delay_lines.len() as f64;
        let gain = self.gain as f64;
        for (out, &acc) in self.mono.iter_mut().zip(&self.sum) {
            *out = (acc / mic_count * gain) as Sample;
        }

        // 4. History keeps the undelayed samples
        for (logical, line) in self.delay_lines.iter_mut().enumerate() {
            line.remember(self.reordered.channel(logical))?;
        }

        // 5. Mono to both output channels
        for (frame, &s) in output.as_mut_slice().iter_mut().zip(&self.mono) {
            *frame = StereoSample::mono(s);
        }

        // 6. Keep both streams for later persistence
        self.recordings.append(&self.reordered, &self.mono);

        self.blocks_processed += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(mic_count: usize, block_size: usize, phi: f64) -> StreamSettings {
        StreamSettings {
            geometry: ArrayGeometry::new(mic_count, 0.05).unwrap(),
            steering: SteeringDirection::new(90.0, phi),
            speed_of_sound: 343.0,
            sample_rate: 48000,
            block_size,
            channel_map: ChannelMap::identity(mic_count),
            gain: 1.0,
        }
    }

    #[test]
    fn test_constant_input_mixes_to_same_constant() {
        let mut s = settings(8, 64, 0.0);
        s.channel_map = ChannelMap::new(REALTIME_CHANNEL_ORDER.to_vec(), 8, 8).unwrap();

        for v in [0.75, 0.1, 0.3, 0.7, 1.0 / 3.0, 0.12345679, -0.9] {
            let mut processor = StreamProcessor::new(&s).unwrap();
            let input = AudioBlock::from_channels(&vec![vec![v; 64]; 8]);
            let mut output = StereoBuffer::silence(64);

            // The first block still pulls silence from the history
            processor.process_block(&input, &mut output).unwrap();
            processor.process_block(&input, &mut output).unwrap();

            for frame in output.iter() {
                assert_eq!(frame.left, v, "v = {}", v);
                assert_eq!(frame.right, v, "v = {}", v);
            }
        }
    }

    #[test]
    fn test_constant_mix_is_exact_for_any_mic_count() {
        for mic_count in [3, 5, 6, 7] {
            let mut s = settings(mic_count, 16, 0.0);
            s.geometry = ArrayGeometry::new(mic_count, 0.0).unwrap();
            let mut processor = StreamProcessor::new(&s).unwrap();

            let v: Sample = 0.1;
            let input = AudioBlock::from_channels(&vec![vec![v; 16]; mic_count]);
            let mut output = StereoBuffer::silence(16);
            processor.process_block(&input, &mut output).unwrap();
            assert!(output.iter().all(|f| f.left == v), "{} mics", mic_count);
        }
    }

    #[test]
    fn test_steered_impulses_align() {
        // Emulate a plane wave from the steering direction: microphone i
        // hears the impulse early by its compensation delay, so after
        // compensation all channels line up at the same frame.
        let block_size = 32;
        let mut processor = StreamProcessor::new(&settings(8, block_size, 0.0)).unwrap();
        let delays = processor.sample_delays().clone();
        let max_delay = delays.max();
        assert_eq!(max_delay, 14);

        let arrival = 20;
        let channels: Vec<Vec<Sample>> = delays
            .iter()
            .map(|&d| {
                let mut ch = vec![0.0; block_size];
                ch[arrival - d] = 1.0;
                ch
            })
            .collect();
        let input = AudioBlock::from_channels(&channels);
        let mut output = StereoBuffer::silence(block_size);
        processor.process_block(&input, &mut output).unwrap();

        assert_eq!(output[arrival].left, 1.0);
        let energy: f32 = output.iter().map(|f| f.left.abs()).sum();
        assert_eq!(energy, 1.0);
    }

    #[test]
    fn test_reorders_physical_channels() {
        // Zero radius leaves every delay at 0: output is the average of the
        // logical channels, recordings carry the reordered input
        let mut s = settings(2, 4, 0.0);
        s.geometry = ArrayGeometry::new(2, 0.0).unwrap();
        s.channel_map = ChannelMap::new(vec![2, 0], 2, 3).unwrap();
        let mut processor = StreamProcessor::new(&s).unwrap();

        let input = AudioBlock::from_channels(&[
            vec![1.0, 1.0, 1.0, 1.0],
            vec![9.0, 9.0, 9.0, 9.0],
            vec![3.0, 3.0, 3.0, 3.0],
        ]);
        let mut output = StereoBuffer::silence(4);
        processor.process_block(&input, &mut output).unwrap();

        assert_eq!(output[0].left, 2.0);
        let recordings = processor.recordings();
        assert_eq!(recordings.raw_channel(0), vec![3.0; 4]);
        assert_eq!(recordings.raw_channel(1), vec![1.0; 4]);
        assert_eq!(recordings.mixed(), &[2.0; 4]);
    }

    #[test]
    fn test_history_holds_pre_delay_samples() {
        let block_size = 16;
        let mut processor = StreamProcessor::new(&settings(8, block_size, 0.0)).unwrap();
        let delays = processor.sample_delays().clone();

        let first: Vec<Vec<Sample>> = (0..8)
            .map(|ch| (0..block_size).map(|i| (ch * 100 + i) as Sample).collect())
            .collect();
        let second = vec![vec![0.0; block_size]; 8];
        let mut output = StereoBuffer::silence(block_size);
        processor
            .process_block(&AudioBlock::from_channels(&first), &mut output)
            .unwrap();
        processor
            .process_block(&AudioBlock::from_channels(&second), &mut output)
            .unwrap();

        // Second output frame j sums the tail of the first block for every
        // channel whose delay reaches back that far
        for j in 0..block_size {
            let expected: f32 = delays
                .iter()
                .enumerate()
                .filter(|&(_, &d)| j < d)
                .map(|(ch, &d)| first[ch][block_size - d + j])
                .sum::<f32>()
                / 8.0;
            assert!((output[j].left - expected).abs() < 1e-4, "frame {}", j);
        }
    }

    #[test]
    fn test_gain_scales_output() {
        let mut s = settings(4, 8, 0.0);
        s.geometry = ArrayGeometry::new(4, 0.0).unwrap();
        s.gain = 2.0;
        let mut processor = StreamProcessor::new(&s).unwrap();

        let input = AudioBlock::from_channels(&vec![vec![0.25; 8]; 4]);
        let mut output = StereoBuffer::silence(8);
        processor.process_block(&input, &mut output).unwrap();
        assert_eq!(output[7], StereoSample::mono(0.5));
    }

    #[test]
    fn test_rejects_steering_beyond_block_capacity() {
        // 14 samples of spread cannot fit into 8-frame blocks
        let err = StreamProcessor::new(&settings(8, 8, 0.0)).err().unwrap();
        assert_eq!(
            err,
            BeamformError::Capacity(CapacityError {
                delay_samples: 14,
                block_size: 8
            })
        );
    }

    #[test]
    fn test_rejects_mismatched_channel_map() {
        let mut s = settings(8, 64, 0.0);
        s.channel_map = ChannelMap::identity(4);
        assert!(matches!(
            StreamProcessor::new(&s),
            Err(BeamformError::Domain(DomainError::ChannelMap { .. }))
        ));
    }

    #[test]
    fn test_failure_aborts_session() {
        let mut processor = StreamProcessor::new(&settings(8, 32, 0.0)).unwrap();
        let mut output = StereoBuffer::silence(32);

        let wrong = AudioBlock::silence(8, 16);
        assert!(matches!(
            processor.process_block(&wrong, &mut output),
            Err(BeamformError::Shape { .. })
        ));
        assert!(processor.is_aborted());

        let right = AudioBlock::silence(8, 32);
        assert_eq!(
            processor.process_block(&right, &mut output),
            Err(BeamformError::SessionAborted)
        );
        assert_eq!(processor.blocks_processed(), 0);
    }

    #[test]
    fn test_recordings_grow_per_block() {
        let mut processor = StreamProcessor::new(&settings(8, 32, 0.0)).unwrap();
        processor.reserve_recording(96);
        let input = AudioBlock::silence(8, 32);
        let mut output = StereoBuffer::silence(32);
        for _ in 0..3 {
            processor.process_block(&input, &mut output).unwrap();
        }
        assert_eq!(processor.blocks_processed(), 3);

        let recordings = processor.take_recordings();
        assert_eq!(recordings.frames(), 96);
        assert_eq!(recordings.raw_interleaved().len(), 96 * 8);
        assert!(processor.recordings().is_empty());
    }

    #[test]
    fn test_block_period() {
        let s = settings(8, 4800, 0.0);
        assert!((s.block_period().as_secs_f64() - 0.1).abs() < 1e-9);
    }
}
