//! Block-domain delay line
//!
//! Delays one channel of a block-based stream by a whole number of samples.
//! Each channel keeps exactly one block of history: the previous block's
//! samples *before* delay. Delaying block `k` by `d` samples then yields
//!
//! ```text
//! [history[-d:], current[:-d]]
//! ```
//!
//! which is the continuous stream shifted later by `d` samples, without a
//! discontinuity at the block boundary. Because only one block of history is
//! kept, `d` may not exceed the block size; larger delays are rejected with a
//! [`CapacityError`] instead of silently producing a short block.

use crate::error::{BeamformError, CapacityError, Result};
use crate::types::Sample;

/// Delay `current` by `delay_samples` using `history`, writing into `output`
///
/// Real-time safe: never allocates. `history`, `current` and `output` must all
/// have the block length. With a zero delay `current` is copied unchanged and
/// `history` is not read.
pub fn delay_into(
    history: &[Sample],
    current: &[Sample],
    delay_samples: usize,
    output: &mut [Sample],
) -> Result<()> {
    let block_size = current.len();
    if output.len() != block_size {
        return Err(BeamformError::shape("delay output", block_size, output.len()));
    }
    if delay_samples == 0 {
        output.copy_from_slice(current);
        return Ok(());
    }
    if delay_samples > block_size {
        return Err(CapacityError {
            delay_samples,
            block_size,
        }
        .into());
    }
    if history.len() != block_size {
        return Err(BeamformError::shape("delay history", block_size, history.len()));
    }

    let (head, tail) = output.split_at_mut(delay_samples);
    head.copy_from_slice(&history[block_size - delay_samples..]);
    tail.copy_from_slice(&current[..block_size - delay_samples]);
    Ok(())
}

/// Allocating variant of [`delay_into`], for offline use and tests
pub fn apply_delay(history: &[Sample], current: &[Sample], delay_samples: usize) -> Result<Vec<Sample>> {
    let mut output = vec![0.0; current.len()];
    delay_into(history, current, delay_samples, &mut output)?;
    Ok(output)
}

/// Delay state of one channel
///
/// Owned exclusively by the stream processor. The history starts as silence
/// and is replaced wholesale after every block with that block's pre-delay
/// samples (see [`DelayLine::remember`]).
#[derive(Debug, Clone)]
pub struct DelayLine {
    history: Vec<Sample>,
    delay_samples: usize,
}

impl DelayLine {
    /// Create a delay line for blocks of `block_size` samples
    pub fn new(block_size: usize, delay_samples: usize) -> Result<Self> {
        if delay_samples > block_size {
            return Err(CapacityError {
                delay_samples,
                block_size,
            }
            .into());
        }
        Ok(Self {
            history: vec![0.0; block_size],
            delay_samples,
        })
    }

    #[inline]
    pub fn delay_samples(&self) -> usize {
        self.delay_samples
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.history.len()
    }

    #[inline]
    pub fn history(&self) -> &[Sample] {
        &self.history
    }

    /// Delay `current` into `output` against the stored history
    ///
    /// Does not touch the history; call [`DelayLine::remember`] once the block
    /// has been consumed.
    #[inline]
    pub fn delay_into(&self, current: &[Sample], output: &mut [Sample]) -> Result<()> {
        if current.len() != self.history.len() {
            return Err(BeamformError::shape("delay input", self.history.len(), current.len()));
        }
        delay_into(&self.history, current, self.delay_samples, output)
    }

    /// Replace the history with the undelayed samples of the block just seen
    #[inline]
    pub fn remember(&mut self, block: &[Sample]) -> Result<()> {
        if block.len() != self.history.len() {
            return Err(BeamformError::shape("delay history", self.history.len(), block.len()));
        }
        self.history.copy_from_slice(block);
        Ok(())
    }

    /// Back to silence
    pub fn reset(&mut self) {
        self.history.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(start: usize, len: usize) -> Vec<Sample> {
        (start..start + len).map(|i| i as Sample).collect()
    }

    #[test]
    fn test_zero_delay_is_identity() {
        let current = ramp(1, 6);
        // History is not consulted, even if it has the wrong length
        assert_eq!(apply_delay(&[], &current, 0).unwrap(), current);
        assert_eq!(apply_delay(&[9.0; 6], &current, 0).unwrap(), current);
    }

    #[test]
    fn test_delay_pulls_in_history() {
        let history = ramp(0, 4);
        let current = ramp(4, 4);
        assert_eq!(
            apply_delay(&history, &current, 1).unwrap(),
            vec![3.0, 4.0, 5.0, 6.0]
        );
        assert_eq!(
            apply_delay(&history, &current, 3).unwrap(),
            vec![1.0, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_full_block_delay_returns_history() {
        let history = ramp(0, 4);
        let current = ramp(4, 4);
        assert_eq!(apply_delay(&history, &current, 4).unwrap(), history);
    }

    #[test]
    fn test_delay_beyond_block_is_capacity_error() {
        let err = apply_delay(&[0.0; 4], &[1.0; 4], 5).unwrap_err();
        assert_eq!(
            err,
            BeamformError::Capacity(CapacityError {
                delay_samples: 5,
                block_size: 4
            })
        );
        assert!(DelayLine::new(4, 5).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        assert!(matches!(
            apply_delay(&[0.0; 3], &[1.0; 4], 2),
            Err(BeamformError::Shape { .. })
        ));
    }

    #[test]
    fn test_two_block_continuity() {
        let block_size = 8;
        let a = ramp(100, block_size);
        let b = ramp(200, block_size);

        for d in 1..=block_size {
            let mut line = DelayLine::new(block_size, d).unwrap();
            let mut out = vec![0.0; block_size];

            line.delay_into(&a, &mut out).unwrap();
            // First block pulls silence from the initial history
            assert!(out[..d].iter().all(|&s| s == 0.0));
            assert_eq!(&out[d..], &a[..block_size - d]);
            line.remember(&a).unwrap();

            line.delay_into(&b, &mut out).unwrap();
            let mut expected = a[block_size - d..].to_vec();
            expected.extend_from_slice(&b[..block_size - d]);
            assert_eq!(out, expected, "d={}", d);
        }
    }

    #[test]
    fn test_continuous_stream_is_shifted() {
        let block_size = 5;
        let delay = 3;
        let input = ramp(1, block_size * 4);
        let mut line = DelayLine::new(block_size, delay).unwrap();

        let mut output = Vec::new();
        let mut out = vec![0.0; block_size];
        for block in input.chunks(block_size) {
            line.delay_into(block, &mut out).unwrap();
            line.remember(block).unwrap();
            output.extend_from_slice(&out);
        }

        let mut expected = vec![0.0; delay];
        expected.extend_from_slice(&input[..input.len() - delay]);
        assert_eq!(output, expected);
    }

    #[test]
    fn test_reset_restores_silence() {
        let mut line = DelayLine::new(4, 2).unwrap();
        line.remember(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        line.reset();
        assert_eq!(line.history(), &[0.0; 4]);
    }
}
