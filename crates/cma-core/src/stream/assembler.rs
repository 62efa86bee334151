//! Regrouping of device buffers into fixed-size blocks
//!
//! Audio hosts deliver callbacks of whatever size the driver negotiated, but
//! the delay lines need every block to be exactly `block_size` frames long.
//! The assembler collects interleaved frames into a pre-allocated planar
//! block and hands it out each time it fills up. Leftover frames carry over to
//! the next call.

use crate::error::{BeamformError, Result};
use crate::types::{AudioBlock, Sample};

pub struct BlockAssembler {
    block: AudioBlock,
    filled: usize,
}

impl BlockAssembler {
    pub fn new(channels: usize, block_size: usize) -> Self {
        Self {
            block: AudioBlock::silence(channels, block_size),
            filled: 0,
        }
    }

    /// Frames collected towards the next block
    #[inline]
    pub fn pending_frames(&self) -> usize {
        self.filled
    }

    /// Feed interleaved frames; `on_block` runs once per completed block
    ///
    /// The first error returned by `on_block` stops consumption and is passed
    /// through. Frames after the failing block are discarded.
    pub fn push_interleaved<F>(&mut self, interleaved: &[Sample], mut on_block: F) -> Result<()>
    where
        F: FnMut(&AudioBlock) -> Result<()>,
    {
        let channels = self.block.channels();
        if interleaved.len() % channels != 0 {
            return Err(BeamformError::shape(
                "interleaved input",
                channels,
                interleaved.len() % channels,
            ));
        }

        let block_size = self.block.frames();
        for frame in interleaved.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                self.block.channel_mut(ch)[self.filled] = sample;
            }
            self.filled += 1;

            if self.filled == block_size {
                self.filled = 0;
                on_block(&self.block)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interleaved_ramp(frames: std::ops::Range<usize>, channels: usize) -> Vec<Sample> {
        frames
            .flat_map(|f| (0..channels).map(move |c| (f * 10 + c) as Sample))
            .collect()
    }

    #[test]
    fn test_regroups_uneven_buffers() {
        let mut assembler = BlockAssembler::new(2, 4);
        let mut blocks = Vec::new();

        // 3 + 3 + 2 frames => two blocks of 4
        for range in [0..3, 3..6, 6..8] {
            assembler
                .push_interleaved(&interleaved_ramp(range, 2), |block| {
                    blocks.push(block.clone());
                    Ok(())
                })
                .unwrap();
        }

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].channel(0), &[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(blocks[0].channel(1), &[1.0, 11.0, 21.0, 31.0]);
        assert_eq!(blocks[1].channel(0), &[40.0, 50.0, 60.0, 70.0]);
        assert_eq!(assembler.pending_frames(), 0);
    }

    #[test]
    fn test_large_buffer_yields_several_blocks() {
        let mut assembler = BlockAssembler::new(1, 2);
        let mut count = 0;
        assembler
            .push_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0], |_| {
                count += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(assembler.pending_frames(), 1);
    }

    #[test]
    fn test_rejects_partial_frames() {
        let mut assembler = BlockAssembler::new(3, 4);
        let result = assembler.push_interleaved(&[0.0; 4], |_| Ok(()));
        assert!(matches!(result, Err(BeamformError::Shape { .. })));
    }

    #[test]
    fn test_callback_error_stops_consumption() {
        let mut assembler = BlockAssembler::new(1, 1);
        let mut calls = 0;
        let result = assembler.push_interleaved(&[1.0, 2.0, 3.0], |_| {
            calls += 1;
            Err(BeamformError::SessionAborted)
        });
        assert_eq!(result, Err(BeamformError::SessionAborted));
        assert_eq!(calls, 1);
    }
}
