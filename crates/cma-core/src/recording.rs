//! Session recordings and WAV persistence
//!
//! A streaming session keeps two growing recordings: the reordered raw
//! M-channel input and the steered mono mix. Once the session ends they are
//! written as 32-bit float WAV files (hound crate), next to each other, with a
//! shared timestamped stem.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::{AudioBlock, Sample};

/// Errors that can occur while reading or writing recordings
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("WAV error in {path:?}: {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    #[error("Failed to create recording directory {path:?}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported WAV format in {path:?}: {bits} bit {format:?}")]
    UnsupportedFormat {
        path: PathBuf,
        bits: u16,
        format: hound::SampleFormat,
    },
}

/// Result type for recording operations
pub type RecordingResult<T> = Result<T, RecordingError>;

/// Raw and mixed recordings of one streaming session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recordings {
    channels: usize,
    /// Interleaved reordered input, `channels` samples per frame
    raw: Vec<Sample>,
    /// Steered mono output
    mixed: Vec<Sample>,
}

impl Recordings {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            raw: Vec::new(),
            mixed: Vec::new(),
        }
    }

    /// Pre-allocate room for `frames` frames so appends don't reallocate
    pub fn with_capacity(channels: usize, frames: usize) -> Self {
        Self {
            channels,
            raw: Vec::with_capacity(channels * frames),
            mixed: Vec::with_capacity(frames),
        }
    }

    /// Append one processed block: the reordered raw input and its mono mix
    pub fn append(&mut self, raw: &AudioBlock, mixed: &[Sample]) {
        debug_assert_eq!(raw.channels(), self.channels);
        debug_assert_eq!(raw.frames(), mixed.len());
        raw.write_interleaved(&mut self.raw);
        self.mixed.extend_from_slice(mixed);
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of recorded frames
    #[inline]
    pub fn frames(&self) -> usize {
        self.mixed.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mixed.is_empty()
    }

    #[inline]
    pub fn raw_interleaved(&self) -> &[Sample] {
        &self.raw
    }

    #[inline]
    pub fn mixed(&self) -> &[Sample] {
        &self.mixed
    }

    /// Copy one raw channel out of the interleaved recording
    pub fn raw_channel(&self, channel: usize) -> Vec<Sample> {
        self.raw
            .iter()
            .skip(channel)
            .step_by(self.channels.max(1))
            .copied()
            .collect()
    }
}

/// Paths of the files written by [`write_recordings`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingPaths {
    pub raw: PathBuf,
    pub mixed: PathBuf,
}

/// File stem for a new recording, e.g. `session_2024-03-01_14-05-33`
pub fn timestamped_stem(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Local::now().format("%Y-%m-%d_%H-%M-%S"))
}

/// Write both recordings of a session into `dir`
///
/// Produces `<stem>_raw_<M>ch.wav` and `<stem>_dsb.wav`.
pub fn write_recordings(
    recordings: &Recordings,
    dir: &Path,
    sample_rate: u32,
    stem: &str,
) -> RecordingResult<RecordingPaths> {
    std::fs::create_dir_all(dir).map_err(|source| RecordingError::Directory {
        path: dir.to_path_buf(),
        source,
    })?;

    let paths = RecordingPaths {
        raw: dir.join(format!("{}_raw_{}ch.wav", stem, recordings.channels())),
        mixed: dir.join(format!("{}_dsb.wav", stem)),
    };

    write_wav(
        &paths.raw,
        recordings.raw_interleaved(),
        recordings.channels() as u16,
        sample_rate,
    )?;
    write_wav(&paths.mixed, recordings.mixed(), 1, sample_rate)?;

    log::info!(
        "Saved {} frames ({:.1}s) to {:?} and {:?}",
        recordings.frames(),
        recordings.frames() as f64 / sample_rate as f64,
        paths.raw,
        paths.mixed
    );
    Ok(paths)
}

/// Write a mono signal as a 32-bit float WAV
pub fn write_mono_wav(path: &Path, samples: &[Sample], sample_rate: u32) -> RecordingResult<()> {
    write_wav(path, samples, 1, sample_rate)
}

/// Write interleaved samples as a 32-bit float WAV
pub fn write_wav(
    path: &Path,
    interleaved: &[Sample],
    channels: u16,
    sample_rate: u32,
) -> RecordingResult<()> {
    let wav_err = |source| RecordingError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in interleaved {
        writer.write_sample(sample).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;
    Ok(())
}

/// A multichannel WAV file decoded to planar f32
#[derive(Debug, Clone)]
pub struct WavData {
    pub sample_rate: u32,
    pub block: AudioBlock,
}

/// Read a WAV file into planar channels
///
/// Float files are read as-is; integer files are scaled to [-1, 1).
pub fn read_wav(path: &Path) -> RecordingResult<WavData> {
    let wav_err = |source| RecordingError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = hound::WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();

    let interleaved: Vec<Sample> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(wav_err)?,
        (hound::SampleFormat::Int, bits @ 8..=32) => {
            let scale = 1.0 / (1u64 << (bits - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(wav_err)?
        }
        (format, bits) => {
            return Err(RecordingError::UnsupportedFormat {
                path: path.to_path_buf(),
                bits,
                format,
            })
        }
    };

    log::debug!(
        "Read {:?}: {} channels, {} Hz, {} samples",
        path,
        spec.channels,
        spec.sample_rate,
        interleaved.len()
    );

    Ok(WavData {
        sample_rate: spec.sample_rate,
        block: AudioBlock::from_interleaved(&interleaved, spec.channels as usize),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_split_channels() {
        let mut recordings = Recordings::with_capacity(2, 4);
        let block = AudioBlock::from_channels(&[vec![1.0, 2.0], vec![10.0, 20.0]]);
        recordings.append(&block, &[5.5, 11.0]);
        recordings.append(&block, &[5.5, 11.0]);

        assert_eq!(recordings.frames(), 4);
        assert_eq!(recordings.raw_interleaved(), &[1.0, 10.0, 2.0, 20.0, 1.0, 10.0, 2.0, 20.0]);
        assert_eq!(recordings.raw_channel(1), vec![10.0, 20.0, 10.0, 20.0]);
        assert_eq!(recordings.mixed(), &[5.5, 11.0, 5.5, 11.0]);
    }

    #[test]
    fn test_write_and_read_back_recordings() {
        let dir = tempfile::tempdir().unwrap();
        let mut recordings = Recordings::new(3);
        let block = AudioBlock::from_channels(&[
            vec![0.1, 0.2, 0.3],
            vec![-0.1, -0.2, -0.3],
            vec![0.5, 0.0, -0.5],
        ]);
        recordings.append(&block, &[0.25, 0.0, -0.25]);

        let paths = write_recordings(&recordings, dir.path(), 48000, "test").unwrap();
        assert!(paths.raw.ends_with("test_raw_3ch.wav"));
        assert!(paths.mixed.ends_with("test_dsb.wav"));

        let raw = read_wav(&paths.raw).unwrap();
        assert_eq!(raw.sample_rate, 48000);
        assert_eq!(raw.block, block);

        let mixed = read_wav(&paths.mixed).unwrap();
        assert_eq!(mixed.block.channels(), 1);
        assert_eq!(mixed.block.channel(0), &[0.25, 0.0, -0.25]);
    }

    #[test]
    fn test_read_int16_wav_is_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for v in [0i16, 16384, -32768] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let data = read_wav(&path).unwrap();
        assert_eq!(data.block.channel(0), &[0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_timestamped_stem_prefix() {
        assert!(timestamped_stem("session").starts_with("session_"));
    }
}
