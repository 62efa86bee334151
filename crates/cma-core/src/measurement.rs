//! Measured beampatterns from turntable recordings
//!
//! A measurement is a series of processed mono recordings of a test tone, one
//! per rotation step of the array. Each recording contributes the level of a
//! single FFT bin; the series is then normalized so the loudest direction
//! reads 0 dB, which makes it directly comparable with a theoretical
//! [`BeampatternResponse`](crate::beampattern::BeampatternResponse) in decibels.

use realfft::RealFftPlanner;

use crate::beampattern::MIN_DECIBELS;
use crate::error::{DomainError, Result};
use crate::types::Sample;

/// Subtract the mean from every sample
pub fn remove_dc_offset(samples: &mut [Sample]) {
    if samples.is_empty() {
        return;
    }
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / samples.len() as f64;
    for s in samples.iter_mut() {
        *s -= mean as Sample;
    }
}

/// FFT bin holding `frequency` for a signal of `len` samples
fn frequency_bin(len: usize, sample_rate: f64, frequency: f64) -> Result<usize> {
    if !(sample_rate > 0.0) || !sample_rate.is_finite() {
        return Err(DomainError::SamplingFrequency(sample_rate).into());
    }
    if !(frequency >= 0.0) || !frequency.is_finite() {
        return Err(DomainError::Frequency(frequency).into());
    }
    let bin = (len as f64 * frequency / sample_rate).floor() as usize;
    if bin > len / 2 {
        return Err(DomainError::AboveNyquist {
            frequency,
            sample_rate,
        }
        .into());
    }
    Ok(bin)
}

/// Level of one frequency in a recording, in dB (20·log10 of the raw FFT
/// magnitude)
///
/// The DC offset is removed first. The bin is `floor(N · frequency / fs)`.
pub fn single_frequency_magnitude_db(
    samples: &[Sample],
    sample_rate: f64,
    frequency: f64,
) -> Result<f64> {
    let mut planner = RealFftPlanner::<f32>::new();
    magnitude_db_with_planner(&mut planner, samples, sample_rate, frequency)
}

fn magnitude_db_with_planner(
    planner: &mut RealFftPlanner<f32>,
    samples: &[Sample],
    sample_rate: f64,
    frequency: f64,
) -> Result<f64> {
    if samples.is_empty() {
        return Err(DomainError::EmptySignal.into());
    }
    let bin = frequency_bin(samples.len(), sample_rate, frequency)?;

    let fft = planner.plan_fft_forward(samples.len());
    let mut input = samples.to_vec();
    remove_dc_offset(&mut input);
    let mut spectrum = fft.make_output_vec();
    let mut scratch = fft.make_scratch_vec();
    // Lengths come from the plan itself, so this cannot fail
    if fft
        .process_with_scratch(&mut input, &mut spectrum, &mut scratch)
        .is_err()
    {
        return Err(DomainError::EmptySignal.into());
    }

    let magnitude = spectrum[bin].norm() as f64;
    if magnitude <= 0.0 {
        return Ok(MIN_DECIBELS);
    }
    Ok((20.0 * magnitude.log10()).max(MIN_DECIBELS))
}

/// Shift a series of levels so that its maximum sits at 0 dB
pub fn normalize_to_peak(values: &mut [f64]) {
    let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return;
    }
    for v in values.iter_mut() {
        *v -= peak;
    }
}

/// Beampattern of a turntable measurement at one frequency
///
/// `recordings` are ordered by rotation angle: recording `k` is the array
/// turned by `k · 360 / recordings.len()` degrees.
pub fn measured_beampattern<S: AsRef<[Sample]>>(
    recordings: &[S],
    sample_rate: f64,
    frequency: f64,
) -> Result<Vec<f64>> {
    let mut planner = RealFftPlanner::<f32>::new();
    let mut levels = recordings
        .iter()
        .map(|r| magnitude_db_with_planner(&mut planner, r.as_ref(), sample_rate, frequency))
        .collect::<Result<Vec<_>>>()?;
    normalize_to_peak(&mut levels);

    log::debug!(
        "Measured beampattern at {} Hz over {} positions",
        frequency,
        levels.len()
    );
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BeamformError;

    fn sine(len: usize, sample_rate: f64, frequency: f64, amplitude: f32, offset: f32) -> Vec<Sample> {
        (0..len)
            .map(|n| {
                let t = n as f64 / sample_rate;
                offset + amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
            })
            .collect()
    }

    #[test]
    fn test_remove_dc_offset() {
        let mut samples = vec![1.0, 2.0, 3.0, 6.0];
        remove_dc_offset(&mut samples);
        assert_eq!(samples, vec![-2.0, -1.0, 0.0, 3.0]);
    }

    #[test]
    fn test_bin_exact_tone_level() {
        // 1 kHz at 48 kHz over 480 samples lands exactly on bin 10;
        // a unit sine has |X| = N/2 there
        let signal = sine(480, 48000.0, 1000.0, 1.0, 0.3);
        let level = single_frequency_magnitude_db(&signal, 48000.0, 1000.0).unwrap();
        let expected = 20.0 * 240.0f64.log10();
        assert!((level - expected).abs() < 1e-3, "level {}", level);
    }

    #[test]
    fn test_bin_is_floored() {
        // 1050 Hz floors to bin 10 as well
        let signal = sine(480, 48000.0, 1000.0, 1.0, 0.0);
        let exact = single_frequency_magnitude_db(&signal, 48000.0, 1000.0).unwrap();
        let floored = single_frequency_magnitude_db(&signal, 48000.0, 1050.0).unwrap();
        assert_eq!(exact, floored);
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert_eq!(
            single_frequency_magnitude_db(&[], 48000.0, 1000.0),
            Err(BeamformError::Domain(DomainError::EmptySignal))
        );
        assert!(matches!(
            single_frequency_magnitude_db(&[0.0; 64], 48000.0, 30000.0),
            Err(BeamformError::Domain(DomainError::AboveNyquist { .. }))
        ));
        assert!(single_frequency_magnitude_db(&[0.0; 64], 0.0, 1000.0).is_err());
    }

    #[test]
    fn test_silence_clamps_to_floor() {
        let level = single_frequency_magnitude_db(&[0.25; 64], 48000.0, 3000.0).unwrap();
        assert_eq!(level, MIN_DECIBELS);
    }

    #[test]
    fn test_normalize_to_peak() {
        let mut values = vec![40.0, 46.0, 43.0];
        normalize_to_peak(&mut values);
        assert_eq!(values, vec![-6.0, 0.0, -3.0]);

        let mut negative = vec![-12.0, -3.0];
        normalize_to_peak(&mut negative);
        assert_eq!(negative, vec![-9.0, 0.0]);
    }

    #[test]
    fn test_measured_beampattern_peaks_at_loudest_position() {
        let recordings: Vec<Vec<Sample>> = [0.1, 1.0, 0.5, 0.1]
            .iter()
            .map(|&a| sine(480, 48000.0, 2000.0, a, 0.0))
            .collect();
        let pattern = measured_beampattern(&recordings, 48000.0, 2000.0).unwrap();

        assert_eq!(pattern.len(), 4);
        assert!(pattern[1].abs() < 1e-9);
        assert!((pattern[0] + 20.0).abs() < 1e-3);
        assert!((pattern[2] - 20.0 * 0.5f64.log10()).abs() < 1e-3);
    }
}
