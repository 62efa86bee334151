//! Delay quantization to the sampling grid
//!
//! A digital system can only shift a signal by whole samples. Two views of the
//! same quantization are provided, both with the quantum `q = 1 / fs`:
//!
//! - [`quantize_to_grid`] keeps delays in seconds, snapped to the nearest
//!   multiple of `q`. Used to inject quantization error into the
//!   frequency-domain beampattern model.
//! - [`quantize_to_samples`] returns integer sample counts. Used by the
//!   streaming and offline paths, where compensation is a buffer shift.
//!
//! Both round half away from zero (`f64::round`).

use crate::error::{DomainError, Result};
use crate::geometry::DelayVector;

/// Sampling period `1 / fs` in seconds
pub fn sampling_period(sampling_frequency: f64) -> Result<f64> {
    validate_sampling_frequency(sampling_frequency)?;
    Ok(1.0 / sampling_frequency)
}

/// Snap every delay to the nearest sampling instant, staying in seconds
pub fn quantize_to_grid(delays: &DelayVector, sampling_frequency: f64) -> Result<DelayVector> {
    let q = sampling_period(sampling_frequency)?;
    Ok(DelayVector::from_vec(
        delays.iter().map(|&d| (d / q).round() * q).collect(),
    ))
}

/// Convert every delay to the nearest whole number of samples
pub fn quantize_to_samples(delays: &DelayVector, sampling_frequency: f64) -> Result<SampleDelays> {
    validate_sampling_frequency(sampling_frequency)?;
    // Compensation delays are non-negative, so the cast never saturates at 0
    // for valid input.
    Ok(SampleDelays(
        delays
            .iter()
            .map(|&d| (d * sampling_frequency).round().max(0.0) as usize)
            .collect(),
    ))
}

/// Per-microphone delays as whole sample counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleDelays(Vec<usize>);

impl SampleDelays {
    pub fn from_vec(samples: Vec<usize>) -> Self {
        Self(samples)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<usize> {
        self.0.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.0.iter()
    }

    /// Largest sample delay (0 for an empty vector)
    pub fn max(&self) -> usize {
        self.0.iter().copied().max().unwrap_or(0)
    }

    /// Express the sample counts back in seconds
    pub fn to_seconds(&self, sampling_frequency: f64) -> Result<DelayVector> {
        validate_sampling_frequency(sampling_frequency)?;
        Ok(DelayVector::from_vec(
            self.0
                .iter()
                .map(|&n| n as f64 / sampling_frequency)
                .collect(),
        ))
    }
}

fn validate_sampling_frequency(sampling_frequency: f64) -> Result<()> {
    if !(sampling_frequency > 0.0) || !sampling_frequency.is_finite() {
        return Err(DomainError::SamplingFrequency(sampling_frequency).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{compute_delays, ArrayGeometry, SteeringDirection};

    const FS: f64 = 48000.0;

    #[test]
    fn test_rejects_non_positive_sampling_frequency() {
        let delays = DelayVector::from_vec(vec![0.0, 1e-4]);
        assert!(quantize_to_grid(&delays, 0.0).is_err());
        assert!(quantize_to_samples(&delays, -48000.0).is_err());
        assert!(sampling_period(f64::INFINITY).is_err());
    }

    #[test]
    fn test_quantize_to_samples_rounds_to_nearest() {
        let q = 1.0 / FS;
        let delays = DelayVector::from_vec(vec![0.0, 0.4 * q, 0.6 * q, 2.49 * q, 2.51 * q]);
        let samples = quantize_to_samples(&delays, FS).unwrap();
        assert_eq!(samples.as_slice(), &[0, 0, 1, 2, 3]);
    }

    #[test]
    fn test_ties_round_away_from_zero() {
        // 0.5 and 2.5 samples are exactly representable with fs = 2 Hz
        let delays = DelayVector::from_vec(vec![0.25, 1.25]);
        let samples = quantize_to_samples(&delays, 2.0).unwrap();
        assert_eq!(samples.as_slice(), &[1, 3]);
    }

    #[test]
    fn test_grid_matches_samples() {
        let geometry = ArrayGeometry::new(8, 0.05).unwrap();
        let delays = compute_delays(&geometry, SteeringDirection::new(90.0, 20.0), 343.0).unwrap();

        let grid = quantize_to_grid(&delays, FS).unwrap();
        let samples = quantize_to_samples(&delays, FS).unwrap();
        for (g, &n) in grid.iter().zip(samples.iter()) {
            assert!((g - n as f64 / FS).abs() < 1e-15);
        }
    }

    #[test]
    fn test_quantize_to_samples_is_idempotent() {
        let geometry = ArrayGeometry::new(8, 0.05).unwrap();
        for phi in [0.0, 20.0, 45.0, 90.0, 200.0] {
            let delays =
                compute_delays(&geometry, SteeringDirection::new(90.0, phi), 343.0).unwrap();
            let once = quantize_to_samples(&delays, FS).unwrap();
            let twice = quantize_to_samples(&once.to_seconds(FS).unwrap(), FS).unwrap();
            assert_eq!(once, twice);

            let grid_once = quantize_to_grid(&delays, FS).unwrap();
            let grid_twice = quantize_to_grid(&grid_once, FS).unwrap();
            assert_eq!(
                quantize_to_samples(&grid_once, FS).unwrap(),
                quantize_to_samples(&grid_twice, FS).unwrap()
            );
        }
    }

    #[test]
    fn test_realtime_array_delays() {
        // 8 mics, 5cm, steering at phi = 0: the farthest mic needs
        // 2r/c = 291.5us = 13.99 samples at 48kHz
        let geometry = ArrayGeometry::new(8, 0.05).unwrap();
        let delays = compute_delays(&geometry, SteeringDirection::new(90.0, 0.0), 343.0).unwrap();
        let samples = quantize_to_samples(&delays, FS).unwrap();

        assert_eq!(samples.len(), 8);
        assert_eq!(samples.get(0), Some(0));
        assert_eq!(samples.get(4), Some(14));
        assert_eq!(samples.get(2), Some(7));
        assert_eq!(samples.get(2), samples.get(6));
        assert_eq!(samples.max(), 14);
    }
}
