//! Beampattern evaluation
//!
//! Computes the far-field array factor of a delay-and-sum beamformer aimed at
//! a fixed direction, sampled at `resolution` source azimuths uniformly spaced
//! over [0°, 360°):
//!
//! ```text
//! H(φ_s) = (1/M) Σ_i exp(j·ω·(τ_ref[i] − τ_s[i]))
//! ```
//!
//! `τ_ref` are the steering delays (optionally quantized to the sampling
//! grid), `τ_s` the true delays of a plane wave from `φ_s` at the same polar
//! angle. Index `k` of a response always corresponds to `k·360/resolution`
//! degrees; plotting code maps indices to angles positionally.
//!
//! # Example
//!
//! ```
//! use cma_core::beampattern::BeampatternEvaluator;
//! use cma_core::geometry::{ArrayGeometry, SteeringDirection};
//!
//! let geometry = ArrayGeometry::new(8, 0.05).unwrap();
//! let evaluator = BeampatternEvaluator::new(geometry, 343.0, 360).unwrap();
//! let response = evaluator.evaluate(SteeringDirection::horizontal(0.0), 2000.0).unwrap();
//! assert_eq!(response.magnitudes()[0], 1.0);
//! ```

use std::f64::consts::PI;

use num_complex::Complex64;
use rayon::prelude::*;

use crate::error::{DomainError, Result};
use crate::geometry::{compute_delays, ArrayGeometry, DelayVector, SteeringDirection};
use crate::quantize::quantize_to_grid;

/// Floor applied by [`decibels`]; also stands in for `log10(0)`
pub const MIN_DECIBELS: f64 = -100.0;

/// Convert a magnitude to decibels: `10·log10(magnitude / reference)`
///
/// Zero magnitudes (and anything quieter than [`MIN_DECIBELS`]) are clamped
/// to [`MIN_DECIBELS`] instead of producing `-inf`, so the output can be fed
/// straight to plotting code. A non-positive reference has no meaningful
/// level and maps to the floor as well.
pub fn decibels(magnitude: f64, reference: f64) -> f64 {
    let db = 10.0 * (magnitude / reference).log10();
    if !db.is_finite() || db < MIN_DECIBELS {
        MIN_DECIBELS
    } else {
        db
    }
}

/// Directional response of the array, one complex value per evaluation angle
#[derive(Debug, Clone, PartialEq)]
pub struct BeampatternResponse {
    values: Vec<Complex64>,
}

impl BeampatternResponse {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<Complex64> {
        self.values.get(index).copied()
    }

    /// Azimuth in degrees that index `k` corresponds to
    #[inline]
    pub fn angle_deg(&self, index: usize) -> f64 {
        evaluation_angle(index, self.values.len())
    }

    /// `|H|` per angle
    pub fn magnitudes(&self) -> Vec<f64> {
        self.values.iter().map(|h| h.norm()).collect()
    }

    /// `10·log10(|H| / reference)` per angle, clamped at [`MIN_DECIBELS`]
    pub fn to_decibels(&self, reference: f64) -> Vec<f64> {
        self.values
            .iter()
            .map(|h| decibels(h.norm(), reference))
            .collect()
    }

    /// Index of the strongest response (first one on ties)
    pub fn peak_index(&self) -> Option<usize> {
        self.values
            .iter()
            .map(|h| h.norm())
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, m)| match best {
                Some((_, best_m)) if best_m >= m => best,
                _ => Some((i, m)),
            })
            .map(|(i, _)| i)
    }
}

/// Responses for a list of frequencies, in the order the frequencies were given
#[derive(Debug, Clone, PartialEq)]
pub struct BeampatternSurface {
    pub frequencies: Vec<f64>,
    pub responses: Vec<BeampatternResponse>,
}

impl BeampatternSurface {
    /// One row of decibel values per frequency
    pub fn decibel_grid(&self, reference: f64) -> Vec<Vec<f64>> {
        self.responses
            .iter()
            .map(|r| r.to_decibels(reference))
            .collect()
    }
}

/// Evaluates beampatterns of one array in one medium
#[derive(Debug, Clone)]
pub struct BeampatternEvaluator {
    geometry: ArrayGeometry,
    speed_of_sound: f64,
    resolution: usize,
    /// When set, steering delays are snapped to this sampling grid
    sampling_frequency: Option<f64>,
}

impl BeampatternEvaluator {
    pub fn new(geometry: ArrayGeometry, speed_of_sound: f64, resolution: usize) -> Result<Self> {
        if resolution == 0 {
            return Err(DomainError::Resolution.into());
        }
        // Surface bad media up front rather than on first evaluation
        geometry.max_path_delay(speed_of_sound)?;
        Ok(Self {
            geometry,
            speed_of_sound,
            resolution,
            sampling_frequency: None,
        })
    }

    /// Quantize the steering delays to the grid of `sampling_frequency`
    ///
    /// The evaluation delays stay continuous: they model the physical
    /// wavefront, only the beamformer is limited to whole-sample shifts.
    pub fn with_quantization(mut self, sampling_frequency: f64) -> Result<Self> {
        crate::quantize::sampling_period(sampling_frequency)?;
        self.sampling_frequency = Some(sampling_frequency);
        Ok(self)
    }

    #[inline]
    pub fn resolution(&self) -> usize {
        self.resolution
    }

    #[inline]
    pub fn is_quantized(&self) -> bool {
        self.sampling_frequency.is_some()
    }

    /// Delays the array applies when aimed at `steering`
    pub fn steering_delays(&self, steering: SteeringDirection) -> Result<DelayVector> {
        let delays = compute_delays(&self.geometry, steering, self.speed_of_sound)?;
        match self.sampling_frequency {
            Some(fs) => quantize_to_grid(&delays, fs),
            None => Ok(delays),
        }
    }

    /// Evaluate the response at one frequency
    pub fn evaluate(
        &self,
        steering: SteeringDirection,
        frequency: f64,
    ) -> Result<BeampatternResponse> {
        let reference = self.steering_delays(steering)?;
        let table = self.evaluation_table(steering.theta)?;
        self.response_from_table(&reference, &table, frequency)
    }

    /// Evaluate the response at many frequencies in parallel
    pub fn sweep(
        &self,
        steering: SteeringDirection,
        frequencies: &[f64],
    ) -> Result<BeampatternSurface> {
        let reference = self.steering_delays(steering)?;
        // The wavefront delays depend only on geometry and angle, share them
        // across all frequencies
        let table = self.evaluation_table(steering.theta)?;

        let responses = frequencies
            .par_iter()
            .map(|&f| self.response_from_table(&reference, &table, f))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Beampattern sweep: {} frequencies x {} angles",
            frequencies.len(),
            self.resolution
        );

        Ok(BeampatternSurface {
            frequencies: frequencies.to_vec(),
            responses,
        })
    }

    /// True (unquantized) delay vectors for every evaluation azimuth
    fn evaluation_table(&self, theta: f64) -> Result<Vec<DelayVector>> {
        (0..self.resolution)
            .map(|k| {
                let direction = SteeringDirection::new(theta, evaluation_angle(k, self.resolution));
                compute_delays(&self.geometry, direction, self.speed_of_sound)
            })
            .collect()
    }

    fn response_from_table(
        &self,
        reference: &DelayVector,
        table: &[DelayVector],
        frequency: f64,
    ) -> Result<BeampatternResponse> {
        if !frequency.is_finite() {
            return Err(DomainError::Frequency(frequency).into());
        }
        let omega = 2.0 * PI * frequency;
        let m = self.geometry.mic_count() as f64;

        let values = table
            .iter()
            .map(|source| {
                let sum: Complex64 = reference
                    .iter()
                    .zip(source.iter())
                    .map(|(&t_ref, &t_s)| Complex64::from_polar(1.0, omega * (t_ref - t_s)))
                    .sum();
                sum / m
            })
            .collect();

        Ok(BeampatternResponse { values })
    }
}

#[inline]
fn evaluation_angle(index: usize, resolution: usize) -> f64 {
    index as f64 * 360.0 / resolution as f64
}
