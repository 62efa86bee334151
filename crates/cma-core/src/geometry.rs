//! Circular array geometry and far-field propagation delays
//!
//! Microphones sit equally spaced on a circle in the xy-plane, microphone `i`
//! at azimuth `2π·i/M`. A far-field source is described by its polar angle
//! `theta` (from the array normal, the z axis) and azimuth `phi`, both in
//! degrees.
//!
//! The delay vector is *compensation*, not raw propagation time: every entry
//! is `t_max - t_i`, so all delays are non-negative and the microphone with
//! the largest `t_i` needs no further delay. Compensation works the same way
//! as global latency alignment, where every path is delayed up to the slowest
//! one.

use std::f64::consts::PI;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, Result};

/// Uniform circular microphone array
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrayGeometry {
    mic_count: usize,
    radius: f64,
}

impl ArrayGeometry {
    /// Create a geometry, rejecting `mic_count < 1` and negative radii
    ///
    /// A zero radius is accepted: every microphone sits at the origin and all
    /// delays collapse to zero.
    pub fn new(mic_count: usize, radius: f64) -> Result<Self> {
        if mic_count < 1 {
            return Err(DomainError::MicrophoneCount(mic_count).into());
        }
        if !radius.is_finite() || radius < 0.0 {
            return Err(DomainError::Radius(radius).into());
        }
        Ok(Self { mic_count, radius })
    }

    #[inline]
    pub fn mic_count(&self) -> usize {
        self.mic_count
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Azimuth of microphone `index` on the circle, in radians
    #[inline]
    pub fn mic_angle(&self, index: usize) -> f64 {
        2.0 * PI * (index as f64 / self.mic_count as f64)
    }

    /// Cartesian position of microphone `index` in meters
    pub fn mic_position(&self, index: usize) -> [f64; 3] {
        let angle = self.mic_angle(index);
        [self.radius * angle.cos(), self.radius * angle.sin(), 0.0]
    }

    /// Upper bound on the spread of any delay vector: the array diameter
    /// divided by the speed of sound
    pub fn max_path_delay(&self, speed_of_sound: f64) -> Result<f64> {
        validate_speed_of_sound(speed_of_sound)?;
        Ok(2.0 * self.radius / speed_of_sound)
    }
}

/// Direction of a far-field source, or of an evaluation query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringDirection {
    /// Polar angle from the array normal in degrees, [0, 180]
    pub theta: f64,
    /// Azimuth in degrees, taken mod 360 by the trigonometry
    pub phi: f64,
}

impl SteeringDirection {
    pub fn new(theta: f64, phi: f64) -> Self {
        Self { theta, phi }
    }

    /// A direction in the array plane (`theta = 90°`)
    pub fn horizontal(phi: f64) -> Self {
        Self { theta: 90.0, phi }
    }

    /// Unit vector `(sinθ·cosφ, sinθ·sinφ, cosθ)`
    pub fn unit_vector(&self) -> [f64; 3] {
        let theta = self.theta.to_radians();
        let phi = self.phi.to_radians();
        [theta.sin() * phi.cos(), theta.sin() * phi.sin(), theta.cos()]
    }
}

impl Default for SteeringDirection {
    fn default() -> Self {
        Self::horizontal(0.0)
    }
}

/// Per-microphone compensation delays in seconds, index-aligned to microphones
#[derive(Debug, Clone, PartialEq)]
pub struct DelayVector(Vec<f64>);

impl DelayVector {
    pub fn from_vec(delays: Vec<f64>) -> Self {
        Self(delays)
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
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    /// Largest delay (0.0 for an empty vector)
    pub fn max(&self) -> f64 {
        self.0.iter().copied().fold(0.0, f64::max)
    }

    /// Smallest delay (0.0 for an empty vector)
    pub fn min(&self) -> f64 {
        self.0.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }
}

impl Index<usize> for DelayVector {
    type Output = f64;

    #[inline]
    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

/// Compute compensation delays for a plane wave arriving from `direction`
pub fn compute_delays(
    geometry: &ArrayGeometry,
    direction: SteeringDirection,
    speed_of_sound: f64,
) -> Result<DelayVector> {
    validate_speed_of_sound(speed_of_sound)?;

    let k_hat = direction.unit_vector();
    let raw: Vec<f64> = (0..geometry.mic_count())
        .map(|i| {
            let r = geometry.mic_position(i);
            (k_hat[0] * r[0] + k_hat[1] * r[1] + k_hat[2] * r[2]) / speed_of_sound
        })
        .collect();

    let t_max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Ok(DelayVector(raw.into_iter().map(|t| t_max - t).collect()))
}

fn validate_speed_of_sound(speed_of_sound: f64) -> Result<()> {
    if !(speed_of_sound > 0.0) || !speed_of_sound.is_finite() {
        return Err(DomainError::SpeedOfSound(speed_of_sound).into());
    }
    Ok(())
}
