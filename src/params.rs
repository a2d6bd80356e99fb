//! Physical and discretisation parameters of a run

use serde::Serialize;

use crate::PendulumError;

/// Step count used when the requested one is missing or unusable.
pub const DEFAULT_STEPS: usize = 100_000;

/// Largest accepted step count. Samples are buffered in memory, so the bound
/// keeps a run below a few gigabytes.
pub const MAX_STEPS: usize = 50_000_000;

/// Parameters fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationParameters {
    /// Gravitational acceleration [m/s^2]
    pub gravity: f64,
    /// Length of each arm [m]
    pub arm_length: f64,
    /// Total simulated time [s]
    pub duration: f64,
    /// Number of fixed steps
    pub steps: usize,
}

impl SimulationParameters {
    /// Validated constructor.
    pub fn new(gravity: f64, arm_length: f64, duration: f64, steps: usize) -> Result<Self, PendulumError> {
        let params = Self {
            gravity,
            arm_length,
            duration,
            steps,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), PendulumError> {
        if !self.gravity.is_finite() {
            return Err(PendulumError::InvalidParameters(format!(
                "gravity must be finite, got {}",
                self.gravity
            )));
        }
        if !self.arm_length.is_finite() || self.arm_length <= 0.0 {
            return Err(PendulumError::InvalidParameters(format!(
                "arm length must be finite and > 0, got {}",
                self.arm_length
            )));
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err(PendulumError::InvalidParameters(format!(
                "duration must be finite and > 0, got {}",
                self.duration
            )));
        }
        if self.steps == 0 {
            return Err(PendulumError::InvalidParameters(
                "step count must be at least 1".to_string(),
            ));
        }
        if self.steps > MAX_STEPS {
            return Err(PendulumError::InvalidParameters(format!(
                "step count must be at most {MAX_STEPS}, got {}",
                self.steps
            )));
        }
        Ok(())
    }

    /// Fixed time step `duration / steps` [s]
    pub fn dt(&self) -> f64 {
        self.duration / self.steps as f64
    }
}

/// Interpret a user-entered step count.
///
/// Any decimal or exponent form is read (`1e3` is 1000) and a fractional
/// count is rounded up, since the loop still runs a final partial step.
/// Anything unparsable, non-positive or not finite falls back to
/// [`DEFAULT_STEPS`]. The upper bound is left to
/// [`SimulationParameters::validate`].
pub fn lenient_step_count(raw: &str) -> usize {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => v.ceil() as usize,
        _ => {
            log::warn!("step count '{raw}' is not usable, falling back to {DEFAULT_STEPS}");
            DEFAULT_STEPS
        }
    }
}
