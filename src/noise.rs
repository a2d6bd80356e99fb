//! Base-excitation noise model
//!
//! The suspension point is displaced by a superposition of exponentially
//! decaying sinusoids. Each component contributes
//! `A * exp(-t/tau) * sin(omega*t + phi)` to the base displacement.

use std::f64::consts::PI;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::PendulumError;

/// Why a single component was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ComponentError {
    #[error("tau must be finite and > 0, got {0}")]
    Tau(f64),
    #[error("angular frequency must be finite, got {0}")]
    Omega(f64),
    #[error("phase must be finite, got {0}")]
    Phase(f64),
    #[error("amplitude must be finite, got {0}")]
    Amplitude(f64),
}

/// One damped sinusoid of the base noise.
///
/// Fields are private so a component cannot change once it has been
/// validated; read them through the accessors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NoiseComponent {
    tau: f64,
    omega: f64,
    phi: f64,
    amplitude: f64,
}

impl NoiseComponent {
    /// Build a component from an angular frequency in rad/s.
    pub fn new(tau: f64, omega: f64, phi: f64, amplitude: f64) -> Result<Self, ComponentError> {
        if !tau.is_finite() || tau <= 0.0 {
            return Err(ComponentError::Tau(tau));
        }
        if !omega.is_finite() {
            return Err(ComponentError::Omega(omega));
        }
        if !phi.is_finite() {
            return Err(ComponentError::Phase(phi));
        }
        if !amplitude.is_finite() {
            return Err(ComponentError::Amplitude(amplitude));
        }
        Ok(Self {
            tau,
            omega,
            phi,
            amplitude,
        })
    }

    /// Build a component from a frequency in hertz (`omega = 2*pi*f`).
    pub fn from_hertz(tau: f64, frequency_hz: f64, phi: f64, amplitude: f64) -> Result<Self, ComponentError> {
        Self::new(tau, 2.0 * PI * frequency_hz, phi, amplitude)
    }

    /// Decay time constant [s]
    pub fn tau(&self) -> f64 {
        self.tau
    }

    /// Angular frequency [rad/s]
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Phase [rad]
    pub fn phi(&self) -> f64 {
        self.phi
    }

    /// Amplitude [m]
    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn displacement(&self, t: f64) -> f64 {
        self.amplitude * (-t / self.tau).exp() * (self.omega * t + self.phi).sin()
    }

    /// Sign-inverted second time derivative of [`Self::displacement`].
    pub fn acceleration(&self, t: f64) -> f64 {
        let arg = self.omega * t + self.phi;
        let inv_tau = 1.0 / self.tau;
        self.amplitude
            * (-t * inv_tau).exp()
            * ((self.omega * self.omega - inv_tau * inv_tau) * arg.sin()
                + 2.0 * self.omega * inv_tau * arg.cos())
    }

    /// Base velocity at t = 0 with the decay term dropped.
    fn undamped_initial_velocity(&self) -> f64 {
        self.omega * self.amplitude * self.phi.cos()
    }
}

/// Ordered, immutable collection of noise components.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NoiseModel {
    components: Vec<NoiseComponent>,
}

impl NoiseModel {
    pub fn new(components: Vec<NoiseComponent>) -> Self {
        Self { components }
    }

    /// Model with no components: the pendulum is undriven.
    pub fn quiet() -> Self {
        Self::default()
    }

    pub fn components(&self) -> &[NoiseComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Aggregate base displacement [m] at time `t`.
    pub fn displacement(&self, t: f64) -> f64 {
        self.components.iter().map(|c| c.displacement(t)).sum()
    }

    /// Aggregate base forcing [m/s^2] at time `t`.
    ///
    /// This is `-d²x/dt²` of [`Self::displacement`], the inertial acceleration
    /// felt by the arms in the frame of the moving pivot.
    pub fn acceleration(&self, t: f64) -> f64 {
        self.components.iter().map(|c| c.acceleration(t)).sum()
    }

    /// Initial angular velocity of the upper arm that cancels the base
    /// velocity at t = 0: `sum(-omega*A*cos(phi)) / l`.
    pub fn seeded_angular_velocity(&self, arm_length: f64) -> f64 {
        self.components
            .iter()
            .map(|c| -c.undamped_initial_velocity() / arm_length)
            .sum()
    }
}

/// Raw component row as it appears in a form or a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub tau: f64,
    pub frequency_hz: f64,
    #[serde(default)]
    pub phase: f64,
    pub amplitude: f64,
}

impl ComponentSpec {
    pub fn new(tau: f64, frequency_hz: f64, phase: f64, amplitude: f64) -> Self {
        Self {
            tau,
            frequency_hz,
            phase,
            amplitude,
        }
    }
}

/// Validate raw rows and build the model. Fails on the first bad row.
pub fn build_model(specs: &[ComponentSpec]) -> Result<NoiseModel, PendulumError> {
    let components = specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            NoiseComponent::from_hertz(spec.tau, spec.frequency_hz, spec.phase, spec.amplitude)
                .map_err(|source| PendulumError::InvalidComponent { index, source })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NoiseModel::new(components))
}

/// Parse the whitespace-delimited component format.
///
/// One component per line: `tau frequency_hz phase amplitude`. Blank lines
/// and lines starting with `#` are skipped.
pub fn parse_components(text: &str) -> Result<Vec<ComponentSpec>, PendulumError> {
    let mut specs = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 4 {
            return Err(PendulumError::Parse {
                line: idx + 1,
                reason: format!("expected 4 columns (tau freq phase amplitude), found {}", fields.len()),
            });
        }

        let mut values = [0.0_f64; 4];
        for (slot, field) in values.iter_mut().zip(&fields) {
            *slot = field.parse::<f64>().map_err(|_| PendulumError::Parse {
                line: idx + 1,
                reason: format!("'{field}' is not a number"),
            })?;
        }

        specs.push(ComponentSpec::new(values[0], values[1], values[2], values[3]));
    }

    Ok(specs)
}

pub fn read_components_file(path: &Path) -> Result<Vec<ComponentSpec>, PendulumError> {
    let text = std::fs::read_to_string(path)?;
    parse_components(&text)
}

/// Default component table shipped with the tool.
pub fn reference_components() -> Vec<ComponentSpec> {
    [
        (7.1, 8.16, 0.0, 1.09e-5),
        (10.7, 6.4, 0.0, 0.94e-5),
        (7.8, 8.59, 0.0, 1.15e-5),
        (9.5, 5.72, 0.0, 1.18e-5),
        (6.5, 7.93, 0.0, 0.99e-5),
        (8.6, 7.35, 0.0, 1.11e-5),
        (10.3, 6.67, 0.0, 1.07e-5),
        (7.4, 8.81, 0.0, 1.13e-5),
        (8.0, 5.58, 0.0, 1.03e-5),
        (9.0, 8.92, 0.0, 0.96e-5),
    ]
    .into_iter()
    .map(|(tau, f, phi, a)| ComponentSpec::new(tau, f, phi, a))
    .collect()
}
