use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::integrator::{InitialCondition, DEFAULT_NUDGE_RAD};
use crate::noise::{build_model, read_components_file, reference_components, ComponentSpec, NoiseModel};
use crate::params::{SimulationParameters, DEFAULT_STEPS};
use crate::PendulumError;

/// Runtime configuration for one driven-pendulum run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of fixed steps; 0 selects the default
    pub steps: usize,
    /// Gravitational acceleration [m/s^2]
    pub gravity: f64,
    /// Total simulated time [s]
    pub duration: f64,
    /// Length of each arm [m]
    pub arm_length: f64,
    /// Tilt the upper arm by 0.1 rad when it would start vertical
    pub nudge_initial_angle: bool,
    /// Write one animation frame every `animation_stride` steps
    pub animation_stride: usize,
    /// Render PNG charts
    pub write_plots: bool,
    /// Whitespace-delimited component file, used when `components` is empty
    pub components_file: Option<PathBuf>,
    /// Inline component table; empty when a file omits it
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            gravity: 9.81,
            duration: 1.0,
            arm_length: 1.0,
            nudge_initial_angle: false,
            animation_stride: 100,
            write_plots: true,
            components_file: None,
            components: reference_components(),
        }
    }
}

impl SimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, PendulumError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a TOML file. A relative `components_file` is resolved against
    /// the directory holding the configuration.
    pub fn from_toml_path(path: &Path) -> Result<Self, PendulumError> {
        let text = std::fs::read_to_string(path)?;
        let mut cfg = Self::from_toml_str(&text)?;
        if let (Some(file), Some(dir)) = (cfg.components_file.as_ref(), path.parent()) {
            if file.is_relative() {
                cfg.components_file = Some(dir.join(file));
            }
        }
        Ok(cfg)
    }

    pub fn effective_steps(&self) -> usize {
        if self.steps == 0 {
            DEFAULT_STEPS
        } else {
            self.steps
        }
    }

    pub fn parameters(&self) -> Result<SimulationParameters, PendulumError> {
        SimulationParameters::new(self.gravity, self.arm_length, self.duration, self.effective_steps())
    }

    pub fn initial_condition(&self) -> InitialCondition {
        if self.nudge_initial_angle {
            InitialCondition::nudged(DEFAULT_NUDGE_RAD)
        } else {
            InitialCondition::physical()
        }
    }

    /// Inline rows win; the component file is read only when there are none.
    pub fn component_specs(&self) -> Result<Vec<ComponentSpec>, PendulumError> {
        if !self.components.is_empty() {
            return Ok(self.components.clone());
        }
        match &self.components_file {
            Some(path) => {
                let specs = read_components_file(path)?;
                log::debug!("read {} components from {}", specs.len(), path.display());
                if specs.is_empty() {
                    return Err(PendulumError::NoComponents);
                }
                Ok(specs)
            }
            None => Err(PendulumError::NoComponents),
        }
    }

    pub fn noise_model(&self) -> Result<NoiseModel, PendulumError> {
        build_model(&self.component_specs()?)
    }

    /// Check everything a run needs before it starts.
    pub fn validate(&self) -> Result<(), PendulumError> {
        self.parameters()?;
        self.noise_model()?;
        Ok(())
    }
}
