//! Double pendulum driven by damped sinusoidal base noise
//!
//! The suspension point of a two-arm pendulum is displaced by a sum of
//! exponentially decaying sinusoids. A fixed-step semi-implicit Euler
//! integrator produces, for every step, the horizontal position of the lower
//! bob ("mirror"), the base displacement and both arm angles. The binary
//! writes these as two-column text files, PNG charts, an animation frame CSV
//! and a JSON summary.

pub mod animation;
pub mod config;
pub mod integrator;
pub mod noise;
pub mod output;
pub mod params;
pub mod sink;
pub mod state;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use thiserror::Error;

pub use animation::{AnimationFrame, AnimationTrack};
pub use config::SimConfig;
pub use integrator::{simulate, InitialCondition, Integrator, Phase};
pub use noise::{ComponentError, ComponentSpec, NoiseComponent, NoiseModel};
pub use params::SimulationParameters;
pub use sink::{RunStatus, Sample, SampleBuffer, SampleSink};
pub use state::PendulumState;

use crate::output::{
    make_plots, series_stats, write_animation_csv, write_summary, write_two_column, OutputFiles,
    Summary,
};
use crate::sink::{base_noise_series, mirror_position_series};

#[derive(Debug, Error)]
pub enum PendulumError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("no noise components: supply at least one row or a component file")]
    NoComponents,
    #[error("noise component {index}: {source}")]
    InvalidComponent {
        index: usize,
        #[source]
        source: noise::ComponentError,
    },
    #[error("component file line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error(
        "numerical instability at step {step} (t = {time}): th1 = {th1}, th2 = {th2}, v1 = {v1}, v2 = {v2}"
    )]
    NumericalInstability {
        step: usize,
        time: f64,
        th1: f64,
        th2: f64,
        v1: f64,
        v2: f64,
    },
    #[error("run cancelled before step {step}")]
    Cancelled { step: usize },
    #[error("invalid integrator transition: {0}")]
    InvalidTransition(&'static str),
}

/// Validate `cfg`, integrate, and write every output into a fresh
/// timestamped directory below `output_dir`.
///
/// A run that fails numerically still writes its partial data and summary
/// before the error is returned.
pub fn run_simulation(cfg: &SimConfig, output_dir: &Path) -> anyhow::Result<Summary> {
    let params = cfg.parameters()?;
    let model = cfg.noise_model()?;
    let initial = cfg.initial_condition();

    log::info!(
        "simulation parameters: n = {}, g = {}, duration = {} s, l = {} m",
        params.steps,
        params.gravity,
        params.duration,
        params.arm_length
    );
    for (i, c) in model.components().iter().enumerate() {
        log::debug!(
            "component {i}: tau = {} s, omega = {} rad/s, phi = {}, A = {:e} m",
            c.tau(),
            c.omega(),
            c.phi(),
            c.amplitude()
        );
    }

    let mut integrator = Integrator::new(&model, params, initial)?;
    let initial_state = *integrator.state();
    let mut buffer = SampleBuffer::with_capacity(params.steps);
    let outcome = integrator.run(&mut buffer, None);
    let final_state = *integrator.state();

    let run_dir = create_run_dir(output_dir)?;
    let files = OutputFiles::in_dir(&run_dir, buffer.is_complete(), cfg.write_plots);
    let samples = buffer.samples();

    write_two_column(&files.mirror_position_path, &mirror_position_series(samples))?;
    write_two_column(&files.base_noise_path, &base_noise_series(samples))?;
    let track = AnimationTrack::from_samples(samples, params.arm_length).decimated(cfg.animation_stride);
    write_animation_csv(&files.animation_path, &track)?;
    make_plots(samples, &files)?;

    let (peak_mirror_position_m, rms_base_noise_m) = series_stats(samples);
    let summary = Summary {
        config: cfg.clone(),
        parameters: params,
        dt: params.dt(),
        components: model.len(),
        run: buffer.status().unwrap_or(RunStatus::Failed {
            step: integrator.steps_taken(),
        }),
        samples: samples.len(),
        initial_state,
        final_state,
        initial_energy: initial_state.mechanical_energy(params.gravity, params.arm_length),
        final_energy: final_state.mechanical_energy(params.gravity, params.arm_length),
        peak_mirror_position_m,
        rms_base_noise_m,
        outputs: files.clone(),
    };
    write_summary(&files.summary_path, &summary)?;

    outcome.with_context(|| format!("incomplete run kept in {}", run_dir.display()))?;
    Ok(summary)
}

/// Highest `-NN` suffix tried when runs start within the same second.
const MAX_RUN_DIR_SUFFIX: usize = 99;

/// Claim a fresh `base_dir/<UTC yyyymmdd-hhmmss>[-NN]` directory.
///
/// `create_dir` fails on an existing path, so two runs racing for the same
/// name never share a directory.
fn create_run_dir(base_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(base_dir)
        .with_context(|| format!("failed to create output base directory {}", base_dir.display()))?;

    let stamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();
    for suffix in 0..=MAX_RUN_DIR_SUFFIX {
        let candidate = match suffix {
            0 => base_dir.join(&stamp),
            n => base_dir.join(format!("{stamp}-{n:02}")),
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to create run directory {}", candidate.display()))
            }
        }
    }
    anyhow::bail!(
        "every run directory name for {stamp} under {} is taken",
        base_dir.display()
    )
}
