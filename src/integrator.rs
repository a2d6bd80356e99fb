//! Fixed-step integrator for the noise-driven double pendulum
//!
//! Two equal bobs hang from arms of equal length `l`; the pivot moves
//! horizontally with the base displacement of a [`NoiseModel`]. Writing
//! `a = ap/l`, `G = g/l` and `d = th1 - th2`, the Lagrange equations in the
//! pivot frame are
//!
//! ```text
//! 2*th1'' + cos(d)*th2''  = 2a*cos(th1) - 2G*sin(th1) - v2^2*sin(d)
//! cos(d)*th1'' +   th2''  =  a*cos(th2) -  G*sin(th2) + v1^2*sin(d)
//! ```
//!
//! where `ap` is the inertial forcing returned by
//! [`NoiseModel::acceleration`]. The 2x2 system has determinant
//! `2 - cos(d)^2 >= 1` and is solved in closed form. States advance with
//! semi-implicit Euler: velocities first, then angles with the new
//! velocities.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::noise::NoiseModel;
use crate::params::SimulationParameters;
use crate::sink::{RunStatus, Sample, SampleSink};
use crate::state::PendulumState;
use crate::PendulumError;

/// Angle applied to the upper arm by [`InitialCondition::nudged`] in the CLI.
pub const DEFAULT_NUDGE_RAD: f64 = 0.1;

/// How the state at t = 0 is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct InitialCondition {
    /// Angles and angular velocities to start from. `None` starts both arms
    /// vertical with the upper arm velocity seeded from the base velocity.
    pub start: Option<PendulumState>,
    /// Upper arm angle used when both angles would otherwise start at zero.
    /// Only there to make a rendered animation move; it is not part of the
    /// physical model.
    pub nudge_th1: Option<f64>,
}

impl InitialCondition {
    /// Both arms vertical, upper arm velocity seeded from the base velocity.
    pub fn physical() -> Self {
        Self::default()
    }

    pub fn nudged(th1: f64) -> Self {
        Self {
            nudge_th1: Some(th1),
            ..Self::default()
        }
    }

    /// Start from explicit angles and velocities. The time of `state` is
    /// ignored; every run starts at t = 0.
    pub fn from_state(state: PendulumState) -> Self {
        Self {
            start: Some(state),
            ..Self::default()
        }
    }

    pub fn state(&self, model: &NoiseModel, arm_length: f64) -> PendulumState {
        let mut state = match self.start {
            Some(start) => PendulumState { t: 0.0, ..start },
            None => PendulumState {
                v1: model.seeded_angular_velocity(arm_length),
                ..PendulumState::rest()
            },
        };

        if let Some(th1) = self.nudge_th1 {
            if state.th1 == 0.0 && state.th2 == 0.0 {
                log::warn!("initial upper arm angle nudged to {th1} rad");
                state.th1 = th1;
            }
        }
        state
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Angular accelerations `(th1'', th2'')` for the given state, inertial
/// base forcing `forcing` [m/s^2] and gravity [m/s^2].
pub fn angular_accelerations(
    state: &PendulumState,
    forcing: f64,
    gravity: f64,
    arm_length: f64,
) -> (f64, f64) {
    let a = forcing / arm_length;
    let g = gravity / arm_length;

    let (sin1, cos1) = state.th1.sin_cos();
    let (sin2, cos2) = state.th2.sin_cos();
    let (sin_d, cos_d) = (state.th1 - state.th2).sin_cos();

    let rhs1 = 2.0 * (a * cos1 - g * sin1) - state.v2 * state.v2 * sin_d;
    let rhs2 = a * cos2 - g * sin2 + state.v1 * state.v1 * sin_d;
    let det = 2.0 - cos_d * cos_d;

    ((rhs1 - cos_d * rhs2) / det, (2.0 * rhs2 - cos_d * rhs1) / det)
}

/// Owns one run: its state, its step counter and its phase.
#[derive(Debug, Clone)]
pub struct Integrator<'a> {
    model: &'a NoiseModel,
    params: SimulationParameters,
    dt: f64,
    state: PendulumState,
    steps_taken: usize,
    phase: Phase,
}

impl<'a> Integrator<'a> {
    pub fn new(
        model: &'a NoiseModel,
        params: SimulationParameters,
        initial: InitialCondition,
    ) -> Result<Self, PendulumError> {
        params.validate()?;

        let state = initial.state(model, params.arm_length);
        if !state.is_finite() {
            return Err(PendulumError::InvalidParameters(format!(
                "initial state is not finite (v1 = {})",
                state.v1
            )));
        }
        log::debug!(
            "initial state: th1 = {}, th2 = {}, v1 = {:e} rad/s",
            state.th1,
            state.th2,
            state.v1
        );

        Ok(Self {
            model,
            params,
            dt: params.dt(),
            state,
            steps_taken: 0,
            phase: Phase::Created,
        })
    }

    pub fn state(&self) -> &PendulumState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    /// Emit the sample for the current state, then advance by one `dt`.
    ///
    /// The sink is closed when this step ends the run, successfully or not.
    pub fn step<S: SampleSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), PendulumError> {
        match self.phase {
            Phase::Created => self.phase = Phase::Running,
            Phase::Running => {}
            Phase::Completed => return Err(PendulumError::InvalidTransition("run already completed")),
            Phase::Failed => return Err(PendulumError::InvalidTransition("run has failed")),
            Phase::Cancelled => return Err(PendulumError::InvalidTransition("run was cancelled")),
        }

        let step = self.steps_taken;
        let l = self.params.arm_length;
        let t = self.state.t;

        let forcing = self.model.acceleration(t);
        let base = self.model.displacement(t);

        let sample = Sample {
            t,
            mirror_position: base + l * self.state.th1.sin() + l * self.state.th2.sin(),
            base_noise: base,
            th1: self.state.th1,
            th2: self.state.th2,
        };
        if !(sample.mirror_position.is_finite() && sample.base_noise.is_finite()) {
            return Err(self.fail(sink, step));
        }
        sink.accept(sample);

        let (acc1, acc2) = angular_accelerations(&self.state, forcing, self.params.gravity, l);
        let s = &mut self.state;
        s.v1 += acc1 * self.dt;
        s.v2 += acc2 * self.dt;
        s.th1 += s.v1 * self.dt;
        s.th2 += s.v2 * self.dt;
        s.t += self.dt;
        self.steps_taken += 1;

        if !self.state.is_finite() {
            return Err(self.fail(sink, step));
        }

        if self.steps_taken == self.params.steps {
            self.phase = Phase::Completed;
            sink.close(RunStatus::Completed);
        }
        Ok(())
    }

    /// Run every remaining step into `sink`.
    ///
    /// `cancel` is polled between steps; raising it stops the run before the
    /// next step begins.
    pub fn run<S: SampleSink + ?Sized>(
        &mut self,
        sink: &mut S,
        cancel: Option<&AtomicBool>,
    ) -> Result<(), PendulumError> {
        log::info!(
            "integrating {} steps (dt = {:e} s, {} noise components)",
            self.params.steps - self.steps_taken,
            self.dt,
            self.model.len()
        );

        while self.steps_taken < self.params.steps {
            if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                let step = self.steps_taken;
                self.phase = Phase::Cancelled;
                sink.close(RunStatus::Cancelled { step });
                log::info!("run cancelled before step {step}");
                return Err(PendulumError::Cancelled { step });
            }
            self.step(sink)?;
        }

        log::info!("run completed at t = {} s", self.state.t);
        Ok(())
    }

    fn fail<S: SampleSink + ?Sized>(&mut self, sink: &mut S, step: usize) -> PendulumError {
        self.phase = Phase::Failed;
        sink.close(RunStatus::Failed { step });

        let s = self.state;
        log::error!(
            "non-finite state at step {step}: t = {}, th1 = {}, th2 = {}, v1 = {}, v2 = {}",
            s.t,
            s.th1,
            s.th2,
            s.v1,
            s.v2
        );
        PendulumError::NumericalInstability {
            step,
            time: s.t,
            th1: s.th1,
            th2: s.th2,
            v1: s.v1,
            v2: s.v2,
        }
    }
}

/// Run a whole simulation and return its samples.
pub fn simulate(
    model: &NoiseModel,
    params: SimulationParameters,
    initial: InitialCondition,
) -> Result<Vec<Sample>, PendulumError> {
    let mut integrator = Integrator::new(model, params, initial)?;
    let mut samples = Vec::with_capacity(params.steps);
    integrator.run(&mut samples, None)?;
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::noise::NoiseComponent;
    use crate::sink::SampleBuffer;
    use std::f64::consts::PI;

    fn params(steps: usize, duration: f64) -> SimulationParameters {
        SimulationParameters::new(9.81, 1.0, duration, steps).unwrap()
    }

    fn driven_model() -> NoiseModel {
        NoiseModel::new(vec![
            NoiseComponent::from_hertz(7.1, 1.298, 0.0, 1.09e-5).unwrap(),
            NoiseComponent::from_hertz(0.9, 3.1, 0.4, 2.0e-2).unwrap(),
        ])
    }

    #[test]
    fn reference_scenario() {
        let model = NoiseModel::new(vec![NoiseComponent::from_hertz(7.1, 1.298, 0.0, 1.09e-5).unwrap()]);
        let p = params(1000, 1.0);

        let integrator = Integrator::new(&model, p, InitialCondition::physical()).unwrap();
        let v1 = integrator.state().v1;
        assert!((v1 - (-2.0 * PI * 1.298 * 1.09e-5)).abs() < 1e-15);
        assert!((v1 - (-8.894e-5)).abs() < 1e-7);

        let samples = simulate(&model, p, InitialCondition::physical()).unwrap();
        assert_eq!(samples.len(), 1000);
        assert_eq!(samples[0].t, 0.0);
        assert_eq!(samples[0].base_noise, 0.0);
        assert!((samples[999].t - 0.999).abs() < 1e-9);
    }

    #[test]
    fn sample_count_matches_steps() {
        let model = driven_model();
        for &n in &[1, 2, 17, 500] {
            let samples = simulate(&model, params(n, 0.5), InitialCondition::physical()).unwrap();
            assert_eq!(samples.len(), n);
            assert!(samples.windows(2).all(|w| w[0].t < w[1].t));
        }
    }

    #[test]
    fn runs_are_bit_identical() {
        let model = driven_model();
        let p = params(2000, 2.0);
        let a = simulate(&model, p, InitialCondition::physical()).unwrap();
        let b = simulate(&model, p, InitialCondition::physical()).unwrap();

        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.t.to_bits(), y.t.to_bits());
            assert_eq!(x.mirror_position.to_bits(), y.mirror_position.to_bits());
            assert_eq!(x.base_noise.to_bits(), y.base_noise.to_bits());
            assert_eq!(x.th1.to_bits(), y.th1.to_bits());
            assert_eq!(x.th2.to_bits(), y.th2.to_bits());
        }
    }

    #[test]
    fn stepping_matches_batch_run() {
        let model = driven_model();
        let p = params(300, 1.5);
        let batch = simulate(&model, p, InitialCondition::physical()).unwrap();

        let mut integrator = Integrator::new(&model, p, InitialCondition::physical()).unwrap();
        let mut streamed = SampleBuffer::default();
        for _ in 0..300 {
            integrator.step(&mut streamed).unwrap();
        }

        assert!(streamed.is_complete());
        assert_eq!(streamed.samples(), batch.as_slice());
        assert_eq!(integrator.phase(), Phase::Completed);
    }

    #[test]
    fn undriven_pendulum_stays_at_rest() {
        let model = NoiseModel::quiet();
        let samples = simulate(&model, params(1000, 1.0), InitialCondition::physical()).unwrap();
        assert!(samples
            .iter()
            .all(|s| s.th1 == 0.0 && s.th2 == 0.0 && s.mirror_position == 0.0));
    }

    #[test]
    fn free_swing_stays_bounded() {
        let model = NoiseModel::quiet();
        let samples = simulate(&model, params(50_000, 5.0), InitialCondition::nudged(0.1)).unwrap();

        let max1 = samples.iter().map(|s| s.th1.abs()).fold(0.0_f64, f64::max);
        let max2 = samples.iter().map(|s| s.th2.abs()).fold(0.0_f64, f64::max);
        assert!(max1 < 0.2, "th1 grew to {max1}");
        assert!(max2 < 0.3, "th2 grew to {max2}");
        // the lower arm is dragged along by the coupling
        assert!(max2 > 0.01);
    }

    #[test]
    fn free_swing_conserves_energy() {
        let model = NoiseModel::quiet();
        let p = params(20_000, 2.0);
        let mut integrator = Integrator::new(&model, p, InitialCondition::nudged(0.1)).unwrap();
        let e0 = integrator.state().mechanical_energy(p.gravity, p.arm_length);

        let mut sink = Vec::new();
        let mut worst = 0.0_f64;
        while integrator.phase() != Phase::Completed {
            integrator.step(&mut sink).unwrap();
            let e = integrator.state().mechanical_energy(p.gravity, p.arm_length);
            worst = worst.max((e - e0).abs());
        }
        assert!(worst < 1e-3, "energy drifted by {worst}");
    }

    #[test]
    fn pivot_forcing_rotates_upper_arm_only_at_rest() {
        let (a1, a2) = angular_accelerations(&PendulumState::rest(), 0.5, 9.81, 2.0);
        assert!((a1 - 0.25).abs() < 1e-15);
        assert!(a2.abs() < 1e-15);
    }

    #[test]
    fn small_angle_gravity_matches_linear_modes() {
        let state = PendulumState::new(0.0, 1e-6, -2e-6, 0.0, 0.0);
        let (a1, a2) = angular_accelerations(&state, 0.0, 9.81, 1.0);
        let expected1 = 9.81 * (-2.0 * 1e-6 + -2e-6);
        let expected2 = 9.81 * (2.0 * 1e-6 - 2.0 * -2e-6);
        assert!((a1 - expected1).abs() < 1e-12);
        assert!((a2 - expected2).abs() < 1e-12);
    }

    #[test]
    fn nudge_only_applies_to_vertical_start() {
        let model = driven_model();
        let plain = InitialCondition::physical().state(&model, 1.0);
        let nudged = InitialCondition::nudged(0.1).state(&model, 1.0);
        assert_eq!(plain.th1, 0.0);
        assert_eq!(nudged.th1, 0.1);
        assert_eq!(plain.v1, nudged.v1);

        let tilted = InitialCondition {
            start: Some(PendulumState::new(0.0, 0.0, 0.3, 0.0, 0.0)),
            nudge_th1: Some(0.1),
        };
        assert_eq!(tilted.state(&model, 1.0).th1, 0.0);

        let spinning = InitialCondition {
            start: Some(PendulumState::new(0.0, 0.0, 0.0, 0.5, 0.0)),
            nudge_th1: Some(0.1),
        };
        let s = spinning.state(&model, 1.0);
        assert_eq!(s.th1, 0.1);
        assert_eq!(s.v1, 0.5);
    }

    #[test]
    fn explicit_start_state_begins_at_time_zero() {
        let model = driven_model();
        let start = PendulumState::new(3.0, 0.4, -0.2, 1.5, -0.5);
        let state = InitialCondition::from_state(start).state(&model, 1.0);
        assert_eq!(state, PendulumState { t: 0.0, ..start });

        let samples = simulate(&model, params(10, 0.1), InitialCondition::from_state(start)).unwrap();
        assert_eq!(samples[0].t, 0.0);
        assert_eq!(samples[0].th1, 0.4);
        assert_eq!(samples[0].th2, -0.2);
    }

    #[test]
    fn wild_swing_conserves_energy() {
        // large angles and fast arms keep the velocity-squared coupling busy
        let model = NoiseModel::quiet();
        let p = params(400_000, 2.0);
        let start = PendulumState::new(0.0, 2.5, -1.0, 1.0, -2.0);
        let mut integrator = Integrator::new(&model, p, InitialCondition::from_state(start)).unwrap();
        let e0 = integrator.state().mechanical_energy(p.gravity, p.arm_length);

        let mut sink = Vec::new();
        let mut worst = 0.0_f64;
        let mut fastest = 0.0_f64;
        while integrator.phase() != Phase::Completed {
            integrator.step(&mut sink).unwrap();
            let s = integrator.state();
            worst = worst.max((s.mechanical_energy(p.gravity, p.arm_length) - e0).abs());
            fastest = fastest.max(s.v1.abs()).max(s.v2.abs());
        }
        assert!(worst < 2e-3, "energy drifted by {worst}");
        assert!(fastest > 2.0, "arms never sped up ({fastest} rad/s)");
    }

    #[test]
    fn overflow_is_reported_as_instability() {
        // omega*A is finite but omega^2*A overflows
        let model = NoiseModel::new(vec![NoiseComponent::new(1.0, 1.0e10, PI / 2.0, 1.0e290).unwrap()]);
        let p = params(10, 1.0);
        let mut integrator = Integrator::new(&model, p, InitialCondition::physical()).unwrap();
        let mut buffer = SampleBuffer::default();

        let err = integrator.run(&mut buffer, None).unwrap_err();
        assert!(matches!(err, PendulumError::NumericalInstability { step: 0, .. }));
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.status(), Some(RunStatus::Failed { step: 0 }));
        assert!(!buffer.is_complete());
        assert_eq!(integrator.phase(), Phase::Failed);
        assert!(integrator.step(&mut buffer).is_err());
    }

    #[test]
    fn cancellation_stops_between_steps() {
        struct StopAfter<'f> {
            flag: &'f AtomicBool,
            limit: usize,
            inner: SampleBuffer,
        }

        impl SampleSink for StopAfter<'_> {
            fn accept(&mut self, sample: Sample) {
                self.inner.accept(sample);
                if self.inner.len() == self.limit {
                    self.flag.store(true, Ordering::Relaxed);
                }
            }

            fn close(&mut self, status: RunStatus) {
                self.inner.close(status);
            }
        }

        let model = driven_model();
        let flag = AtomicBool::new(false);
        let mut sink = StopAfter {
            flag: &flag,
            limit: 25,
            inner: SampleBuffer::default(),
        };
        let mut integrator = Integrator::new(&model, params(100, 1.0), InitialCondition::physical()).unwrap();

        let err = integrator.run(&mut sink, Some(&flag)).unwrap_err();
        assert!(matches!(err, PendulumError::Cancelled { step: 25 }));
        assert_eq!(sink.inner.len(), 25);
        assert_eq!(sink.inner.status(), Some(RunStatus::Cancelled { step: 25 }));
        assert_eq!(integrator.phase(), Phase::Cancelled);
    }

    #[test]
    fn completed_run_rejects_more_steps() {
        let model = NoiseModel::quiet();
        let mut integrator = Integrator::new(&model, params(3, 1.0), InitialCondition::physical()).unwrap();
        let mut sink = Vec::new();
        integrator.run(&mut sink, None).unwrap();

        let err = integrator.step(&mut sink).unwrap_err();
        assert!(matches!(err, PendulumError::InvalidTransition(_)));
        assert_eq!(sink.len(), 3);
    }
}
