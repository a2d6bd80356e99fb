//! Double pendulum state
//!
//! Angles are measured from the downward vertical:
//! - th1, v1: upper arm angle and angular velocity
//! - th2, v2: lower arm angle and angular velocity

use serde::Serialize;

/// Instantaneous state of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendulumState {
    /// Simulation time [s]
    pub t: f64,
    /// Upper arm angle [rad]
    pub th1: f64,
    /// Lower arm angle [rad]
    pub th2: f64,
    /// Upper arm angular velocity [rad/s]
    pub v1: f64,
    /// Lower arm angular velocity [rad/s]
    pub v2: f64,
}

impl PendulumState {
    pub fn new(t: f64, th1: f64, th2: f64, v1: f64, v2: f64) -> Self {
        Self { t, th1, th2, v1, v2 }
    }

    /// Hanging straight down, at rest, at t = 0.
    pub fn rest() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0, 0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.t.is_finite()
            && self.th1.is_finite()
            && self.th2.is_finite()
            && self.v1.is_finite()
            && self.v2.is_finite()
    }

    /// Kinetic plus potential energy per unit bob mass [J/kg], in the frame of
    /// the pivot, for two equal bobs on arms of length `l`.
    pub fn mechanical_energy(&self, gravity: f64, arm_length: f64) -> f64 {
        let l2 = arm_length * arm_length;
        let kinetic = l2
            * (self.v1 * self.v1
                + 0.5 * self.v2 * self.v2
                + self.v1 * self.v2 * (self.th1 - self.th2).cos());
        let potential = -gravity * arm_length * (2.0 * self.th1.cos() + self.th2.cos());
        kinetic + potential
    }
}

impl Default for PendulumState {
    fn default() -> Self {
        Self::rest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_energy_is_potential_minimum() {
        let e = PendulumState::rest().mechanical_energy(9.81, 1.0);
        assert!((e + 3.0 * 9.81).abs() < 1e-12);

        let displaced = PendulumState::new(0.0, 0.2, -0.1, 0.0, 0.0).mechanical_energy(9.81, 1.0);
        assert!(displaced > e);
    }

    #[test]
    fn finiteness_check_covers_every_field() {
        assert!(PendulumState::rest().is_finite());
        assert!(!PendulumState::new(0.0, f64::NAN, 0.0, 0.0, 0.0).is_finite());
        assert!(!PendulumState::new(0.0, 0.0, 0.0, 0.0, f64::INFINITY).is_finite());
    }
}
