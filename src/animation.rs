//! Data handed to a pendulum animation
//!
//! The animation runs on its own clock; it only needs the per-step angles,
//! the base displacement and the arm length. Playback picks the frame whose
//! index is proportional to elapsed wall time.

use serde::Serialize;

use crate::sink::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnimationFrame {
    pub t: f64,
    pub th1: f64,
    pub th2: f64,
    pub base_noise: f64,
}

impl From<&Sample> for AnimationFrame {
    fn from(s: &Sample) -> Self {
        Self {
            t: s.t,
            th1: s.th1,
            th2: s.th2,
            base_noise: s.base_noise,
        }
    }
}

/// Frames of one run plus the arm length needed to draw them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimationTrack {
    pub arm_length: f64,
    pub frames: Vec<AnimationFrame>,
}

impl AnimationTrack {
    pub fn from_samples(samples: &[Sample], arm_length: f64) -> Self {
        Self {
            arm_length,
            frames: samples.iter().map(AnimationFrame::from).collect(),
        }
    }

    /// Keep every `stride`-th frame, always including the last one.
    pub fn decimated(&self, stride: usize) -> Self {
        let stride = stride.max(1);
        let mut frames: Vec<AnimationFrame> = self.frames.iter().step_by(stride).copied().collect();
        if let Some(last) = self.frames.last() {
            if frames.last() != Some(last) {
                frames.push(*last);
            }
        }
        Self {
            arm_length: self.arm_length,
            frames,
        }
    }

    /// Frame to show after `elapsed` of a playback lasting `duration`
    /// (any consistent unit).
    pub fn frame_at(&self, elapsed: f64, duration: f64) -> Option<&AnimationFrame> {
        frame_index(elapsed, duration, self.frames.len()).map(|i| &self.frames[i])
    }
}

/// `min(floor(elapsed/duration * len), len - 1)`; the last frame once
/// playback is over. `None` when there are no frames.
pub fn frame_index(elapsed: f64, duration: f64, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if !(duration > 0.0) || elapsed >= duration {
        return Some(len - 1);
    }
    let raw = (elapsed.max(0.0) / duration * len as f64).floor() as usize;
    Some(raw.min(len - 1))
}

/// Screen placement of the pendulum drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendulumGeometry {
    /// Pixels per metre
    pub scale: f64,
    /// Pivot x at zero base noise
    pub origin_x: f64,
    /// Pivot y at zero base noise; y grows downwards
    pub origin_y: f64,
}

impl Default for PendulumGeometry {
    fn default() -> Self {
        Self {
            scale: 100.0,
            origin_x: 0.0,
            origin_y: 100.0,
        }
    }
}

/// Pivot and bob positions of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Joints {
    pub pivot: (f64, f64),
    pub bob1: (f64, f64),
    pub bob2: (f64, f64),
}

impl PendulumGeometry {
    /// Positive base noise lifts the pivot.
    pub fn joints(&self, frame: &AnimationFrame, arm_length: f64) -> Joints {
        let arm = arm_length * self.scale;
        let pivot = (self.origin_x, self.origin_y - frame.base_noise * self.scale);
        let bob1 = (pivot.0 + arm * frame.th1.sin(), pivot.1 + arm * frame.th1.cos());
        let bob2 = (bob1.0 + arm * frame.th2.sin(), bob1.1 + arm * frame.th2.cos());
        Joints { pivot, bob1, bob2 }
    }
}
