//! Per-step samples and their consumers

use serde::Serialize;

/// One record per integration step, taken before the state is advanced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub t: f64,
    /// Horizontal position of the lower bob [m]
    pub mirror_position: f64,
    /// Base displacement [m]
    pub base_noise: f64,
    pub th1: f64,
    pub th2: f64,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Non-finite state detected after step `step`.
    Failed { step: usize },
    Cancelled { step: usize },
}

impl RunStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, RunStatus::Completed)
    }
}

/// Receives samples in increasing time order.
pub trait SampleSink {
    fn accept(&mut self, sample: Sample);

    /// Called once when the run stops producing samples.
    fn close(&mut self, _status: RunStatus) {}
}

impl SampleSink for Vec<Sample> {
    fn accept(&mut self, sample: Sample) {
        self.push(sample);
    }
}

impl<S: SampleSink + ?Sized> SampleSink for &mut S {
    fn accept(&mut self, sample: Sample) {
        (**self).accept(sample);
    }

    fn close(&mut self, status: RunStatus) {
        (**self).close(status);
    }
}

/// Collects every sample and remembers whether the run finished.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
    status: Option<RunStatus>,
}

impl SampleBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            status: None,
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// `None` while the run is still producing samples.
    pub fn status(&self) -> Option<RunStatus> {
        self.status
    }

    /// True only when the run reached its final step.
    pub fn is_complete(&self) -> bool {
        self.status.is_some_and(|s| s.is_complete())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleSink for SampleBuffer {
    fn accept(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    fn close(&mut self, status: RunStatus) {
        self.status = Some(status);
    }
}

/// A named `(x, y)` series handed to a chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: &'static str,
    pub points: Vec<(f64, f64)>,
}

pub const MIRROR_POSITION_LABEL: &str = "Mirror Position";
pub const BASE_NOISE_LABEL: &str = "Base Noise";

pub fn mirror_position_series(samples: &[Sample]) -> Series {
    Series {
        label: MIRROR_POSITION_LABEL,
        points: samples.iter().map(|s| (s.t, s.mirror_position)).collect(),
    }
}

pub fn base_noise_series(samples: &[Sample]) -> Series {
    Series {
        label: BASE_NOISE_LABEL,
        points: samples.iter().map(|s| (s.t, s.base_noise)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: f64) -> Sample {
        Sample {
            t,
            mirror_position: 2.0 * t,
            base_noise: -t,
            th1: 0.0,
            th2: 0.0,
        }
    }

    #[test]
    fn buffer_tracks_status() {
        let mut buffer = SampleBuffer::default();
        buffer.accept(sample(0.0));
        assert_eq!(buffer.status(), None);
        assert!(!buffer.is_complete());

        buffer.close(RunStatus::Failed { step: 1 });
        assert!(!buffer.is_complete());

        let mut done = SampleBuffer::default();
        done.close(RunStatus::Completed);
        assert!(done.is_complete());
    }

    #[test]
    fn series_keep_sample_order() {
        let samples = vec![sample(0.0), sample(0.5), sample(1.0)];
        let mirror = mirror_position_series(&samples);
        let base = base_noise_series(&samples);

        assert_eq!(mirror.label, "Mirror Position");
        assert_eq!(base.label, "Base Noise");
        assert_eq!(mirror.points, vec![(0.0, 0.0), (0.5, 1.0), (1.0, 2.0)]);
        assert_eq!(base.points, vec![(0.0, -0.0), (0.5, -0.5), (1.0, -1.0)]);
    }
}
