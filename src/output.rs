use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use csv::WriterBuilder;
use plotters::prelude::*;
use serde::Serialize;

use crate::animation::{AnimationTrack, PendulumGeometry};
use crate::config::SimConfig;
use crate::params::SimulationParameters;
use crate::sink::{base_noise_series, mirror_position_series, RunStatus, Sample, Series};
use crate::state::PendulumState;

#[derive(Debug, Clone, Serialize)]
pub struct OutputFiles {
    pub output_dir: PathBuf,
    pub mirror_position_path: PathBuf,
    pub base_noise_path: PathBuf,
    pub animation_path: PathBuf,
    pub summary_path: PathBuf,
    pub plot_series_path: Option<PathBuf>,
    pub plot_angles_path: Option<PathBuf>,
}

impl OutputFiles {
    /// File layout inside one run directory. Incomplete runs get `.partial`
    /// data files and no plots.
    pub fn in_dir(output_dir: &Path, complete: bool, plots: bool) -> Self {
        let suffix = if complete { "" } else { ".partial" };
        let plots = plots && complete;
        Self {
            output_dir: output_dir.to_path_buf(),
            mirror_position_path: output_dir.join(format!("mirror_position{suffix}.txt")),
            base_noise_path: output_dir.join(format!("base_noise{suffix}.txt")),
            animation_path: output_dir.join(format!("animation_frames{suffix}.csv")),
            summary_path: output_dir.join("run_summary.json"),
            plot_series_path: plots.then(|| output_dir.join("plot_mirror_base.png")),
            plot_angles_path: plots.then(|| output_dir.join("plot_angles.png")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub config: SimConfig,
    pub parameters: SimulationParameters,
    pub dt: f64,
    pub components: usize,
    pub run: RunStatus,
    pub samples: usize,
    pub initial_state: PendulumState,
    pub final_state: PendulumState,
    /// Per unit bob mass, pivot frame [J/kg]
    pub initial_energy: f64,
    pub final_energy: f64,
    pub peak_mirror_position_m: f64,
    pub rms_base_noise_m: f64,
    pub outputs: OutputFiles,
}

/// Largest |mirror position| and RMS base noise over the samples.
pub fn series_stats(samples: &[Sample]) -> (f64, f64) {
    let peak = samples
        .iter()
        .map(|s| s.mirror_position.abs())
        .fold(0.0_f64, f64::max);
    let n = samples.len().max(1) as f64;
    let rms = (samples.iter().map(|s| s.base_noise * s.base_noise).sum::<f64>() / n).sqrt();
    (peak, rms)
}

/// Write `x y` pairs, one per line, separated by a single space. Values use
/// the shortest exponent form that parses back to the same `f64`.
pub fn write_two_column(path: &Path, series: &Series) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to open {} for writing", path.display()))?;

    for &(x, y) in &series.points {
        writer.write_record([format!("{x:e}"), format!("{y:e}")])?;
    }

    writer.flush()?;
    Ok(())
}

/// Read a two-column file written by [`write_two_column`]; any run of spaces
/// or tabs separates the columns.
pub fn read_two_column(path: &Path) -> anyhow::Result<Vec<(f64, f64)>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut points = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let (Some(x), Some(y), None) = (fields.next(), fields.next(), fields.next()) else {
            anyhow::bail!("{}:{}: expected two columns", path.display(), idx + 1);
        };
        let x: f64 = x
            .parse()
            .with_context(|| format!("{}:{}: bad x value '{x}'", path.display(), idx + 1))?;
        let y: f64 = y
            .parse()
            .with_context(|| format!("{}:{}: bad y value '{y}'", path.display(), idx + 1))?;
        points.push((x, y));
    }
    Ok(points)
}

#[derive(Debug, Serialize)]
struct FrameRecord {
    t: f64,
    th1: f64,
    th2: f64,
    base_noise: f64,
    pivot_x: f64,
    pivot_y: f64,
    bob1_x: f64,
    bob1_y: f64,
    bob2_x: f64,
    bob2_y: f64,
}

/// Animation frames with joint positions in metres (y down, pivot at the
/// origin for zero base noise).
pub fn write_animation_csv(path: &Path, track: &AnimationTrack) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let geometry = PendulumGeometry {
        scale: 1.0,
        origin_x: 0.0,
        origin_y: 0.0,
    };
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to open CSV path {}", path.display()))?;

    for frame in &track.frames {
        let joints = geometry.joints(frame, track.arm_length);
        writer.serialize(FrameRecord {
            t: frame.t,
            th1: frame.th1,
            th2: frame.th2,
            base_noise: frame.base_noise,
            pivot_x: joints.pivot.0,
            pivot_y: joints.pivot.1,
            bob1_x: joints.bob1.0,
            bob1_y: joints.bob1.1,
            bob2_x: joints.bob2.0,
            bob2_y: joints.bob2.1,
        })?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &Summary) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let data = serde_json::to_string_pretty(summary)?;
    fs::write(path, data)?;
    Ok(())
}

pub fn make_plots(samples: &[Sample], files: &OutputFiles) -> anyhow::Result<()> {
    if let Some(path) = &files.plot_series_path {
        plot_mirror_and_base(samples, path)?;
    }
    if let Some(path) = &files.plot_angles_path {
        plot_angles(samples, path)?;
    }
    Ok(())
}

fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return -1.0..1.0;
    }
    let span = hi - lo;
    let pad = if span > 0.0 {
        span * 0.05
    } else if hi != 0.0 {
        hi.abs() * 0.05
    } else {
        1.0
    };
    (lo - pad)..(hi + pad)
}

fn plot_mirror_and_base(samples: &[Sample], path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mirror = mirror_position_series(samples);
    let base = base_noise_series(samples);

    let root = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_time = samples.last().map(|s| s.t).unwrap_or(1.0).max(f64::EPSILON);
    let y_range = padded_range(
        mirror
            .points
            .iter()
            .chain(base.points.iter())
            .map(|&(_, y)| y),
    );

    let mut chart = ChartBuilder::on(&root)
        .caption("Mirror Position and Base Noise", ("sans-serif", 34).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(0.0..max_time, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Amplitude (m)")
        .y_label_formatter(&|v| format!("{v:.2e}"))
        .draw()?;

    chart
        .draw_series(LineSeries::new(mirror.points.iter().copied(), &BLUE))?
        .label(mirror.label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], BLUE.stroke_width(3)));

    chart
        .draw_series(LineSeries::new(base.points.iter().copied(), &RED))?
        .label(base.label)
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], RED.stroke_width(3)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()?;

    root.present()?;
    Ok(())
}

fn plot_angles(samples: &[Sample], path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let root = BitMapBackend::new(path, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_time = samples.last().map(|s| s.t).unwrap_or(1.0).max(f64::EPSILON);
    let y_range = padded_range(samples.iter().flat_map(|s| [s.th1, s.th2]));

    let mut chart = ChartBuilder::on(&root)
        .caption("Arm Angles", ("sans-serif", 34).into_font())
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(0.0..max_time, y_range)?;

    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .y_desc("Angle (rad)")
        .y_label_formatter(&|v| format!("{v:.2e}"))
        .draw()?;

    chart
        .draw_series(LineSeries::new(samples.iter().map(|s| (s.t, s.th1)), &BLUE))?
        .label("th1")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], BLUE.stroke_width(3)));

    chart
        .draw_series(LineSeries::new(samples.iter().map(|s| (s.t, s.th2)), &GREEN))?
        .label("th2")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 25, y)], GREEN.stroke_width(3)));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .border_style(BLACK)
        .background_style(WHITE.mix(0.7))
        .draw()?;

    root.present()?;
    Ok(())
}
