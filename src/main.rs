use std::path::PathBuf;

use clap::Parser;
use driven_pendulum::config::SimConfig;
use driven_pendulum::params::lenient_step_count;
use driven_pendulum::run_simulation;

#[derive(Debug, Parser)]
#[command(author, version, about = "Double pendulum driven by damped sinusoidal base noise")]
struct Cli {
    /// TOML run configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Component file (`tau freq_hz phase amplitude` per line); replaces inline rows
    #[arg(long)]
    components: Option<PathBuf>,

    /// Output base directory; each run gets a timestamped subdirectory
    #[arg(long, default_value = "output-driven-pendulum")]
    output: PathBuf,

    /// Number of integration steps, e.g. 2500 or 1e5 (unusable values fall back to 100000)
    #[arg(long, value_parser = parse_steps)]
    steps: Option<usize>,

    /// Gravitational acceleration [m/s^2]
    #[arg(long)]
    gravity: Option<f64>,

    /// Total simulated time [s]
    #[arg(long)]
    duration: Option<f64>,

    /// Arm length [m]
    #[arg(long)]
    length: Option<f64>,

    /// Start the upper arm at 0.1 rad so the animation visibly moves
    #[arg(long, default_value_t = false)]
    nudge_initial_angle: bool,

    /// Write one animation frame every N steps
    #[arg(long)]
    animation_stride: Option<usize>,

    /// Skip PNG charts
    #[arg(long, default_value_t = false)]
    no_plots: bool,
}

fn parse_steps(raw: &str) -> Result<usize, String> {
    Ok(lenient_step_count(raw))
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => SimConfig::from_toml_path(path)?,
        None => SimConfig::default(),
    };
    if let Some(path) = cli.components {
        cfg.components.clear();
        cfg.components_file = Some(path);
    }
    if let Some(v) = cli.steps {
        cfg.steps = v;
    }
    if let Some(v) = cli.gravity {
        cfg.gravity = v;
    }
    if let Some(v) = cli.duration {
        cfg.duration = v;
    }
    if let Some(v) = cli.length {
        cfg.arm_length = v;
    }
    if cli.nudge_initial_angle {
        cfg.nudge_initial_angle = true;
    }
    if let Some(v) = cli.animation_stride {
        cfg.animation_stride = v;
    }
    if cli.no_plots {
        cfg.write_plots = false;
    }

    let summary = run_simulation(&cfg, &cli.output)?;

    println!(
        "Simulation complete. Samples: {} | dt: {:e} s | Components: {}",
        summary.samples, summary.dt, summary.components
    );
    println!("Run directory: {}", summary.outputs.output_dir.display());
    println!("Mirror position: {}", summary.outputs.mirror_position_path.display());
    println!("Base noise: {}", summary.outputs.base_noise_path.display());
    println!("Animation frames: {}", summary.outputs.animation_path.display());
    println!("Summary: {}", summary.outputs.summary_path.display());
    if let Some(path) = &summary.outputs.plot_series_path {
        println!("Series plot: {}", path.display());
    }
    if let Some(path) = &summary.outputs.plot_angles_path {
        println!("Angle plot: {}", path.display());
    }

    println!(
        "Peak |mirror position|: {:.3e} m | RMS base noise: {:.3e} m",
        summary.peak_mirror_position_m, summary.rms_base_noise_m
    );

    Ok(())
}
