use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use stadium_traffic::{
    config::{IntegrationMode, SimulationConfig},
    simulation::{PerformanceTracker, Simulation},
};

#[derive(Parser)]
#[command(name = "stadium-traffic")]
#[command(about = "Deterministic multi-agent traffic simulation on a stadium track")]
struct Args {
    /// Simulation configuration file; built-in defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Random seed, overrides the configuration file
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of frames to run
    #[arg(short, long, default_value_t = 3600)]
    frames: u64,

    /// Wall-clock seconds per frame
    #[arg(long, default_value_t = 1.0 / 60.0)]
    frame_time: f64,

    /// Override the integration mode
    #[arg(long, value_parser = parse_mode)]
    mode: Option<IntegrationMode>,

    /// Check every pair every tick instead of using the event scheduler
    #[arg(long)]
    exhaustive: bool,

    /// Frames between progress reports
    #[arg(long, default_value_t = 600)]
    report_every: u64,

    /// Enable verbose logging for detailed simulation progress
    #[arg(short, long)]
    verbose: bool,
}

fn parse_mode(value: &str) -> Result<IntegrationMode, String> {
    match value {
        "arc" | "arc_length" => Ok(IntegrationMode::ArcLength),
        "planar" => Ok(IntegrationMode::Planar),
        other => Err(format!("unknown integration mode '{other}' (expected arc_length or planar)")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if args.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info })
        .init();
    info!("Starting stadium traffic simulation");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            SimulationConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?
        }
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(mode) = args.mode {
        config.physics.integration_mode = mode;
    }
    if args.exhaustive {
        config.options.event_scheduler_enabled = false;
    }

    let mut simulation = Simulation::new(config).context("building simulation")?;
    let mut tracker = PerformanceTracker::new(args.report_every.max(1) as usize);
    let mut collisions = 0usize;

    for frame in 1..=args.frames {
        tracker.start_step();
        let report = simulation.step(args.frame_time);
        tracker.end_step(report.substeps, report.collisions.len());
        collisions += report.collisions.len();

        if frame % args.report_every.max(1) == 0 {
            let snapshots = simulation.vehicle_snapshots();
            let disabled = snapshots.iter().filter(|s| s.disabled).count();
            let speeding = snapshots.iter().filter(|s| s.speeding).count();
            let mean_speed = snapshots.iter().map(|s| s.v).sum::<f64>() / snapshots.len().max(1) as f64;
            info!(
                "t={:7.1}s  mean {:5.1} km/h  max {:5.1} km/h  speeding {:3}  disabled {:3}  collisions {}",
                simulation.time(),
                mean_speed * 3.6,
                report.max_speed * 3.6,
                speeding,
                disabled,
                collisions
            );
            info!(
                "    {:.3} ms/frame, {:.0} sub-steps/s",
                tracker.average_step_time().as_secs_f64() * 1000.0,
                tracker.substeps_per_second()
            );
        }
    }

    let stats = simulation.scheduler_stats();
    info!("=== Run summary ===");
    info!("Simulated time: {:.1}s over {} ticks", simulation.time(), simulation.tick());
    info!("Backend: {}, collision detection: {}", simulation.backend_name(), simulation.detector_name());
    info!(
        "Exact checks: {}, events pushed: {}, stale discarded: {}",
        stats.exact_checks, stats.pushed, stats.stale_discarded
    );
    info!("Collisions: {}", simulation.event_log().len());
    for record in simulation.event_log().iter().take(10) {
        info!(
            "  t={:.2}s vehicle {} -> {} at s={:.1} m, closing {:.2} m/s",
            record.time, record.follower.0, record.leader.0, record.location, record.relative_speed
        );
    }

    Ok(())
}
