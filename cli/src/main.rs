//! `calc_traj` CLI: fit Bezier trajectories to the recorded track files of a scenario.

mod driver;

use anyhow::Result;
use clap::Parser;
use driver::{Driver, FileOutcome, RunRequest};
use std::path::PathBuf;
use traj_core::bezier::FitConfig;
use traj_core::pipeline::{PipelineConfig, DEFAULT_WORKERS};
use traj_io::layout::PathLayout;

#[derive(Parser)]
#[command(
    name = "calc_traj",
    about = "Fit Bezier trajectories to recorded vehicle track files"
)]
struct Cli {
    /// Name of the scenario (identifies the folder of track files)
    scenario_name: Option<String>,

    /// Number of the track file
    track_file_number: Option<u32>,

    /// Iterate through all track files
    #[arg(short, long)]
    all: bool,

    /// Recalculate the trajectory file if it already exists
    #[arg(short, long)]
    recalculate: bool,

    /// Root directory of the recorded track files [default: ../recorded_trackfiles]
    #[arg(long)]
    tracks_root: Option<PathBuf>,

    /// Root directory of the trajectory files [default: ../trajectory_files]
    #[arg(long)]
    traj_root: Option<PathBuf>,

    /// Number of tracks fitted concurrently
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Maximum sample-to-curve distance in metres
    #[arg(long, default_value_t = FitConfig::default().tolerance)]
    tolerance: f64,

    /// Write a JSON summary of all processed files
    #[arg(long)]
    summary: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let request = RunRequest::from_args(
        cli.scenario_name,
        cli.track_file_number,
        cli.all,
        cli.recalculate,
    )?;

    let mut layout = PathLayout::default();
    if let Some(root) = cli.tracks_root {
        layout.tracks_root = root;
    }
    if let Some(root) = cli.traj_root {
        layout.traj_root = root;
    }
    let config = PipelineConfig {
        workers: cli.workers,
        fit: FitConfig {
            tolerance: cli.tolerance,
            ..Default::default()
        },
    };

    let driver = Driver::new(layout, config)?;
    let start = std::time::Instant::now();
    let outcomes = driver.run(&request)?;
    let elapsed = start.elapsed();

    for outcome in &outcomes {
        tracing::debug!(index = outcome.index(), skipped = outcome.is_skipped(), "file done");
    }
    let skipped = outcomes.iter().filter(|o| o.is_skipped()).count();
    println!(
        "Done: {} files computed, {} skipped, elapsed={:.2}s",
        outcomes.len() - skipped,
        skipped,
        elapsed.as_secs_f64(),
    );

    if let Some(path) = cli.summary {
        write_summary(&path, &request, &outcomes, elapsed.as_secs_f64())?;
        println!("Summary saved to {}", path.display());
    }

    Ok(())
}

fn write_summary(
    path: &std::path::Path,
    request: &RunRequest,
    outcomes: &[FileOutcome],
    elapsed_s: f64,
) -> Result<()> {
    let json = serde_json::json!({
        "scenario": request.scenario,
        "recalculate": request.recalculate,
        "elapsed_s": elapsed_s,
        "files": outcomes,
    });
    std::fs::write(path, serde_json::to_string_pretty(&json)?)?;
    Ok(())
}
