//! Batch driver: resolves the files of a scenario and runs the pipeline on them.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use traj_core::metrics::BatchMetrics;
use traj_core::pipeline::{BatchError, Pipeline, PipelineConfig};
use traj_io::layout::PathLayout;
use traj_io::reader::read_tracks;
use traj_io::store::{save_trajectories, trajectory_file_exists};

/// Invalid combination of command-line intents.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("You must specify a scenario. Type --help for help.")]
    MissingScenario,

    #[error("You must specify a track number or --all. Type --help for help.")]
    MissingSelection,

    #[error("You cannot use -a/--all with a specific track number. Type --help for help.")]
    ConflictingSelection,
}

/// Which track files of a scenario to process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileSelection {
    Single(u32),
    /// Indices 0, 1, 2, ... up to the first missing track file
    All,
}

/// A validated run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub scenario: String,
    pub selection: FileSelection,
    pub recalculate: bool,
}

impl RunRequest {
    /// Validate raw arguments. Never touches the filesystem.
    pub fn from_args(
        scenario: Option<String>,
        index: Option<u32>,
        all: bool,
        recalculate: bool,
    ) -> Result<Self, UsageError> {
        let scenario = scenario.ok_or(UsageError::MissingScenario)?;
        let selection = match (index, all) {
            (None, false) => return Err(UsageError::MissingSelection),
            (Some(_), true) => return Err(UsageError::ConflictingSelection),
            (Some(i), false) => FileSelection::Single(i),
            (None, true) => FileSelection::All,
        };
        Ok(Self {
            scenario,
            selection,
            recalculate,
        })
    }
}

/// What happened to one track file.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Computed {
        index: u32,
        path: PathBuf,
        metrics: BatchMetrics,
        elapsed_s: f64,
    },
    /// Output already existed and recalculation was not requested.
    Skipped { index: u32, path: PathBuf },
}

impl FileOutcome {
    pub fn index(&self) -> u32 {
        match self {
            Self::Computed { index, .. } | Self::Skipped { index, .. } => *index,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }
}

pub struct Driver {
    layout: PathLayout,
    pipeline: Pipeline,
}

impl Driver {
    pub fn new(layout: PathLayout, config: PipelineConfig) -> Result<Self, BatchError> {
        Ok(Self {
            layout,
            pipeline: Pipeline::new(config)?,
        })
    }

    /// Process the selected files. Stops at the first failing file.
    pub fn run(&self, request: &RunRequest) -> Result<Vec<FileOutcome>> {
        match request.selection {
            FileSelection::Single(index) => Ok(vec![self.process_file(
                &request.scenario,
                index,
                request.recalculate,
            )?]),
            FileSelection::All => {
                let mut outcomes = Vec::new();
                let mut index = 0;
                while self.layout.track_file(&request.scenario, index).is_file() {
                    outcomes.push(self.process_file(&request.scenario, index, request.recalculate)?);
                    index += 1;
                }
                if outcomes.is_empty() {
                    tracing::warn!(scenario = %request.scenario, "no track files found");
                } else {
                    tracing::info!(
                        scenario = %request.scenario,
                        files = outcomes.len(),
                        stopped_at = index,
                        "all track files processed"
                    );
                }
                Ok(outcomes)
            }
        }
    }

    /// Fit and save the trajectories of one track file.
    pub fn process_file(&self, scenario: &str, index: u32, recalculate: bool) -> Result<FileOutcome> {
        let track_path = self.layout.resolve_track_file(scenario, index)?;
        let traj_path = self.layout.resolve_traj_file(scenario, index)?;

        if trajectory_file_exists(&traj_path) && !recalculate {
            println!("[Traj] traj file already exists: {}", traj_path.display());
            return Ok(FileOutcome::Skipped {
                index,
                path: traj_path,
            });
        }

        println!("Loading track {index}...");
        let tracks = read_tracks(&track_path)?;

        println!("Calculating Trajectories for {}", self.layout.file_stem(index));
        let start = Instant::now();
        let trajectories = self
            .pipeline
            .process_batch(&tracks)
            .with_context(|| format!("fitting {}", track_path.display()))?;
        let elapsed = start.elapsed().as_secs_f64();
        println!("Trajectory calculation complete in {elapsed:.3} seconds");

        let metrics = BatchMetrics::from_collection(&trajectories);
        if metrics.n_failed > 0 {
            tracing::warn!(
                file = %track_path.display(),
                failed = metrics.n_failed,
                "some tracks could not be fitted"
            );
        }

        println!("Saving trajectories...");
        save_trajectories(&trajectories, &traj_path)?;

        Ok(FileOutcome::Computed {
            index,
            path: traj_path,
            metrics,
            elapsed_s: elapsed,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
