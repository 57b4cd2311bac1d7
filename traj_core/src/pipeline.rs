//! Batch coordinator: fits every track of one recorded file on a bounded pool.
//!
//! # Processing steps per batch
//! 1. Submit one unit of work per track to the worker pool
//! 2. Each unit fits its track in isolation (read-only borrowed input)
//! 3. A panic inside a unit is caught at the unit boundary and aborts the batch
//! 4. Barrier: the call returns only once every unit has finished
//! 5. Results are keyed by track id, so completion order is irrelevant

use crate::{
    bezier::FitConfig,
    track::calculate_trajectory,
    types::{Track, TrackCollection, TrackId, Trajectory, TrajectoryCollection},
};
use rayon::prelude::*;
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::atomic::{AtomicUsize, Ordering},
    time::Instant,
};
use thiserror::Error;

/// Default size of the worker pool.
pub const DEFAULT_WORKERS: usize = 10;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Configuration for the batch pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Number of worker threads fitting tracks concurrently.
    pub workers: usize,
    /// Curve fitter settings used by every unit.
    pub fit: FitConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            fit: FitConfig::default(),
        }
    }
}

/// Batch-level failures. Per-track fit failures are not errors.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("worker pool needs at least one worker")]
    NoWorkers,

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("worker panicked while fitting track {track_id}: {message}")]
    WorkerPanicked { track_id: TrackId, message: String },
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Owns the worker pool and fits whole track collections.
pub struct Pipeline {
    pub config: PipelineConfig,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    /// Create a pipeline with a dedicated pool of `config.workers` threads.
    pub fn new(config: PipelineConfig) -> Result<Self, BatchError> {
        if config.workers == 0 {
            return Err(BatchError::NoWorkers);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("traj-worker-{i}"))
            .build()?;
        Ok(Self { config, pool })
    }

    /// Fit every track. Returns exactly one trajectory per input track.
    pub fn process_batch(
        &self,
        tracks: &TrackCollection,
    ) -> Result<TrajectoryCollection, BatchError> {
        let fit = &self.config.fit;
        self.run_units(tracks, |track| calculate_trajectory(track, fit))
    }

    fn run_units<F>(
        &self,
        tracks: &TrackCollection,
        unit: F,
    ) -> Result<TrajectoryCollection, BatchError>
    where
        F: Fn(&Track) -> Trajectory + Sync,
    {
        let start = Instant::now();
        let total = tracks.len();
        let done = AtomicUsize::new(0);
        tracing::info!(tracks = total, workers = self.config.workers, "fitting batch");

        let results: Vec<(TrackId, Trajectory)> = self.pool.install(|| {
            tracks
                .par_iter()
                .map(|(&id, track)| {
                    let traj = panic::catch_unwind(AssertUnwindSafe(|| unit(track))).map_err(
                        |payload| BatchError::WorkerPanicked {
                            track_id: id,
                            message: panic_message(payload.as_ref()),
                        },
                    )?;
                    report_progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                    Ok((id, traj))
                })
                .collect::<Result<Vec<_>, BatchError>>()
        })?;

        let collection: TrajectoryCollection = results.into_iter().collect();
        debug_assert_eq!(collection.len(), total);

        let failed = collection.values().filter(|t| t.is_failed()).count();
        tracing::info!(
            tracks = total,
            failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "batch fitted"
        );
        Ok(collection)
    }
}

/// Log at every completed tenth of the batch.
fn report_progress(done: usize, total: usize) {
    if total == 0 {
        return;
    }
    if done * 10 / total != (done - 1) * 10 / total {
        tracing::info!(
            done,
            total,
            "progress {:.0}%",
            done as f64 / total as f64 * 100.0
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn make_tracks(specs: Vec<(u32, Vec<(f64, f64)>)>) -> TrackCollection {
        specs
            .into_iter()
            .map(|(id, positions)| (TrackId(id), Track::from_positions(TrackId(id), &positions)))
            .collect()
    }

    fn random_tracks(n: u32, seed: u64) -> TrackCollection {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..n)
            .map(|id| {
                let len = rng.gen_range(0..80);
                let mut x = 0.0_f64;
                let mut y = 0.0_f64;
                let positions: Vec<(f64, f64)> = (0..len)
                    .map(|_| {
                        x += rng.gen_range(0.0..1.5);
                        y += rng.gen_range(-0.5..0.5);
                        (x, y)
                    })
                    .collect();
                (TrackId(id), Track::from_positions(TrackId(id), &positions))
            })
            .collect()
    }

    #[test]
    fn one_trajectory_per_track() {
        let tracks = make_tracks(vec![
            (7, vec![(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]),
            (8, vec![(5.0, 5.0)]),
            (9, vec![]),
        ]);
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let out = pipeline.process_batch(&tracks).unwrap();

        assert_eq!(out.len(), tracks.len());
        assert!(out.keys().eq(tracks.keys()));
        assert!(!out[&TrackId(7)].is_failed());
        assert!(out[&TrackId(8)].is_failed());
        assert!(out[&TrackId(9)].is_failed());
    }

    #[test]
    fn random_batch_keeps_all_keys() {
        let tracks = random_tracks(300, 11);
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let out = pipeline.process_batch(&tracks).unwrap();
        assert_eq!(out.len(), 300);
        for (id, traj) in &out {
            assert_eq!(*id, traj.track_id);
            assert_eq!(traj.n_samples, tracks[id].samples.len());
        }
    }

    #[test]
    fn worker_count_does_not_change_results() {
        let tracks = random_tracks(120, 3);
        let single = Pipeline::new(PipelineConfig {
            workers: 1,
            ..Default::default()
        })
        .unwrap();
        let many = Pipeline::new(PipelineConfig::default()).unwrap();
        assert_eq!(
            single.process_batch(&tracks).unwrap(),
            many.process_batch(&tracks).unwrap()
        );
    }

    #[test]
    fn empty_batch() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        assert!(pipeline
            .process_batch(&TrackCollection::new())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn zero_workers_rejected() {
        let err = Pipeline::new(PipelineConfig {
            workers: 0,
            ..Default::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, BatchError::NoWorkers));
    }

    #[test]
    fn panicking_unit_aborts_batch() {
        let tracks = make_tracks(vec![
            (1, vec![(0.0, 0.0), (1.0, 0.0)]),
            (2, vec![(0.0, 0.0), (0.0, 1.0)]),
        ]);
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let fit = FitConfig::default();
        let err = pipeline
            .run_units(&tracks, |track| {
                if track.id == TrackId(2) {
                    panic!("corrupt track");
                }
                calculate_trajectory(track, &fit)
            })
            .unwrap_err();

        match err {
            BatchError::WorkerPanicked { track_id, message } => {
                assert_eq!(track_id, TrackId(2));
                assert_eq!(message, "corrupt track");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
