//! Batch metrics: fit success counts, RMS / max fit error, segment totals.

use crate::types::{Trajectory, TrajectoryCollection};
use serde::{Deserialize, Serialize};

/// Accumulated fit statistics over a trajectory collection.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// Number of trajectories evaluated
    pub n_tracks: u64,
    /// Trajectories with a fitted curve
    pub n_fitted: u64,
    /// Trajectories flagged as failed
    pub n_failed: u64,
    /// Total Bezier segments over all fitted trajectories
    pub n_segments: u64,
    /// Sum of per-track RMS errors (for the mean)
    pub sum_rms_error: f64,
    /// Worst sample-to-curve distance seen in any track (m)
    pub max_error: f64,
}

impl BatchMetrics {
    pub fn from_collection(collection: &TrajectoryCollection) -> Self {
        let mut metrics = Self::default();
        for traj in collection.values() {
            metrics.accumulate(traj);
        }
        metrics
    }

    /// Add one trajectory.
    pub fn accumulate(&mut self, traj: &Trajectory) {
        self.n_tracks += 1;
        match traj.quality() {
            Some(q) => {
                self.n_fitted += 1;
                self.n_segments += q.segments as u64;
                self.sum_rms_error += q.rms_error;
                self.max_error = self.max_error.max(q.max_error);
            }
            None => self.n_failed += 1,
        }
    }

    /// Mean of per-track RMS errors over fitted tracks (m).
    pub fn mean_rms_error(&self) -> f64 {
        if self.n_fitted == 0 {
            return 0.0;
        }
        self.sum_rms_error / self.n_fitted as f64
    }

    /// Failed / total
    pub fn failure_rate(&self) -> f64 {
        if self.n_tracks == 0 {
            0.0
        } else {
            self.n_failed as f64 / self.n_tracks as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bezier::FitConfig;
    use crate::track::calculate_trajectory;
    use crate::types::{Track, TrackId};
    use approx::assert_abs_diff_eq;

    #[test]
    fn counts_fitted_and_failed() {
        let cfg = FitConfig::default();
        let mut collection = TrajectoryCollection::new();
        for (id, positions) in [
            (1, vec![(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]),
            (2, vec![(0.0, 0.0), (4.0, 0.0)]),
            (3, vec![(5.0, 5.0)]),
        ] {
            let track = Track::from_positions(TrackId(id), &positions);
            collection.insert(track.id, calculate_trajectory(&track, &cfg));
        }

        let m = BatchMetrics::from_collection(&collection);
        assert_eq!(m.n_tracks, 3);
        assert_eq!(m.n_fitted, 2);
        assert_eq!(m.n_failed, 1);
        assert_eq!(m.n_segments, 2);
        assert_abs_diff_eq!(m.failure_rate(), 1.0 / 3.0, epsilon = 1e-12);
        assert!(m.mean_rms_error() < 1e-9);
    }

    #[test]
    fn empty_collection() {
        let m = BatchMetrics::from_collection(&TrajectoryCollection::new());
        assert_eq!(m.n_tracks, 0);
        assert_eq!(m.failure_rate(), 0.0);
        assert_eq!(m.mean_rms_error(), 0.0);
    }
}
