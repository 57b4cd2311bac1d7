//! Fundamental types used across the entire workspace.

use crate::bezier::{BezierPath, FitError, FitQuality};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Scalar type: f64 throughout, positions are metres in the map frame.
// ---------------------------------------------------------------------------

/// 2D position [x, y]
pub type Point2 = Vector2<f64>;

// ---------------------------------------------------------------------------
// Identifier types
// ---------------------------------------------------------------------------

/// Track identifier, unique within one recorded track file.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Track input
// ---------------------------------------------------------------------------

/// One observed state of a track at one instant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Recording timestamp in milliseconds
    pub timestamp_ms: u64,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Heading (rad); absent for agents recorded without orientation
    pub psi_rad: Option<f64>,
}

impl MotionSample {
    /// Sample with only a position, all other fields zeroed.
    pub fn at(timestamp_ms: u64, x: f64, y: f64) -> Self {
        Self {
            timestamp_ms,
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            psi_rad: None,
        }
    }

    pub fn position(&self) -> Point2 {
        Point2::new(self.x, self.y)
    }
}

/// A recorded agent track: identifier, metadata and time-ordered samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    /// Agent class as written in the recording (e.g. "car", "truck")
    pub agent_type: String,
    /// Vehicle length (m), if recorded
    pub length: Option<f64>,
    /// Vehicle width (m), if recorded
    pub width: Option<f64>,
    /// Samples in observation order
    pub samples: Vec<MotionSample>,
}

impl Track {
    pub fn new(id: TrackId, agent_type: impl Into<String>) -> Self {
        Self {
            id,
            agent_type: agent_type.into(),
            length: None,
            width: None,
            samples: Vec::new(),
        }
    }

    /// Build a track from bare (x, y) positions, 100 ms apart.
    pub fn from_positions(id: TrackId, positions: &[(f64, f64)]) -> Self {
        let mut track = Self::new(id, "car");
        track.samples = positions
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| MotionSample::at(i as u64 * 100, x, y))
            .collect();
        track
    }

    /// Positions in iteration order.
    pub fn positions(&self) -> Vec<Point2> {
        self.samples.iter().map(MotionSample::position).collect()
    }

    pub fn first_timestamp_ms(&self) -> Option<u64> {
        self.samples.first().map(|s| s.timestamp_ms)
    }

    pub fn last_timestamp_ms(&self) -> Option<u64> {
        self.samples.last().map(|s| s.timestamp_ms)
    }
}

/// All tracks of one recorded file, keyed by identifier.
pub type TrackCollection = BTreeMap<TrackId, Track>;

// ---------------------------------------------------------------------------
// Trajectory output
// ---------------------------------------------------------------------------

/// Result of fitting one track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FitOutcome {
    Fitted {
        curve: BezierPath,
        quality: FitQuality,
    },
    Failed {
        reason: FitError,
    },
}

/// Smoothed representation of one track. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub track_id: TrackId,
    pub agent_type: String,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub first_timestamp_ms: Option<u64>,
    pub last_timestamp_ms: Option<u64>,
    /// Number of samples the fit was computed from
    pub n_samples: usize,
    pub outcome: FitOutcome,
}

impl Trajectory {
    /// True when the fit did not succeed.
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, FitOutcome::Failed { .. })
    }

    /// Fitted curve, `None` for failed tracks.
    pub fn curve(&self) -> Option<&BezierPath> {
        match &self.outcome {
            FitOutcome::Fitted { curve, .. } => Some(curve),
            FitOutcome::Failed { .. } => None,
        }
    }

    pub fn quality(&self) -> Option<&FitQuality> {
        match &self.outcome {
            FitOutcome::Fitted { quality, .. } => Some(quality),
            FitOutcome::Failed { .. } => None,
        }
    }

    pub fn failure(&self) -> Option<&FitError> {
        match &self.outcome {
            FitOutcome::Fitted { .. } => None,
            FitOutcome::Failed { reason } => Some(reason),
        }
    }
}

/// Trajectories of one batch, keyed by source track identifier.
///
/// Ordered so that the serialized form is identical for identical content.
pub type TrajectoryCollection = BTreeMap<TrackId, Trajectory>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_from_positions_orders_timestamps() {
        let track = Track::from_positions(TrackId(3), &[(0.0, 0.0), (1.0, 2.0), (2.0, 4.0)]);
        assert_eq!(track.samples.len(), 3);
        assert_eq!(track.first_timestamp_ms(), Some(0));
        assert_eq!(track.last_timestamp_ms(), Some(200));
        assert_eq!(track.positions()[1], Point2::new(1.0, 2.0));
    }

    #[test]
    fn empty_track_has_no_timestamps() {
        let track = Track::new(TrackId(1), "car");
        assert!(track.first_timestamp_ms().is_none());
        assert!(track.positions().is_empty());
    }

    #[test]
    fn track_id_display() {
        assert_eq!(TrackId(42).to_string(), "T42");
    }
}
