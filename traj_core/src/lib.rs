//! `traj_core` — Bezier trajectory fitting for recorded agent tracks.
//!
//! # Module layout
//! - [`types`]    — Fundamental types (IDs, tracks, trajectories, collections)
//! - [`bezier`]   — Curve fitter: piecewise cubic Bezier least-squares fit
//! - [`track`]    — Track processor: one track → one trajectory
//! - [`pipeline`] — Batch coordinator over a bounded worker pool
//! - [`metrics`]  — Fit success counts and error statistics

pub mod bezier;
pub mod metrics;
pub mod pipeline;
pub mod track;
pub mod types;

pub use bezier::{fit_bezier, BezierFit, BezierPath, CubicBezier, FitConfig, FitError, FitQuality};
pub use metrics::BatchMetrics;
pub use pipeline::{BatchError, Pipeline, PipelineConfig};
pub use track::calculate_trajectory;
pub use types::{
    FitOutcome, MotionSample, Point2, Track, TrackCollection, TrackId, Trajectory,
    TrajectoryCollection,
};
