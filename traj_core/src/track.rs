//! Track processor: one recorded track in, one trajectory out.

use crate::{
    bezier::{fit_bezier, FitConfig},
    types::{FitOutcome, Track, Trajectory},
};

/// Fit a curve to `track` and build its trajectory record.
///
/// Fit problems (too few samples, coincident or non-finite positions) never
/// escape as errors; they are recorded in the returned trajectory's outcome.
pub fn calculate_trajectory(track: &Track, config: &FitConfig) -> Trajectory {
    let positions = track.positions();

    let outcome = match fit_bezier(&positions, config) {
        Ok(fit) => FitOutcome::Fitted {
            curve: fit.path,
            quality: fit.quality,
        },
        Err(reason) => FitOutcome::Failed { reason },
    };

    match &outcome {
        FitOutcome::Fitted { quality, .. } => tracing::debug!(
            track = %track.id,
            segments = quality.segments,
            max_error = quality.max_error,
            "track finished"
        ),
        FitOutcome::Failed { reason } => {
            tracing::debug!(track = %track.id, %reason, "track fit failed")
        }
    }

    Trajectory {
        track_id: track.id,
        agent_type: track.agent_type.clone(),
        length: track.length,
        width: track.width,
        first_timestamp_ms: track.first_timestamp_ms(),
        last_timestamp_ms: track.last_timestamp_ms(),
        n_samples: positions.len(),
        outcome,
    }
}
