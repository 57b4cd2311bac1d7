//! Recorded track file reader.
//!
//! One CSV row per agent per frame:
//! `track_id,frame_id,timestamp_ms,agent_type,x,y,vx,vy,psi_rad,length,width`.
//! Pedestrian recordings leave out heading and size, so those columns may be
//! absent or empty.

use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use traj_core::types::{MotionSample, Track, TrackCollection, TrackId};

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read track file {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

#[derive(Debug, Deserialize)]
struct TrackRow {
    track_id: u32,
    timestamp_ms: u64,
    agent_type: String,
    x: f64,
    y: f64,
    #[serde(default)]
    vx: f64,
    #[serde(default)]
    vy: f64,
    #[serde(default)]
    psi_rad: Option<f64>,
    #[serde(default)]
    length: Option<f64>,
    #[serde(default)]
    width: Option<f64>,
}

/// Read every track of a recorded CSV file.
pub fn read_tracks(path: &Path) -> Result<TrackCollection, ReadError> {
    let wrap = |source: csv::Error| ReadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(wrap)?;
    let tracks = collect_tracks(reader).map_err(wrap)?;
    tracing::info!(path = %path.display(), tracks = tracks.len(), "loaded tracks");
    Ok(tracks)
}

/// Read tracks from any CSV source with a header row.
pub fn read_tracks_from<R: io::Read>(source: R) -> Result<TrackCollection, csv::Error> {
    collect_tracks(
        csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source),
    )
}

/// Group rows by track id, keeping file order within each track.
/// Track metadata comes from the first row of the track.
fn collect_tracks<R: io::Read>(mut reader: csv::Reader<R>) -> Result<TrackCollection, csv::Error> {
    let mut tracks = TrackCollection::new();
    for row in reader.deserialize::<TrackRow>() {
        let row = row?;
        let id = TrackId(row.track_id);
        let track = tracks.entry(id).or_insert_with(|| {
            let mut t = Track::new(id, row.agent_type.clone());
            t.length = row.length;
            t.width = row.width;
            t
        });
        track.samples.push(MotionSample {
            timestamp_ms: row.timestamp_ms,
            x: row.x,
            y: row.y,
            vx: row.vx,
            vy: row.vy,
            psi_rad: row.psi_rad,
        });
    }
    Ok(tracks)
}
