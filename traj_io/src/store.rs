//! Trajectory store: save/load a trajectory collection as a binary file.
//!
//! File layout: 4-byte magic `TRAJ`, `u32` format version, then the
//! bincode-encoded collection. Writes go to a temporary file in the target
//! directory which is renamed into place, so a reader never sees a partial
//! file.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use traj_core::types::TrajectoryCollection;

/// Required file-name ending of trajectory files.
pub const TRAJ_FILE_SUFFIX: &str = "_trajs.bin";

const MAGIC: &[u8; 4] = b"TRAJ";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file name {} is not a {} file", .0.display(), TRAJ_FILE_SUFFIX)]
    WrongSuffix(PathBuf),

    #[error("{} is not a trajectory file", .0.display())]
    NotTrajectoryFile(PathBuf),

    #[error("unsupported trajectory file version {found} (expected {})", FORMAT_VERSION)]
    UnsupportedVersion { found: u32 },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode trajectories: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode trajectories: {0}")]
    Decode(#[source] bincode::Error),
}

/// True when `path` ends in [`TRAJ_FILE_SUFFIX`].
pub fn has_traj_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(TRAJ_FILE_SUFFIX))
}

/// True if a trajectory file already exists at `path`.
pub fn trajectory_file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Save a trajectory collection to `path`, replacing any existing file.
pub fn save_trajectories(collection: &TrajectoryCollection, path: &Path) -> Result<(), StoreError> {
    if !has_traj_suffix(path) {
        return Err(StoreError::WrongSuffix(path.to_path_buf()));
    }
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir)?;
    let mut writer = BufWriter::new(tmp);
    writer.write_all(MAGIC)?;
    bincode::serialize_into(&mut writer, &FORMAT_VERSION).map_err(StoreError::Encode)?;
    bincode::serialize_into(&mut writer, collection).map_err(StoreError::Encode)?;
    let tmp = writer.into_inner().map_err(|e| e.into_error())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    tracing::info!(path = %path.display(), trajectories = collection.len(), "saved trajectories");
    Ok(())
}

/// Load a trajectory collection written by [`save_trajectories`].
pub fn load_trajectories(path: &Path) -> Result<TrajectoryCollection, StoreError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader
        .read_exact(&mut magic)
        .map_err(|_| StoreError::NotTrajectoryFile(path.to_path_buf()))?;
    if &magic != MAGIC {
        return Err(StoreError::NotTrajectoryFile(path.to_path_buf()));
    }

    let found: u32 = bincode::deserialize_from(&mut reader).map_err(StoreError::Decode)?;
    if found != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion { found });
    }
    let collection: TrajectoryCollection =
        bincode::deserialize_from(&mut reader).map_err(StoreError::Decode)?;
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use traj_core::bezier::FitConfig;
    use traj_core::track::calculate_trajectory;
    use traj_core::types::{Track, TrackId};

    fn sample_collection() -> TrajectoryCollection {
        let cfg = FitConfig::default();
        [
            Track::from_positions(TrackId(7), &[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)]),
            Track::from_positions(TrackId(8), &[(5.0, 5.0)]),
            Track::from_positions(
                TrackId(9),
                &(0..200)
                    .map(|i| {
                        let x = i as f64 * 0.7;
                        (x, 8.0 * (x / 12.0).sin())
                    })
                    .collect::<Vec<_>>(),
            ),
        ]
        .iter()
        .map(|t| (t.id, calculate_trajectory(t, &cfg)))
        .collect()
    }

    #[test]
    fn save_then_load_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vehicle_tracks_000_trajs.bin");
        let collection = sample_collection();

        save_trajectories(&collection, &path).unwrap();
        assert!(trajectory_file_exists(&path));
        let loaded = load_trajectories(&path).unwrap();

        assert_eq!(loaded, collection);
        assert!(loaded[&TrackId(8)].is_failed());
        assert!(loaded[&TrackId(9)].curve().unwrap().len() > 1);
    }

    #[test]
    fn identical_content_gives_identical_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a_trajs.bin");
        let b = dir.path().join("b_trajs.bin");
        save_trajectories(&sample_collection(), &a).unwrap();
        save_trajectories(&sample_collection(), &b).unwrap();
        assert_eq!(std::fs::read(a).unwrap(), std::fs::read(b).unwrap());
    }

    #[test]
    fn wrong_suffix_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vehicle_tracks_000.pickle");
        let err = save_trajectories(&sample_collection(), &path).unwrap_err();
        assert!(matches!(err, StoreError::WrongSuffix(_)));
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("x_trajs.bin");
        let err = save_trajectories(&sample_collection(), &path).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_trajectories(&dir.path().join("none_trajs.bin")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!trajectory_file_exists(&dir.path().join("none_trajs.bin")));
    }

    #[test]
    fn load_rejects_foreign_and_truncated_files() {
        let dir = tempfile::tempdir().unwrap();

        let foreign = dir.path().join("foreign_trajs.bin");
        std::fs::write(&foreign, b"track_id,frame_id\n1,2\n").unwrap();
        assert!(matches!(
            load_trajectories(&foreign).unwrap_err(),
            StoreError::NotTrajectoryFile(_)
        ));

        let good = dir.path().join("good_trajs.bin");
        save_trajectories(&sample_collection(), &good).unwrap();
        let bytes = std::fs::read(&good).unwrap();
        let truncated = dir.path().join("truncated_trajs.bin");
        std::fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();
        assert!(matches!(
            load_trajectories(&truncated).unwrap_err(),
            StoreError::Decode(_)
        ));
    }

    #[test]
    fn load_rejects_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future_trajs.bin");
        let mut bytes = MAGIC.to_vec();
        bytes.extend(bincode::serialize(&99u32).unwrap());
        std::fs::write(&path, bytes).unwrap();
        assert!(matches!(
            load_trajectories(&path).unwrap_err(),
            StoreError::UnsupportedVersion { found: 99 }
        ));
    }
}
