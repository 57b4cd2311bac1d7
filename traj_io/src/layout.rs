//! Path layout of recorded track files and trajectory files.
//!
//! ```text
//! <tracks_root>/<scenario>/vehicle_tracks_000.csv
//! <traj_root>/<scenario>/vehicle_tracks_000_trajs.bin
//! ```

use crate::store::TRAJ_FILE_SUFFIX;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every problem found while resolving a path, reported together.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{}Type --help for help.", format_problems(.problems))]
pub struct LayoutError {
    pub problems: Vec<String>,
}

fn format_problems(problems: &[String]) -> String {
    problems.iter().map(|p| format!("{p}\n")).collect()
}

/// Directory roots and file-name conventions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathLayout {
    pub tracks_root: PathBuf,
    pub traj_root: PathBuf,
    pub file_prefix: String,
    pub track_suffix: String,
    pub traj_suffix: String,
    /// Zero-padded width of the file index
    pub index_width: usize,
}

impl Default for PathLayout {
    fn default() -> Self {
        Self {
            tracks_root: PathBuf::from("../recorded_trackfiles"),
            traj_root: PathBuf::from("../trajectory_files"),
            file_prefix: "vehicle_tracks_".to_string(),
            track_suffix: ".csv".to_string(),
            traj_suffix: TRAJ_FILE_SUFFIX.to_string(),
            index_width: 3,
        }
    }
}

impl PathLayout {
    /// Default conventions under the given roots.
    pub fn with_roots(tracks_root: impl Into<PathBuf>, traj_root: impl Into<PathBuf>) -> Self {
        Self {
            tracks_root: tracks_root.into(),
            traj_root: traj_root.into(),
            ..Default::default()
        }
    }

    /// `vehicle_tracks_007` for index 7.
    pub fn file_stem(&self, index: u32) -> String {
        format!("{}{:0width$}", self.file_prefix, index, width = self.index_width)
    }

    pub fn track_dir(&self, scenario: &str) -> PathBuf {
        self.tracks_root.join(scenario)
    }

    pub fn traj_dir(&self, scenario: &str) -> PathBuf {
        self.traj_root.join(scenario)
    }

    /// Input path, unchecked.
    pub fn track_file(&self, scenario: &str, index: u32) -> PathBuf {
        self.track_dir(scenario)
            .join(format!("{}{}", self.file_stem(index), self.track_suffix))
    }

    /// Output path, unchecked.
    pub fn traj_file(&self, scenario: &str, index: u32) -> PathBuf {
        self.traj_dir(scenario)
            .join(format!("{}{}", self.file_stem(index), self.traj_suffix))
    }

    /// Input path; the tracks root, scenario directory and file must exist.
    pub fn resolve_track_file(&self, scenario: &str, index: u32) -> Result<PathBuf, LayoutError> {
        let path = self.track_file(scenario, index);
        let mut problems = Vec::new();
        check_dir(&self.tracks_root, "track file directory", &mut problems);
        check_dir(&self.track_dir(scenario), "scenario directory", &mut problems);
        if !path.is_file() {
            problems.push(format!("Did not find track file \"{}\"", path.display()));
        }
        finish(path, problems)
    }

    /// Output path; the trajectory root and scenario directory must exist.
    pub fn resolve_traj_file(&self, scenario: &str, index: u32) -> Result<PathBuf, LayoutError> {
        let mut problems = Vec::new();
        check_dir(&self.traj_root, "traj file directory", &mut problems);
        check_dir(&self.traj_dir(scenario), "scenario directory", &mut problems);
        finish(self.traj_file(scenario, index), problems)
    }
}

fn check_dir(dir: &Path, what: &str, problems: &mut Vec<String>) {
    if !dir.is_dir() {
        problems.push(format!("Did not find {what} \"{}\"", dir.display()));
    }
}

fn finish(path: PathBuf, problems: Vec<String>) -> Result<PathBuf, LayoutError> {
    if problems.is_empty() {
        Ok(path)
    } else {
        Err(LayoutError { problems })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn default_naming_convention() {
        let layout = PathLayout::default();
        assert_eq!(
            layout.track_file("DR_USA_Roundabout_FT", 7),
            PathBuf::from("../recorded_trackfiles/DR_USA_Roundabout_FT/vehicle_tracks_007.csv")
        );
        assert_eq!(
            layout.traj_file("DR_USA_Roundabout_FT", 12),
            PathBuf::from("../trajectory_files/DR_USA_Roundabout_FT/vehicle_tracks_012_trajs.bin")
        );
        assert_eq!(layout.file_stem(1234), "vehicle_tracks_1234");
    }

    #[test]
    fn resolves_existing_paths() {
        let root = tempfile::tempdir().unwrap();
        let layout = PathLayout::with_roots(root.path().join("tracks"), root.path().join("trajs"));
        fs::create_dir_all(layout.track_dir("S1")).unwrap();
        fs::create_dir_all(layout.traj_dir("S1")).unwrap();
        fs::write(layout.track_file("S1", 0), "").unwrap();

        assert_eq!(
            layout.resolve_track_file("S1", 0).unwrap(),
            layout.track_file("S1", 0)
        );
        assert_eq!(
            layout.resolve_traj_file("S1", 0).unwrap(),
            layout.traj_file("S1", 0)
        );
    }

    #[test]
    fn reports_every_missing_path() {
        let root = tempfile::tempdir().unwrap();
        let layout = PathLayout::with_roots(root.path().join("tracks"), root.path().join("trajs"));

        let err = layout.resolve_traj_file("S1", 0).unwrap_err();
        assert_eq!(err.problems.len(), 2);
        assert!(err.problems[0].contains("traj file directory"));
        assert!(err.problems[1].contains("scenario directory"));

        let err = layout.resolve_track_file("S1", 0).unwrap_err();
        assert_eq!(err.problems.len(), 3);
        let msg = err.to_string();
        assert!(msg.contains("vehicle_tracks_000.csv"));
        assert!(msg.ends_with("Type --help for help."));
    }

    #[test]
    fn missing_file_only() {
        let root = tempfile::tempdir().unwrap();
        let layout = PathLayout::with_roots(root.path().join("tracks"), root.path().join("trajs"));
        fs::create_dir_all(layout.track_dir("S1")).unwrap();

        let err = layout.resolve_track_file("S1", 3).unwrap_err();
        assert_eq!(err.problems.len(), 1);
        assert!(err.problems[0].contains("vehicle_tracks_003.csv"));
    }
}
