//! `traj_io` — Track file reading, trajectory persistence, path layout.

pub mod layout;
pub mod reader;
pub mod store;

pub use layout::{LayoutError, PathLayout};
pub use reader::{read_tracks, ReadError};
pub use store::{
    load_trajectories, save_trajectories, trajectory_file_exists, StoreError, TRAJ_FILE_SUFFIX,
};
