//! Shared fixtures for the integration suite.

use mindfold::map::MindMap;
use std::path::PathBuf;
use tempfile::TempDir;

/// Fresh map in a scratch directory. The TempDir must outlive the map.
pub fn scratch_map(text: &str) -> (TempDir, MindMap) {
    let dir = TempDir::new().unwrap();
    let map = MindMap::create_map(&dir.path().join("map"), text).unwrap();
    (dir, map)
}

pub fn map_root(dir: &TempDir) -> PathBuf {
    dir.path().join("map")
}
