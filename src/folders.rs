//! Filesystem Projector
//!
//! Maps node identity onto folder paths and keeps the directory tree in
//! step with the logical child list. Node names become path segments, so
//! they are sanitized and NFC-normalized before ever touching the
//! filesystem.

use crate::error::{MapError, Result};
use crate::sidecar::SIDECAR_NAME;
use std::fs;
use std::path::{Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Validate and normalize a node name for use as a folder name.
///
/// Rejects empty names, `.`/`..`, path separators, NUL, and the sidecar
/// file name itself (a child folder named `node.json` would collide with
/// the parent's sidecar).
pub fn sanitize_name(name: &str) -> Result<String> {
    let name: String = name.trim().nfc().collect();
    if name.is_empty() {
        return Err(MapError::InvalidName {
            name,
            reason: "name is empty",
        });
    }
    if name == "." || name == ".." {
        return Err(MapError::InvalidName {
            name,
            reason: "name is a relative path component",
        });
    }
    if name.chars().any(|c| c == '/' || c == '\\' || c == '\0') {
        return Err(MapError::InvalidName {
            name,
            reason: "name contains a path separator or NUL",
        });
    }
    if name == SIDECAR_NAME {
        return Err(MapError::InvalidName {
            name,
            reason: "name collides with the sidecar file",
        });
    }
    Ok(name)
}

/// Deterministic join of a child name under a parent folder.
pub fn child_folder_for(parent: &Path, name: &str) -> Result<PathBuf> {
    Ok(parent.join(sanitize_name(name)?))
}

/// Create the folder (and any missing parents). Idempotent.
pub fn ensure_folder(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| MapError::io("create folder", path, e))
}

/// Immediate subdirectory names of a folder, sorted for deterministic
/// discovery when a sidecar's child list is stale or absent.
pub fn list_subfolders(folder: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(folder).map_err(|e| MapError::io("list folder", folder, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MapError::io("list folder", folder, e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| MapError::io("stat entry", entry.path(), e))?;
        if !file_type.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => names.push(name),
            Err(raw) => {
                tracing::warn!("Skipping non-UTF8 folder name {:?} in {}", raw, folder.display());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Permanently delete a folder and everything under it. Callers must tear
/// down the corresponding in-memory subtree first.
pub fn remove_folder_recursive(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    fs::remove_dir_all(path).map_err(|e| MapError::io("remove folder", path, e))
}

/// Move a node folder to a new sibling name. The destination must not
/// exist; the rename is atomic at the filesystem level, so the subtree is
/// never observable in a half-moved state.
pub fn rename_folder(old: &Path, new: &Path) -> Result<()> {
    if new.exists() {
        return Err(MapError::SiblingExists {
            parent: new.parent().unwrap_or(new).to_path_buf(),
            name: new
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
    }
    fs::rename(old, new).map_err(|e| MapError::io("rename folder", old, e))
}

/// Canonical absolute form of a map root, tolerant of `..` and symlinks.
pub fn canonical_root(path: &Path) -> Result<PathBuf> {
    dunce::canonicalize(path).map_err(|e| MapError::io("canonicalize", path, e))
}
