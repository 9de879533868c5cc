//! JSON Sidecar Codec
//!
//! Each node folder holds exactly one `node.json` document with the node's
//! persisted attributes, declared child list, and connection references.
//! The codec supports whole-document rewrite and single-field patches; a
//! missing or unparsable document degrades to the default document with a
//! logged warning rather than aborting the load.

use crate::error::{MapError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Sidecar file name, one per node folder.
pub const SIDECAR_NAME: &str = "node.json";

/// Persisted node document. The `children` array declares which children
/// exist on disk; it says nothing about in-memory materialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDocument {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_expanded")]
    pub expanded: bool,
    #[serde(default)]
    pub position_x: f64,
    #[serde(default)]
    pub position_y: f64,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub connections: Vec<String>,
}

fn default_color() -> String {
    crate::types::Color::DEFAULT.to_hex()
}

fn default_expanded() -> bool {
    true
}

impl Default for NodeDocument {
    fn default() -> Self {
        Self {
            text: String::new(),
            color: default_color(),
            expanded: default_expanded(),
            position_x: 0.0,
            position_y: 0.0,
            path: String::new(),
            tags: Vec::new(),
            children: Vec::new(),
            connections: Vec::new(),
        }
    }
}

/// Patch operation for [`patch_field`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOp {
    /// Replace the field with the given value.
    Set,
    /// Append the value to an array field.
    Append,
    /// Remove the first exact-match occurrence from an array field.
    Remove,
}

pub fn sidecar_path(folder: &Path) -> PathBuf {
    folder.join(SIDECAR_NAME)
}

/// Read a node document. Absent or corrupt sidecars yield the default
/// document; corruption is surfaced as a warning, never as a failure.
pub fn read_document(folder: &Path) -> NodeDocument {
    let path = sidecar_path(folder);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return NodeDocument::default(),
        Err(e) => {
            warn!("Failed to read sidecar {}: {}", path.display(), e);
            return NodeDocument::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(
                "Corrupt sidecar {}: {}; falling back to defaults",
                path.display(),
                e
            );
            NodeDocument::default()
        }
    }
}

/// Overwrite the folder's sidecar with the given document.
pub fn write_document(folder: &Path, doc: &NodeDocument) -> Result<()> {
    let path = sidecar_path(folder);
    let raw = serde_json::to_string_pretty(doc).map_err(|e| MapError::Sidecar {
        path: path.clone(),
        message: e.to_string(),
    })?;
    fs::write(&path, raw).map_err(|e| MapError::io("write", path, e))
}

/// Read-modify-write a single field of the sidecar document.
///
/// `Append` and `Remove` require the field to hold an array; applying them
/// to a scalar field is a contract violation and fails without writing.
pub fn patch_field(folder: &Path, field: &str, value: Value, op: PatchOp) -> Result<()> {
    let path = sidecar_path(folder);
    let mut doc = read_value(folder);
    let obj = doc.as_object_mut().ok_or_else(|| MapError::Sidecar {
        path: path.clone(),
        message: "document root is not an object".to_string(),
    })?;

    match op {
        PatchOp::Set => {
            obj.insert(field.to_string(), value);
        }
        PatchOp::Append => {
            let slot = obj.entry(field.to_string()).or_insert_with(|| Value::Array(Vec::new()));
            let items = slot.as_array_mut().ok_or_else(|| MapError::NotAnArray {
                field: field.to_string(),
                path: path.clone(),
            })?;
            items.push(value);
        }
        PatchOp::Remove => {
            if let Some(slot) = obj.get_mut(field) {
                let items = slot.as_array_mut().ok_or_else(|| MapError::NotAnArray {
                    field: field.to_string(),
                    path: path.clone(),
                })?;
                if let Some(idx) = items.iter().position(|item| *item == value) {
                    items.remove(idx);
                }
            }
        }
    }

    let raw = serde_json::to_string_pretty(&doc).map_err(|e| MapError::Sidecar {
        path: path.clone(),
        message: e.to_string(),
    })?;
    fs::write(&path, raw).map_err(|e| MapError::io("write", path, e))
}

/// Raw JSON view of the sidecar, for patching. Degrades to an empty object
/// on absence or corruption, same policy as [`read_document`].
fn read_value(folder: &Path) -> Value {
    let path = sidecar_path(folder);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(_) => return Value::Object(Map::new()),
    };
    match serde_json::from_str(&raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(_) | Err(_) => {
            warn!(
                "Corrupt sidecar {}; patch starts from an empty document",
                path.display()
            );
            Value::Object(Map::new())
        }
    }
}
