//! Mindfold: Folder-Mirrored Mind Maps
//!
//! A mind-map persistence core whose nodes are mirrored onto directories:
//! one folder per node, with a JSON sidecar document holding the node's
//! attributes, declared child list, and cross connections. The library
//! keeps the in-memory tree, the connection graph, and the on-disk mirror
//! mutually consistent under incremental edits, lazy loading, and partial
//! visibility.

pub mod config;
pub mod error;
pub mod folders;
pub mod layout;
pub mod logging;
pub mod map;
pub mod node;
pub mod sidecar;
pub mod tooling;
pub mod types;
