//! Tree & Connection Graph
//!
//! `MindMap` owns the node arena and the connection slab, and is the only
//! component that composes the sidecar codec and the filesystem projector
//! into whole operations. Every mutation keeps three representations in
//! step: the in-memory tree, the cross-connection edges, and the on-disk
//! folder+JSON mirror.
//!
//! The persisted child list in each sidecar is the source of truth for
//! which children exist; the in-memory child list is a partial
//! materialization of it. Loading runs in [`SyncMode::Detached`] so that
//! instantiating state that came from disk never writes back to disk.

use crate::error::{MapError, Result};
use crate::folders;
use crate::layout::LayoutConfig;
use crate::node::{Connection, NodeRecord};
use crate::sidecar::{self, PatchOp};
use crate::types::{Color, ConnectionId, NodeId, Point};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Whether a mutation mirrors itself to disk.
///
/// Passed through the mutation paths explicitly instead of a re-entrancy
/// flag on the map: loading instantiates records from persisted state and
/// must never write that state back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Normal operation: mutations are reflected in the sidecars.
    Mirror,
    /// Bulk load: mutations originate from disk and must not write back.
    Detached,
}

/// How far an explicit load materializes a subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadDepth {
    /// Follow declared children only through expanded nodes (map open).
    ExpandedOnly,
    /// Instantiate every declared descendant (explicit `load_child`).
    Full,
}

/// Outcome of a disk/tree consistency scan.
#[derive(Debug, Clone, Serialize)]
pub struct ValidateReport {
    pub folders: usize,
    pub documents: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidateReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// A mind map mirrored onto a directory tree.
pub struct MindMap {
    pub(crate) root_folder: PathBuf,
    pub(crate) nodes: Vec<Option<NodeRecord>>,
    pub(crate) connections: Vec<Option<Connection>>,
    pub(crate) root: NodeId,
    pub(crate) layout: LayoutConfig,
}

impl MindMap {
    // ------------------------------------------------------------------
    // Map lifecycle
    // ------------------------------------------------------------------

    /// Create a fresh map rooted at `root_folder`, writing the root's
    /// initial sidecar document.
    pub fn create_map(root_folder: &Path, text: &str) -> Result<Self> {
        Self::create_map_with(root_folder, text, LayoutConfig::default())
    }

    pub fn create_map_with(root_folder: &Path, text: &str, layout: LayoutConfig) -> Result<Self> {
        folders::ensure_folder(root_folder)?;
        let root_folder = folders::canonical_root(root_folder)?;
        let mut record = NodeRecord::new(text);
        record.folder_path = Some(root_folder.clone());
        let map = Self {
            root_folder: root_folder.clone(),
            nodes: vec![Some(record)],
            connections: Vec::new(),
            root: NodeId(0),
            layout,
        };
        map.persist_node(map.root)?;
        info!("Created map {:?} at {}", text, root_folder.display());
        Ok(map)
    }

    /// Open an existing map. Children of expanded nodes are materialized
    /// eagerly; collapsed subtrees stay unloaded until an explicit load.
    pub fn open_map(root_folder: &Path) -> Result<Self> {
        Self::open_map_with(root_folder, LayoutConfig::default())
    }

    pub fn open_map_with(root_folder: &Path, layout: LayoutConfig) -> Result<Self> {
        if !root_folder.is_dir() {
            return Err(MapError::io(
                "open map",
                root_folder,
                std::io::Error::new(std::io::ErrorKind::NotFound, "map root does not exist"),
            ));
        }
        let root_folder = folders::canonical_root(root_folder)?;
        let doc = sidecar::read_document(&root_folder);
        let fallback_text = root_folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "map".to_string());
        let mut record = NodeRecord::new(fallback_text);
        record.apply_document(&doc);
        if !doc.path.is_empty() && Path::new(&doc.path) != root_folder.as_path() {
            warn!(
                "Map at {} was last saved at {:?}; using the current location",
                root_folder.display(),
                doc.path
            );
        }
        record.folder_path = Some(root_folder.clone());
        let mut map = Self {
            root_folder,
            nodes: vec![Some(record)],
            connections: Vec::new(),
            root: NodeId(0),
            layout,
        };
        if doc.expanded {
            map.instantiate_children(map.root, &doc.children, LoadDepth::ExpandedOnly)?;
        }
        map.resolve_pending_connections();
        info!(
            "Opened map at {} ({} nodes loaded)",
            map.root_folder.display(),
            map.loaded_count()
        );
        Ok(map)
    }

    /// Write the full sidecar document of every loaded node, persisting
    /// positions and any state accumulated since the last save.
    pub fn save_map(&self) -> Result<()> {
        for id in self.iter_loaded() {
            self.persist_node(id)?;
        }
        debug!("Saved {} loaded nodes", self.loaded_count());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn node(&self, id: NodeId) -> Result<&NodeRecord> {
        self.nodes
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(MapError::DeadNode)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord> {
        self.nodes
            .get_mut(id.0)
            .and_then(|slot| slot.as_mut())
            .ok_or(MapError::DeadNode)
    }

    pub fn connection(&self, id: ConnectionId) -> Result<&Connection> {
        self.connections
            .get(id.0)
            .and_then(|slot| slot.as_ref())
            .ok_or(MapError::DeadConnection)
    }

    pub fn children_of(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(self.node(id)?.children.clone())
    }

    pub fn connections_of(&self, id: NodeId) -> Result<Vec<ConnectionId>> {
        Ok(self.node(id)?.connections.clone())
    }

    /// Child list as persisted on disk: existence, not materialization.
    pub fn declared_children(&self, id: NodeId) -> Result<Vec<String>> {
        let folder = self.folder_of(id)?;
        Ok(sidecar::read_document(&folder).children)
    }

    pub fn loaded_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn iter_loaded(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(i, _)| NodeId(i))
    }

    /// Loaded child whose display text or folder name matches.
    pub fn find_child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let record = self.node(parent).ok()?;
        record.children.iter().copied().find(|&c| {
            let text_matches = self.node(c).map(|r| r.text == name).unwrap_or(false);
            let folder_matches = self.folder_name(c).map(|n| n == name).unwrap_or(false);
            text_matches || folder_matches
        })
    }

    /// A node is visible when it is loaded and every ancestor is expanded.
    pub fn is_visible(&self, id: NodeId) -> Result<bool> {
        let mut cursor = self.node(id)?.parent;
        while let Some(ancestor) = cursor {
            let record = self.node(ancestor)?;
            if !record.expanded {
                return Ok(false);
            }
            cursor = record.parent;
        }
        Ok(true)
    }

    /// Map-relative path of a loaded node; the root is `"."`.
    pub fn node_rel_path(&self, id: NodeId) -> Result<String> {
        let folder = self.folder_of(id)?;
        Ok(self.rel_from_abs(&folder))
    }

    /// Loaded node at a map-relative path, if resident.
    pub fn loaded_node_at(&self, rel: &str) -> Option<NodeId> {
        if rel == "." || rel.is_empty() {
            return Some(self.root);
        }
        let mut cursor = self.root;
        for segment in rel.split('/') {
            let record = self.node(cursor).ok()?;
            cursor = record
                .children
                .iter()
                .copied()
                .find(|&c| self.folder_name(c).map(|n| n == segment).unwrap_or(false))?;
        }
        Some(cursor)
    }

    // ------------------------------------------------------------------
    // Attribute mutations (persist exactly one field each)
    // ------------------------------------------------------------------

    pub fn set_color(&mut self, id: NodeId, color: Color) -> Result<()> {
        let folder = self.folder_of(id)?;
        self.node_mut(id)?.color = color;
        sidecar::patch_field(&folder, "color", json!(color.to_hex()), PatchOp::Set)
    }

    pub fn set_position(&mut self, id: NodeId, position: Point) -> Result<()> {
        let folder = self.folder_of(id)?;
        self.node_mut(id)?.position = position;
        sidecar::patch_field(&folder, "position_x", json!(position.x), PatchOp::Set)?;
        sidecar::patch_field(&folder, "position_y", json!(position.y), PatchOp::Set)
    }

    /// Pure visibility toggle. Never loads, evicts, or destroys children.
    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) -> Result<()> {
        let folder = self.folder_of(id)?;
        self.node_mut(id)?.expanded = expanded;
        sidecar::patch_field(&folder, "expanded", json!(expanded), PatchOp::Set)
    }

    pub fn toggle_expanded(&mut self, id: NodeId) -> Result<bool> {
        let next = !self.node(id)?.expanded;
        self.set_expanded(id, next)?;
        Ok(next)
    }

    pub fn add_tag(&mut self, id: NodeId, tag: &str) -> Result<()> {
        if tag.trim().is_empty() {
            return Err(MapError::Validation("tag must not be empty".to_string()));
        }
        let folder = self.folder_of(id)?;
        self.node_mut(id)?.tags.push(tag.to_string());
        sidecar::patch_field(&folder, "tags", json!(tag), PatchOp::Append)
    }

    pub fn remove_tag(&mut self, id: NodeId, tag: &str) -> Result<()> {
        let folder = self.folder_of(id)?;
        let record = self.node_mut(id)?;
        if let Some(idx) = record.tags.iter().position(|t| t == tag) {
            record.tags.remove(idx);
        }
        sidecar::patch_field(&folder, "tags", json!(tag), PatchOp::Remove)
    }

    /// Rename a node. For non-root nodes this renames the backing folder
    /// and is the one operation that rewrites references across documents:
    /// the node's own subtree paths, the parent's child list, and every
    /// connection entry elsewhere that pointed into the moved subtree.
    /// The folder move happens first (atomically), references after, so a
    /// partial failure never loses data.
    pub fn set_text(&mut self, id: NodeId, new_text: &str) -> Result<()> {
        if id == self.root {
            // The root folder is the user-chosen map location; a root
            // rename only changes the display text.
            let folder = self.folder_of(id)?;
            self.node_mut(id)?.text = new_text.to_string();
            return sidecar::patch_field(&folder, "text", json!(new_text), PatchOp::Set);
        }

        let name = folders::sanitize_name(new_text)?;
        let old_folder = self.folder_of(id)?;
        let old_name = self.folder_name(id)?;
        if name == old_name {
            let record = self.node_mut(id)?;
            if record.text != name {
                record.text = name.clone();
                sidecar::patch_field(&old_folder, "text", json!(name), PatchOp::Set)?;
            }
            return Ok(());
        }

        let parent = self.node(id)?.parent.ok_or(MapError::DeadNode)?;
        let parent_folder = self.folder_of(parent)?;
        let declared = sidecar::read_document(&parent_folder).children;
        if declared.iter().any(|c| *c == name) || parent_folder.join(&name).exists() {
            return Err(MapError::SiblingExists {
                parent: parent_folder,
                name,
            });
        }

        let new_folder = parent_folder.join(&name);
        let old_rel = self.rel_from_abs(&old_folder);
        let new_rel = self.rel_from_abs(&new_folder);

        // 1. Move the subtree. fs::rename is atomic, so there is no
        //    half-moved window.
        folders::rename_folder(&old_folder, &new_folder)?;

        // 2. In-memory fix-up: folder paths, text, pending references.
        self.rewrite_memory_paths(id, &old_folder, &new_folder);
        self.node_mut(id)?.text = name.clone();
        for slot in self.nodes.iter_mut().flatten() {
            for pending in slot.pending_connections.iter_mut() {
                if let Some(updated) = replace_prefix(pending, &old_rel, &new_rel) {
                    *pending = updated;
                }
            }
        }

        // 3. Persisted references: subtree path fields, the renamed
        //    node's text, and connection entries in outside documents.
        sidecar::patch_field(&new_folder, "text", json!(name), PatchOp::Set)?;
        self.rewrite_after_rename(&new_folder, &old_rel, &new_rel)?;

        // 4. Parent's child list entry, order preserved.
        let updated: Vec<String> = declared
            .into_iter()
            .map(|c| if c == old_name { name.clone() } else { c })
            .collect();
        sidecar::patch_field(&parent_folder, "children", json!(updated), PatchOp::Set)?;

        info!("Renamed {} -> {}", old_rel, new_rel);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    /// Add a child node under `parent`. A duplicate (loaded or declared)
    /// is a no-op returning the existing node. Creates the child folder,
    /// writes its initial document, then records the relation in the
    /// parent's persisted child list.
    pub fn add_child(&mut self, parent: NodeId, text: &str) -> Result<NodeId> {
        let name = folders::sanitize_name(text)?;
        let parent_folder = self.folder_of(parent)?;

        if let Some(existing) = self.find_child(parent, &name) {
            debug!("Child {:?} already present under {}", name, parent);
            return Ok(existing);
        }
        let declared = sidecar::read_document(&parent_folder).children;
        if declared.iter().any(|c| *c == name) {
            // Declared on disk but not resident: materialize instead of
            // duplicating the folder.
            return self.load_child(parent, &name);
        }

        let folder = folders::child_folder_for(&parent_folder, &name)?;
        folders::ensure_folder(&folder)?;

        let mut record = NodeRecord::new(name.clone());
        record.folder_path = Some(folder);
        record.parent = Some(parent);
        record.position = self.node(parent)?.position;

        let id = self.attach_child(parent, record, SyncMode::Mirror)?;
        info!("Added child {:?} under {}", name, parent);
        Ok(id)
    }

    /// Remove a child by name. Handles both the loaded case (recursive
    /// in-memory teardown first) and the unloaded case (disk-only); either
    /// way the entry leaves the parent's persisted child list and the
    /// folder subtree is deleted.
    pub fn remove_child(&mut self, parent: NodeId, name: &str) -> Result<()> {
        let name = folders::sanitize_name(name)?;
        let parent_folder = self.folder_of(parent)?;

        if let Some(child) = self.find_child(parent, &name) {
            let child_folder = self.folder_of(child)?;
            let folder_name = self.folder_name(child)?;
            self.destroy_subtree(child)?;
            self.node_mut(parent)?.children.retain(|&c| c != child);
            sidecar::patch_field(&parent_folder, "children", json!(folder_name), PatchOp::Remove)?;
            folders::remove_folder_recursive(&child_folder)?;
            info!("Removed child {:?} under {}", name, parent);
            return Ok(());
        }

        let declared = sidecar::read_document(&parent_folder).children;
        let folder = parent_folder.join(&name);
        if !declared.iter().any(|c| *c == name) && !folder.is_dir() {
            return Err(MapError::UnknownChild {
                parent: self.node(parent)?.text.clone(),
                name,
            });
        }
        if folder.is_dir() {
            let doomed_rel = self.rel_from_abs(&folder);
            self.scrub_disk_subtree_connections(&folder, &doomed_rel)?;
        }
        sidecar::patch_field(&parent_folder, "children", json!(name), PatchOp::Remove)?;
        folders::remove_folder_recursive(&folder)?;
        info!("Removed unloaded child {:?} under {}", name, parent);
        Ok(())
    }

    /// Remove a node through its parent. The root cannot be removed.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        if id == self.root {
            return Err(MapError::RootImmutable("deleted"));
        }
        let parent = self.node(id)?.parent.ok_or(MapError::DeadNode)?;
        let name = self.folder_name(id)?;
        self.remove_child(parent, &name)
    }

    /// Materialize one declared child (and its declared descendants).
    /// Idempotent: a resident child is returned as-is.
    pub fn load_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let name = folders::sanitize_name(name)?;
        if let Some(existing) = self.find_child(parent, &name) {
            return Ok(existing);
        }
        let parent_folder = self.folder_of(parent)?;
        let declared = sidecar::read_document(&parent_folder).children;
        if !declared.iter().any(|c| *c == name) {
            return Err(MapError::UnknownChild {
                parent: self.node(parent)?.text.clone(),
                name,
            });
        }
        self.instantiate_children(parent, std::slice::from_ref(&name), LoadDepth::Full)?;
        self.resolve_pending_connections();
        self.find_child(parent, &name).ok_or(MapError::DeadNode)
    }

    /// Materialize every declared-but-unloaded child. Idempotent.
    pub fn load_all_children(&mut self, parent: NodeId) -> Result<Vec<NodeId>> {
        let parent_folder = self.folder_of(parent)?;
        let declared = sidecar::read_document(&parent_folder).children;
        self.instantiate_children(parent, &declared, LoadDepth::Full)?;
        self.resolve_pending_connections();
        Ok(self.node(parent)?.children.clone())
    }

    /// Evict a loaded child subtree from memory, children before parent.
    /// Disk state is untouched, so a later load restores it.
    pub fn hide_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        if child == self.root {
            return Err(MapError::RootImmutable("hidden"));
        }
        if self.node(child)?.parent != Some(parent) {
            return Err(MapError::Validation(format!(
                "{child} is not a child of {parent}"
            )));
        }
        self.hide_subtree(child)?;
        self.node_mut(parent)?.children.retain(|&c| c != child);
        debug!("Hid child {} under {}", child, parent);
        Ok(())
    }

    pub fn hide_all_children(&mut self, parent: NodeId) -> Result<()> {
        for child in self.children_of(parent)? {
            self.hide_child(parent, child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect two nodes. Both endpoints track the edge; each endpoint's
    /// document gains a relative-path entry for the other. Connecting a
    /// node to itself is an error; an existing edge is returned as-is.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> Result<ConnectionId> {
        if a == b {
            return Err(MapError::SelfConnection);
        }
        self.node(a)?;
        self.node(b)?;
        if let Some(existing) = self.edge_between(a, b) {
            debug!("Connection {} already joins {} and {}", existing, a, b);
            return Ok(existing);
        }

        let rel_a = self.node_rel_path(a)?;
        let rel_b = self.node_rel_path(b)?;
        let folder_a = self.folder_of(a)?;
        let folder_b = self.folder_of(b)?;

        // If the sidecars already declare this edge (the endpoint was
        // hidden and reloaded), materialize without rewriting disk.
        let a_knows = self.node(a)?.pending_connections.iter().any(|p| *p == rel_b);
        let b_knows = self.node(b)?.pending_connections.iter().any(|p| *p == rel_a);
        if a_knows {
            self.node_mut(a)?.pending_connections.retain(|p| *p != rel_b);
        } else {
            sidecar::patch_field(&folder_a, "connections", json!(rel_b), PatchOp::Append)?;
        }
        if b_knows {
            self.node_mut(b)?.pending_connections.retain(|p| *p != rel_a);
        } else {
            sidecar::patch_field(&folder_b, "connections", json!(rel_a), PatchOp::Append)?;
        }

        let id = self.alloc_connection(Connection::new(a, b));
        self.node_mut(a)?.connections.push(id);
        self.node_mut(b)?.connections.push(id);
        info!("Connected {} and {}", a, b);
        Ok(id)
    }

    /// Remove a connection from both endpoints, in memory and on disk.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<()> {
        let conn = *self.connection(id)?;
        let rel_src = self.node_rel_path(conn.source)?;
        let rel_dst = self.node_rel_path(conn.destination)?;
        sidecar::patch_field(
            &self.folder_of(conn.source)?,
            "connections",
            json!(rel_dst),
            PatchOp::Remove,
        )?;
        sidecar::patch_field(
            &self.folder_of(conn.destination)?,
            "connections",
            json!(rel_src),
            PatchOp::Remove,
        )?;
        self.node_mut(conn.source)?.connections.retain(|&c| c != id);
        self.node_mut(conn.destination)?.connections.retain(|&c| c != id);
        self.connections[id.0] = None;
        info!("Disconnected {} and {}", conn.source, conn.destination);
        Ok(())
    }

    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<ConnectionId> {
        self.connections
            .iter()
            .enumerate()
            .find(|(_, slot)| slot.map(|c| c.joins(a, b)).unwrap_or(false))
            .map(|(i, _)| ConnectionId(i))
    }

    // ------------------------------------------------------------------
    // Consistency scan
    // ------------------------------------------------------------------

    /// Walk the on-disk mirror and report folders whose documents and
    /// directory entries disagree: declared children with no folder,
    /// folders missing from any child list, stale path fields.
    pub fn validate(&self) -> Result<ValidateReport> {
        let mut report = ValidateReport {
            folders: 0,
            documents: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        for entry in WalkDir::new(&self.root_folder).min_depth(0) {
            let entry = entry.map_err(|e| MapError::Io {
                op: "walk map",
                path: self.root_folder.clone(),
                source: e.into(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            report.folders += 1;
            let folder = entry.path();
            if !sidecar::sidecar_path(folder).is_file() {
                report
                    .warnings
                    .push(format!("{} has no sidecar document", folder.display()));
                continue;
            }
            report.documents += 1;
            let doc = sidecar::read_document(folder);
            if !doc.path.is_empty() && Path::new(&doc.path) != folder {
                report.warnings.push(format!(
                    "{} records a stale path {:?}",
                    folder.display(),
                    doc.path
                ));
            }
            let present = folders::list_subfolders(folder)?;
            for declared in &doc.children {
                if !present.iter().any(|p| p == declared) {
                    report.errors.push(format!(
                        "{} declares missing child {:?}",
                        folder.display(),
                        declared
                    ));
                }
            }
            for sub in &present {
                if !doc.children.iter().any(|c| c == sub) {
                    report.warnings.push(format!(
                        "{} contains undeclared folder {:?}",
                        folder.display(),
                        sub
                    ));
                }
            }
            for target in &doc.connections {
                let missing = self
                    .abs_from_rel(target)
                    .map(|abs| !abs.is_dir())
                    .unwrap_or(true);
                if missing {
                    report.errors.push(format!(
                        "{} references missing connection target {:?}",
                        folder.display(),
                        target
                    ));
                }
            }
        }
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn alloc_node(&mut self, record: NodeRecord) -> NodeId {
        self.nodes.push(Some(record));
        NodeId(self.nodes.len() - 1)
    }

    /// Attach a child record under `parent`. In [`SyncMode::Mirror`] the
    /// child's initial document is written and the parent's persisted
    /// child list gains an entry; in [`SyncMode::Detached`] the record
    /// came from disk and nothing is written back.
    fn attach_child(&mut self, parent: NodeId, record: NodeRecord, mode: SyncMode) -> Result<NodeId> {
        if mode == SyncMode::Mirror {
            let folder = record
                .folder_path
                .clone()
                .ok_or_else(|| MapError::Validation("node has no backing folder".to_string()))?;
            let name = folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| MapError::Validation("node folder has no name".to_string()))?;
            let parent_folder = self.folder_of(parent)?;
            sidecar::write_document(&folder, &record.to_document())?;
            sidecar::patch_field(&parent_folder, "children", json!(name), PatchOp::Append)?;
        }
        let id = self.alloc_node(record);
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn alloc_connection(&mut self, conn: Connection) -> ConnectionId {
        self.connections.push(Some(conn));
        ConnectionId(self.connections.len() - 1)
    }

    pub(crate) fn folder_of(&self, id: NodeId) -> Result<PathBuf> {
        self.node(id)?
            .folder_path
            .clone()
            .ok_or_else(|| MapError::Validation("node has no backing folder".to_string()))
    }

    fn folder_name(&self, id: NodeId) -> Result<String> {
        let folder = self.folder_of(id)?;
        folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MapError::Validation("node folder has no name".to_string()))
    }

    fn rel_from_abs(&self, abs: &Path) -> String {
        match abs.strip_prefix(&self.root_folder) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => abs.to_string_lossy().into_owned(),
        }
    }

    /// Resolve a map-relative path from a document. `None` for entries
    /// that would escape the map root (corrupt or hand-edited sidecars).
    fn abs_from_rel(&self, rel: &str) -> Option<PathBuf> {
        if rel == "." || rel.is_empty() {
            return Some(self.root_folder.clone());
        }
        let mut path = self.root_folder.clone();
        for segment in rel.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                warn!("Rejecting unclean relative path {:?}", rel);
                return None;
            }
            path.push(segment);
        }
        Some(path)
    }

    /// Full-document write for one node. The persisted child list keeps
    /// entries for unloaded children; connections merge materialized
    /// edges with pending (unresolved) references.
    fn persist_node(&self, id: NodeId) -> Result<()> {
        let record = self.node(id)?;
        let folder = self.folder_of(id)?;
        let mut doc = record.to_document();

        let mut children = sidecar::read_document(&folder).children;
        for &child in &record.children {
            let name = self.folder_name(child)?;
            if !children.iter().any(|c| *c == name) {
                children.push(name);
            }
        }
        doc.children = children;

        let mut connections = Vec::new();
        for &cid in &record.connections {
            let conn = self.connection(cid)?;
            let rel = self.node_rel_path(conn.other(id))?;
            if !connections.iter().any(|c| *c == rel) {
                connections.push(rel);
            }
        }
        for pending in &record.pending_connections {
            if !connections.iter().any(|c| c == pending) {
                connections.push(pending.clone());
            }
        }
        doc.connections = connections;

        sidecar::write_document(&folder, &doc)
    }

    /// Instantiate declared children of `parent` from their sidecars.
    /// Already-resident children are skipped; missing folders are warned
    /// about and skipped; undeclared folders are surfaced for discovery.
    /// Runs detached: nothing here writes to disk.
    fn instantiate_children(
        &mut self,
        parent: NodeId,
        declared: &[String],
        depth: LoadDepth,
    ) -> Result<()> {
        let parent_folder = self.folder_of(parent)?;
        let present = folders::list_subfolders(&parent_folder)?;

        for extra in present.iter().filter(|p| !declared.iter().any(|d| d == *p)) {
            warn!(
                "Folder {:?} under {} is not in the persisted child list",
                extra,
                parent_folder.display()
            );
        }

        for name in declared {
            if self.find_child(parent, name).is_some() {
                continue;
            }
            if !present.iter().any(|p| p == name) {
                warn!(
                    "Declared child {:?} is missing on disk under {}",
                    name,
                    parent_folder.display()
                );
                continue;
            }
            let folder = parent_folder.join(name);
            let doc = sidecar::read_document(&folder);
            let mut record = NodeRecord::new(name.clone());
            record.apply_document(&doc);
            record.folder_path = Some(folder);
            record.parent = Some(parent);
            let id = self.attach_child(parent, record, SyncMode::Detached)?;

            let recurse = match depth {
                LoadDepth::Full => true,
                LoadDepth::ExpandedOnly => doc.expanded,
            };
            if recurse && !doc.children.is_empty() {
                self.instantiate_children(id, &doc.children, depth)?;
            }
        }
        Ok(())
    }

    /// Materialize edges whose declared target became resident; both
    /// endpoints drop their pending entries for the edge.
    fn resolve_pending_connections(&mut self) {
        for idx in 0..self.nodes.len() {
            let id = NodeId(idx);
            let pending = match self.nodes[idx].as_ref() {
                Some(record) => record.pending_connections.clone(),
                None => continue,
            };
            for target in pending {
                let other = match self.loaded_node_at(&target) {
                    Some(other) => other,
                    None => continue,
                };
                if other == id {
                    warn!("Dropping self-referential connection entry {:?}", target);
                    if let Ok(record) = self.node_mut(id) {
                        record.pending_connections.retain(|p| *p != target);
                    }
                    continue;
                }
                let self_rel = match self.node_rel_path(id) {
                    Ok(rel) => rel,
                    Err(_) => continue,
                };
                if self.edge_between(id, other).is_none() {
                    let cid = self.alloc_connection(Connection::new(id, other));
                    if let Ok(record) = self.node_mut(id) {
                        record.connections.push(cid);
                    }
                    if let Ok(record) = self.node_mut(other) {
                        record.connections.push(cid);
                    }
                }
                if let Ok(record) = self.node_mut(id) {
                    record.pending_connections.retain(|p| *p != target);
                }
                if let Ok(record) = self.node_mut(other) {
                    record.pending_connections.retain(|p| *p != self_rel);
                }
            }
        }
    }

    /// Post-order destruction: descendants, then incident connections,
    /// then the node itself. Folder deletion is the caller's final step.
    fn destroy_subtree(&mut self, id: NodeId) -> Result<()> {
        for child in self.children_of(id)? {
            self.destroy_subtree(child)?;
        }
        self.destroy_connections_of(id);
        self.nodes[id.0] = None;
        Ok(())
    }

    /// Drop every edge incident to a node about to be destroyed, scrubbing
    /// the surviving endpoint's memory and sidecar. Scrub failures are
    /// logged and skipped so teardown always completes.
    fn destroy_connections_of(&mut self, id: NodeId) {
        let self_rel = self.node_rel_path(id).ok();
        let record = match self.node(id) {
            Ok(record) => record.clone(),
            Err(_) => return,
        };

        for cid in record.connections {
            let conn = match self.connections.get(cid.0).and_then(|slot| *slot) {
                Some(conn) => conn,
                None => continue,
            };
            self.connections[cid.0] = None;
            let other = conn.other(id);
            if let Ok(other_record) = self.node_mut(other) {
                other_record.connections.retain(|&c| c != cid);
            }
            if let (Some(self_rel), Ok(folder)) = (self_rel.as_ref(), self.folder_of(other)) {
                if let Err(e) =
                    sidecar::patch_field(&folder, "connections", json!(self_rel), PatchOp::Remove)
                {
                    warn!("Failed to scrub connection entry in {}: {}", folder.display(), e);
                }
            }
        }

        for target in record.pending_connections {
            let abs = match self.abs_from_rel(&target) {
                Some(abs) if abs.is_dir() => abs,
                _ => continue,
            };
            if let Some(self_rel) = self_rel.as_ref() {
                if let Err(e) =
                    sidecar::patch_field(&abs, "connections", json!(self_rel), PatchOp::Remove)
                {
                    warn!("Failed to scrub connection entry in {}: {}", abs.display(), e);
                }
            }
        }
    }

    /// Disk-only cascade cleanup for an unloaded subtree about to be
    /// deleted: every connection its documents declare to targets outside
    /// the subtree is removed from the target's document (and from the
    /// target's pending list when the target is resident).
    fn scrub_disk_subtree_connections(&mut self, folder: &Path, doomed_rel: &str) -> Result<()> {
        let doc = sidecar::read_document(folder);
        let self_rel = self.rel_from_abs(folder);
        for target in &doc.connections {
            if replace_prefix(target, doomed_rel, "").is_some() || target == doomed_rel {
                continue;
            }
            if let Some(abs) = self.abs_from_rel(target).filter(|abs| abs.is_dir()) {
                if let Err(e) =
                    sidecar::patch_field(&abs, "connections", json!(self_rel), PatchOp::Remove)
                {
                    warn!("Failed to scrub connection entry in {}: {}", abs.display(), e);
                }
            }
            if let Some(other) = self.loaded_node_at(target) {
                if let Ok(record) = self.node_mut(other) {
                    record.pending_connections.retain(|p| *p != self_rel);
                }
            }
        }
        for child in &doc.children {
            self.scrub_disk_subtree_connections(&folder.join(child), doomed_rel)?;
        }
        Ok(())
    }

    /// Depth-first eviction, children before parent. Edges to survivors
    /// fall back to pending references so persistence still knows them.
    fn hide_subtree(&mut self, id: NodeId) -> Result<()> {
        for child in self.children_of(id)? {
            self.hide_subtree(child)?;
        }
        let self_rel = self.node_rel_path(id)?;
        let record = self.node(id)?.clone();
        for cid in record.connections {
            let conn = match self.connections.get(cid.0).and_then(|slot| *slot) {
                Some(conn) => conn,
                None => continue,
            };
            self.connections[cid.0] = None;
            let other = conn.other(id);
            if let Ok(other_record) = self.node_mut(other) {
                other_record.connections.retain(|&c| c != cid);
                if !other_record.pending_connections.iter().any(|p| *p == self_rel) {
                    other_record.pending_connections.push(self_rel.clone());
                }
            }
        }
        self.nodes[id.0] = None;
        Ok(())
    }

    /// Update in-memory folder paths of a moved subtree.
    fn rewrite_memory_paths(&mut self, id: NodeId, old_folder: &Path, new_folder: &Path) {
        let children = self
            .node(id)
            .map(|record| record.children.clone())
            .unwrap_or_default();
        if let Ok(record) = self.node_mut(id) {
            if let Some(folder) = record.folder_path.take() {
                let updated = match folder.strip_prefix(old_folder) {
                    Ok(rest) => new_folder.join(rest),
                    Err(_) => folder,
                };
                record.folder_path = Some(updated);
            }
        }
        for child in children {
            self.rewrite_memory_paths(child, old_folder, new_folder);
        }
    }

    /// After a folder move: rewrite the `path` field of every document in
    /// the moved subtree (loaded or not) and fix connection entries in
    /// documents outside the subtree that referenced old locations.
    fn rewrite_after_rename(&mut self, folder: &Path, old_rel: &str, new_rel: &str) -> Result<()> {
        let doc = sidecar::read_document(folder);
        sidecar::patch_field(
            folder,
            "path",
            json!(folder.to_string_lossy()),
            PatchOp::Set,
        )?;

        let self_new_rel = self.rel_from_abs(folder);
        let self_old_rel = replace_prefix(&self_new_rel, new_rel, old_rel)
            .unwrap_or_else(|| self_new_rel.clone());
        for target in &doc.connections {
            // Targets inside the moved subtree renamed with us; their
            // documents are rewritten by this same walk.
            if target == old_rel || replace_prefix(target, old_rel, new_rel).is_some() {
                let fixed = if target == old_rel {
                    new_rel.to_string()
                } else {
                    replace_prefix(target, old_rel, new_rel).unwrap_or_else(|| target.clone())
                };
                sidecar::patch_field(folder, "connections", json!(target), PatchOp::Remove)?;
                sidecar::patch_field(folder, "connections", json!(fixed), PatchOp::Append)?;
                continue;
            }
            let abs = match self.abs_from_rel(target).filter(|abs| abs.is_dir()) {
                Some(abs) => abs,
                None => {
                    warn!(
                        "Connection target {:?} referenced from {} is missing",
                        target,
                        folder.display()
                    );
                    continue;
                }
            };
            sidecar::patch_field(&abs, "connections", json!(self_old_rel), PatchOp::Remove)?;
            sidecar::patch_field(&abs, "connections", json!(self_new_rel), PatchOp::Append)?;
        }

        for child in &doc.children {
            self.rewrite_after_rename(&folder.join(child), old_rel, new_rel)?;
        }
        Ok(())
    }
}

/// Map a relative path onto a renamed prefix. Returns `None` when the
/// path is not under the old prefix.
fn replace_prefix(rel: &str, old: &str, new: &str) -> Option<String> {
    if rel == old {
        return Some(new.to_string());
    }
    rel.strip_prefix(old)
        .and_then(|rest| rest.strip_prefix('/'))
        .map(|rest| {
            if new.is_empty() {
                rest.to_string()
            } else {
                format!("{new}/{rest}")
            }
        })
}
