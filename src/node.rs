//! Node records and connection edges.
//!
//! A `NodeRecord` is the persisted unit: attributes, ownership pointers,
//! and connection bookkeeping. Records live in the map's arena and know
//! nothing about rendering.

use crate::sidecar::NodeDocument;
use crate::types::{Color, ConnectionId, NodeId, Point};
use std::path::PathBuf;
use tracing::warn;

/// In-memory materialization of one node.
#[derive(Debug, Clone)]
pub struct NodeRecord {
    pub text: String,
    pub color: Color,
    pub position: Point,
    pub expanded: bool,
    pub tags: Vec<String>,
    /// Backing directory; `None` while the node is transient.
    pub folder_path: Option<PathBuf>,
    pub parent: Option<NodeId>,
    /// Loaded children, in persisted order. Always a subset of the
    /// sidecar's declared child list.
    pub children: Vec<NodeId>,
    /// Materialized connections (both endpoints resident).
    pub connections: Vec<ConnectionId>,
    /// Declared connection targets (map-relative paths) whose other
    /// endpoint is not currently resident.
    pub pending_connections: Vec<String>,
    /// Last visibility reported to the rendering collaborator.
    pub visible: bool,
}

impl NodeRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: Color::DEFAULT,
            position: Point::default(),
            expanded: true,
            tags: Vec::new(),
            folder_path: None,
            parent: None,
            children: Vec::new(),
            connections: Vec::new(),
            pending_connections: Vec::new(),
            visible: false,
        }
    }

    /// Adopt the attribute fields of a sidecar document. Relationship
    /// fields (children, connections) are resolved by the map, not here.
    pub fn apply_document(&mut self, doc: &NodeDocument) {
        if !doc.text.is_empty() {
            self.text = doc.text.clone();
        }
        match doc.color.parse::<Color>() {
            Ok(color) => self.color = color,
            Err(_) => {
                warn!("Ignoring malformed color {:?} for {:?}", doc.color, self.text);
            }
        }
        self.expanded = doc.expanded;
        self.position = Point::new(doc.position_x, doc.position_y);
        self.tags = doc.tags.clone();
        self.pending_connections = doc.connections.clone();
    }

    /// Attribute fields of this record as a document. The map fills in
    /// `children` and rewrites `connections` with resolved paths.
    pub fn to_document(&self) -> NodeDocument {
        NodeDocument {
            text: self.text.clone(),
            color: self.color.to_hex(),
            expanded: self.expanded,
            position_x: self.position.x,
            position_y: self.position.y,
            path: self
                .folder_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            tags: self.tags.clone(),
            children: Vec::new(),
            connections: Vec::new(),
        }
    }
}

/// A non-hierarchical edge between two nodes. Owned jointly by its
/// endpoints: destroying or hiding either endpoint removes the edge.
#[derive(Debug, Clone, Copy)]
pub struct Connection {
    pub source: NodeId,
    pub destination: NodeId,
    pub visible: bool,
}

impl Connection {
    pub fn new(source: NodeId, destination: NodeId) -> Self {
        Self {
            source,
            destination,
            visible: false,
        }
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.destination == id
    }

    pub fn other(&self, id: NodeId) -> NodeId {
        if self.source == id {
            self.destination
        } else {
            self.source
        }
    }

    pub fn joins(&self, a: NodeId, b: NodeId) -> bool {
        (self.source == a && self.destination == b) || (self.source == b && self.destination == a)
    }
}
