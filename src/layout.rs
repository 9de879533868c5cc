//! Layout/Visibility Engine
//!
//! Deterministic depth-first placement driven by the tree's expansion
//! state: the root sits at a caller-supplied origin, each visible node
//! occupies one row below it, indented one horizontal step per depth
//! level. Collapsed subtrees keep their last computed positions and are
//! marked invisible. The result is a pure function of tree shape and
//! expansion flags, so collapsing and re-expanding restores the exact
//! previous placement.

use crate::map::MindMap;
use crate::types::{ConnectionId, NodeId, Point};
use serde::{Deserialize, Serialize};

/// Placement steps, configurable through the `[layout]` config section.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_horizontal_step")]
    pub horizontal_step: f64,
    #[serde(default = "default_vertical_step")]
    pub vertical_step: f64,
}

fn default_horizontal_step() -> f64 {
    40.0
}

fn default_vertical_step() -> f64 {
    60.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            horizontal_step: default_horizontal_step(),
            vertical_step: default_vertical_step(),
        }
    }
}

/// Delta reported to the rendering collaborator after a layout pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapEvent {
    PositionChanged { node: NodeId, position: Point },
    VisibilityChanged { node: NodeId, visible: bool },
    ConnectionVisibilityChanged {
        connection: ConnectionId,
        visible: bool,
    },
}

impl MindMap {
    /// Recompute positions and visibility for the loaded tree, returning
    /// the deltas since the previous pass. Deterministic for a given tree
    /// and expansion state; nodes in collapsed subtrees are untouched.
    pub fn refresh_layout(&mut self, origin: Point) -> Vec<MapEvent> {
        let mut events = Vec::new();
        let mut row = 0usize;
        let root = self.root();
        self.place(root, 0, &mut row, origin, true, &mut events);

        for idx in 0..self.connections.len() {
            let conn = match self.connections[idx] {
                Some(conn) => conn,
                None => continue,
            };
            let visible = self.cached_visible(conn.source) && self.cached_visible(conn.destination);
            if conn.visible != visible {
                if let Some(slot) = self.connections[idx].as_mut() {
                    slot.visible = visible;
                }
                events.push(MapEvent::ConnectionVisibilityChanged {
                    connection: ConnectionId(idx),
                    visible,
                });
            }
        }
        events
    }

    fn place(
        &mut self,
        id: NodeId,
        depth: usize,
        row: &mut usize,
        origin: Point,
        visible: bool,
        events: &mut Vec<MapEvent>,
    ) {
        let (children, expanded) = match self.node(id) {
            Ok(record) => (record.children.clone(), record.expanded),
            Err(_) => return,
        };

        if visible {
            let position = Point::new(
                origin.x + depth as f64 * self.layout.horizontal_step,
                origin.y + *row as f64 * self.layout.vertical_step,
            );
            *row += 1;
            if let Ok(record) = self.node_mut(id) {
                if record.position != position {
                    record.position = position;
                    events.push(MapEvent::PositionChanged { node: id, position });
                }
            }
        }
        if let Ok(record) = self.node_mut(id) {
            if record.visible != visible {
                record.visible = visible;
                events.push(MapEvent::VisibilityChanged { node: id, visible });
            }
        }

        let child_visible = visible && expanded;
        for child in children {
            self.place(child, depth + 1, row, origin, child_visible, events);
        }
    }

    fn cached_visible(&self, id: NodeId) -> bool {
        self.node(id).map(|record| record.visible).unwrap_or(false)
    }
}
