//! Core identity and geometry types for the mind-map persistence core.

use crate::error::MapError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arena handle for a node. Slots are never reused within a session, so a
/// handle to a destroyed or hidden node stays detectably dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Arena handle for a cross connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub(crate) usize);

impl ConnectionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// 2D position in scene coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// RGB node color, persisted as a `#RRGGBB` hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    /// Default fill for freshly created nodes.
    pub const DEFAULT: Color = Color {
        r: 135,
        g: 206,
        b: 250,
    };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::DEFAULT
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MapError::Validation(format!(
                "invalid color {s:?}: expected #RRGGBB"
            )));
        }
        let r = u8::from_str_radix(&hex[0..2], 16).map_err(|_| {
            MapError::Validation(format!("invalid color {s:?}: expected #RRGGBB"))
        })?;
        let g = u8::from_str_radix(&hex[2..4], 16).map_err(|_| {
            MapError::Validation(format!("invalid color {s:?}: expected #RRGGBB"))
        })?;
        let b = u8::from_str_radix(&hex[4..6], 16).map_err(|_| {
            MapError::Validation(format!("invalid color {s:?}: expected #RRGGBB"))
        })?;
        Ok(Color { r, g, b })
    }
}
