//! CLI Tooling
//!
//! Command-line interface over the map facade. Nodes are addressed by
//! their map-relative path (`A/B`); `.` is the root. Commands load only
//! what they need and leave the sidecars as the source of truth.

use crate::config::MindfoldConfig;
use crate::error::{MapError, Result};
use crate::map::MindMap;
use crate::types::{Color, NodeId, Point};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde_json::json;
use std::path::PathBuf;

/// Mindfold CLI - folder-mirrored mind maps
#[derive(Parser)]
#[command(name = "mindfold")]
#[command(about = "Folder-mirrored mind-map persistence core")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Map root directory
    #[arg(long, default_value = ".")]
    pub map: PathBuf,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new map at the map root
    Init {
        /// Root node text
        text: String,
    },
    /// Print the node tree
    Show {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
        /// Materialize every declared node first
        #[arg(long)]
        all: bool,
    },
    /// Check that folders and sidecar documents agree
    Validate {
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Add a child node
    Add {
        /// Parent node path (`.` for the root)
        parent: String,
        /// New node text
        text: String,
    },
    /// Delete a node and its subtree, folders included
    Remove {
        path: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Rename a node, moving its folder
    Rename { path: String, text: String },
    /// Connect two nodes
    Connect { a: String, b: String },
    /// Remove the connection between two nodes
    Disconnect { a: String, b: String },
    /// Expand a node
    Expand { path: String },
    /// Collapse a node
    Collapse { path: String },
    /// Add or remove a tag
    Tag {
        path: String,
        tag: String,
        #[arg(long)]
        remove: bool,
    },
    /// Set a node's color (#RRGGBB)
    Color { path: String, color: String },
    /// Recompute layout and print visible positions
    Layout {
        #[arg(long, default_value = "0.0")]
        origin_x: f64,
        #[arg(long, default_value = "0.0")]
        origin_y: f64,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
}

pub struct CliContext {
    map_root: PathBuf,
    config: MindfoldConfig,
}

impl CliContext {
    pub fn new(map_root: PathBuf, config: MindfoldConfig) -> Self {
        Self { map_root, config }
    }

    pub fn execute(&self, command: &Commands) -> Result<String> {
        match command {
            Commands::Init { text } => {
                let map = MindMap::create_map_with(&self.map_root, text, self.config.layout)?;
                Ok(format!("created map at {}", map.root_folder().display()))
            }
            Commands::Show { format, all } => {
                let mut map = self.open()?;
                if *all {
                    let root = map.root();
                    load_everything(&mut map, root)?;
                }
                map.refresh_layout(Point::default());
                if format == "json" {
                    self.show_json(&map)
                } else {
                    self.show_table(&map)
                }
            }
            Commands::Validate { format } => {
                let map = self.open()?;
                let report = map.validate()?;
                if format == "json" {
                    serde_json::to_string_pretty(&report)
                        .map_err(|e| MapError::Config(e.to_string()))
                } else {
                    let mut lines = vec![format!(
                        "{} folders, {} documents",
                        report.folders, report.documents
                    )];
                    for err in &report.errors {
                        lines.push(format!("{} {}", "error:".red(), err));
                    }
                    for warning in &report.warnings {
                        lines.push(format!("{} {}", "warning:".yellow(), warning));
                    }
                    if report.is_clean() {
                        lines.push("map is consistent".green().to_string());
                    }
                    Ok(lines.join("\n"))
                }
            }
            Commands::Add { parent, text } => {
                let mut map = self.open()?;
                let parent_id = resolve(&mut map, parent)?;
                let id = map.add_child(parent_id, text)?;
                Ok(format!("added {}", map.node_rel_path(id)?))
            }
            Commands::Remove { path, yes } => {
                let mut map = self.open()?;
                let id = resolve(&mut map, path)?;
                if id == map.root() {
                    return Err(MapError::RootImmutable("deleted"));
                }
                if !*yes {
                    let confirmed = dialoguer::Confirm::new()
                        .with_prompt(format!("Permanently delete {path} and its subtree?"))
                        .default(false)
                        .interact()
                        .map_err(|e| MapError::Validation(format!("prompt failed: {e}")))?;
                    if !confirmed {
                        return Ok("aborted".to_string());
                    }
                }
                map.remove_node(id)?;
                Ok(format!("removed {path}"))
            }
            Commands::Rename { path, text } => {
                let mut map = self.open()?;
                let id = resolve(&mut map, path)?;
                map.set_text(id, text)?;
                Ok(format!("renamed {path} to {text}"))
            }
            Commands::Connect { a, b } => {
                let mut map = self.open()?;
                let id_a = resolve(&mut map, a)?;
                let id_b = resolve(&mut map, b)?;
                map.connect(id_a, id_b)?;
                Ok(format!("connected {a} and {b}"))
            }
            Commands::Disconnect { a, b } => {
                let mut map = self.open()?;
                let id_a = resolve(&mut map, a)?;
                let id_b = resolve(&mut map, b)?;
                let edge = map.edge_between(id_a, id_b).ok_or_else(|| {
                    MapError::Validation(format!("no connection between {a} and {b}"))
                })?;
                map.disconnect(edge)?;
                Ok(format!("disconnected {a} and {b}"))
            }
            Commands::Expand { path } => {
                let mut map = self.open()?;
                let id = resolve(&mut map, path)?;
                map.set_expanded(id, true)?;
                Ok(format!("expanded {path}"))
            }
            Commands::Collapse { path } => {
                let mut map = self.open()?;
                let id = resolve(&mut map, path)?;
                map.set_expanded(id, false)?;
                Ok(format!("collapsed {path}"))
            }
            Commands::Tag { path, tag, remove } => {
                let mut map = self.open()?;
                let id = resolve(&mut map, path)?;
                if *remove {
                    map.remove_tag(id, tag)?;
                    Ok(format!("removed tag {tag:?} from {path}"))
                } else {
                    map.add_tag(id, tag)?;
                    Ok(format!("tagged {path} with {tag:?}"))
                }
            }
            Commands::Color { path, color } => {
                let mut map = self.open()?;
                let id = resolve(&mut map, path)?;
                let color: Color = color.parse()?;
                map.set_color(id, color)?;
                Ok(format!("colored {path} {color}"))
            }
            Commands::Layout {
                origin_x,
                origin_y,
                format,
            } => {
                let mut map = self.open()?;
                let root = map.root();
                load_everything(&mut map, root)?;
                map.refresh_layout(Point::new(*origin_x, *origin_y));
                map.save_map()?;
                if format == "json" {
                    let mut entries = Vec::new();
                    for id in map.iter_loaded() {
                        let record = map.node(id)?;
                        entries.push(json!({
                            "path": map.node_rel_path(id)?,
                            "x": record.position.x,
                            "y": record.position.y,
                            "visible": record.visible,
                        }));
                    }
                    serde_json::to_string_pretty(&entries)
                        .map_err(|e| MapError::Config(e.to_string()))
                } else {
                    let mut lines = Vec::new();
                    for id in map.iter_loaded() {
                        let record = map.node(id)?;
                        let label = map.node_rel_path(id)?;
                        let line = format!(
                            "{:>8.1} {:>8.1}  {}",
                            record.position.x, record.position.y, label
                        );
                        if record.visible {
                            lines.push(line);
                        } else {
                            lines.push(format!("{}", line.dimmed()));
                        }
                    }
                    Ok(lines.join("\n"))
                }
            }
        }
    }

    fn open(&self) -> Result<MindMap> {
        MindMap::open_map_with(&self.map_root, self.config.layout)
    }

    fn show_table(&self, map: &MindMap) -> Result<String> {
        let mut table = Table::new();
        table.set_header(vec![
            "path", "text", "color", "expanded", "tags", "children", "connections",
        ]);
        let mut stack = vec![map.root()];
        while let Some(id) = stack.pop() {
            let record = map.node(id)?;
            let declared = map.declared_children(id)?;
            table.add_row(vec![
                map.node_rel_path(id)?,
                record.text.clone(),
                record.color.to_hex(),
                record.expanded.to_string(),
                record.tags.join(","),
                format!("{}/{}", record.children.len(), declared.len()),
                record.connections.len().to_string(),
            ]);
            for &child in record.children.iter().rev() {
                stack.push(child);
            }
        }
        Ok(table.to_string())
    }

    fn show_json(&self, map: &MindMap) -> Result<String> {
        let mut entries = Vec::new();
        let mut stack = vec![map.root()];
        while let Some(id) = stack.pop() {
            let record = map.node(id)?;
            entries.push(json!({
                "path": map.node_rel_path(id)?,
                "text": record.text,
                "color": record.color.to_hex(),
                "expanded": record.expanded,
                "tags": record.tags,
                "loaded_children": record.children.len(),
                "declared_children": map.declared_children(id)?,
                "connections": record.connections.len(),
            }));
            for &child in record.children.iter().rev() {
                stack.push(child);
            }
        }
        serde_json::to_string_pretty(&entries).map_err(|e| MapError::Config(e.to_string()))
    }
}

/// Resolve a map-relative path, materializing segments as needed.
fn resolve(map: &mut MindMap, path: &str) -> Result<NodeId> {
    if path == "." || path.is_empty() {
        return Ok(map.root());
    }
    let mut cursor = map.root();
    for segment in path.split('/') {
        cursor = map.load_child(cursor, segment)?;
    }
    Ok(cursor)
}

fn load_everything(map: &mut MindMap, from: NodeId) -> Result<()> {
    let children = map.load_all_children(from)?;
    for child in children {
        load_everything(map, child)?;
    }
    Ok(())
}
