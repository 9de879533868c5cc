//! Sequential sessions: one session's persisted edits are what the next
//! session observes, and the consistency scan notices drift.

use crate::support::{map_root, scratch_map};
use mindfold::map::MindMap;
use mindfold::types::Color;
use std::fs;

#[test]
fn second_session_observes_first_sessions_edits() {
    let (dir, mut map) = scratch_map("plan");
    let root = map.root();
    let a = map.add_child(root, "research").unwrap();
    let b = map.add_child(root, "write-up").unwrap();
    map.connect(a, b).unwrap();
    map.set_color(a, Color::new(200, 100, 50)).unwrap();
    map.add_tag(b, "q3").unwrap();
    map.save_map().unwrap();
    drop(map);

    let map = MindMap::open_map(&map_root(&dir)).unwrap();
    let root = map.root();
    assert_eq!(map.node(root).unwrap().text, "plan");
    let a = map.find_child(root, "research").unwrap();
    let b = map.find_child(root, "write-up").unwrap();
    assert_eq!(map.node(a).unwrap().color, Color::new(200, 100, 50));
    assert_eq!(map.node(b).unwrap().tags, vec!["q3"]);
    // The connection was re-materialized from both sidecars.
    assert!(map.edge_between(a, b).is_some());
    assert_eq!(map.connections_of(a).unwrap().len(), 1);
}

#[test]
fn collapsed_subtrees_stay_unloaded_on_open() {
    let (dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    map.add_child(a, "B").unwrap();
    map.set_expanded(a, false).unwrap();
    map.save_map().unwrap();
    drop(map);

    let mut map = MindMap::open_map(&map_root(&dir)).unwrap();
    let a = map.find_child(map.root(), "A").unwrap();
    assert!(map.children_of(a).unwrap().is_empty());
    assert_eq!(map.declared_children(a).unwrap(), vec!["B"]);

    let b = map.load_child(a, "B").unwrap();
    assert_eq!(map.node(b).unwrap().text, "B");
}

#[test]
fn validate_reports_clean_map() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    map.add_child(a, "B").unwrap();
    map.save_map().unwrap();

    let report = map.validate().unwrap();
    assert_eq!(report.folders, 3);
    assert_eq!(report.documents, 3);
    assert!(report.is_clean(), "unexpected findings: {report:?}");
}

#[test]
fn validate_flags_undeclared_and_missing_folders() {
    let (dir, mut map) = scratch_map("root");
    let root = map.root();
    map.add_child(root, "A").unwrap();

    // An orphan folder nobody declared, and a declared child whose
    // folder disappears behind the map's back.
    fs::create_dir(map_root(&dir).join("stray")).unwrap();
    fs::remove_dir_all(map_root(&dir).join("A")).unwrap();

    let report = map.validate().unwrap();
    assert!(report
        .warnings
        .iter()
        .any(|w| w.contains("undeclared") && w.contains("stray")));
    assert!(report
        .errors
        .iter()
        .any(|e| e.contains("missing child") && e.contains("A")));
}

#[test]
fn open_map_tolerates_corrupt_root_sidecar() {
    let (dir, map) = scratch_map("root");
    drop(map);
    fs::write(map_root(&dir).join("node.json"), "{{{{").unwrap();

    let map = MindMap::open_map(&map_root(&dir)).unwrap();
    // Defaults apply; the folder name stands in for the lost text.
    assert_eq!(map.node(map.root()).unwrap().text, "map");
}
