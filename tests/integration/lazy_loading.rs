//! Lazy materialization and eviction: loads are idempotent, hides leave
//! disk untouched, and a hidden subtree reloads with identical state.

use crate::support::{map_root, scratch_map};
use mindfold::error::MapError;
use mindfold::map::MindMap;
use mindfold::types::{Color, Point};

#[test]
fn load_all_children_is_idempotent() {
    let (dir, mut map) = scratch_map("root");
    let root = map.root();
    map.add_child(root, "A").unwrap();
    map.add_child(root, "B").unwrap();
    map.set_expanded(root, false).unwrap();
    map.save_map().unwrap();
    drop(map);

    let mut map = MindMap::open_map(&map_root(&dir)).unwrap();
    let root = map.root();
    assert!(map.children_of(root).unwrap().is_empty());

    let first = map.load_all_children(root).unwrap();
    assert_eq!(first.len(), 2);
    let second = map.load_all_children(root).unwrap();
    assert_eq!(first, second);
    assert_eq!(map.loaded_count(), 3);
}

#[test]
fn load_child_twice_returns_same_node() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    map.hide_child(root, a).unwrap();

    let first = map.load_child(root, "A").unwrap();
    let second = map.load_child(root, "A").unwrap();
    assert_eq!(first, second);
    assert_eq!(map.children_of(root).unwrap(), vec![first]);
}

#[test]
fn hide_then_reload_restores_persisted_state() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    let b = map.add_child(a, "B").unwrap();
    map.set_color(b, Color::new(1, 2, 3)).unwrap();
    map.set_position(b, Point::new(5.0, 6.0)).unwrap();
    map.add_tag(b, "keep").unwrap();
    map.connect(root, b).unwrap();

    map.hide_child(root, a).unwrap();

    // Eviction is memory-only: the folders and documents remain.
    assert!(matches!(map.node(a), Err(MapError::DeadNode)));
    assert!(matches!(map.node(b), Err(MapError::DeadNode)));
    assert!(map.root_folder().join("A").join("B").is_dir());
    assert!(map.connections_of(root).unwrap().is_empty());

    let a2 = map.load_child(root, "A").unwrap();
    let b2 = map.find_child(a2, "B").unwrap();
    // New in-memory instances, same persisted attributes.
    assert_ne!(a2, a);
    let record = map.node(b2).unwrap();
    assert_eq!(record.text, "B");
    assert_eq!(record.color, Color::new(1, 2, 3));
    assert_eq!(record.position, Point::new(5.0, 6.0));
    assert_eq!(record.tags, vec!["keep"]);
    // The root<->B connection came back from the sidecars.
    assert!(map.edge_between(root, b2).is_some());
    assert!(map.node(root).unwrap().pending_connections.is_empty());
    assert!(map.node(b2).unwrap().pending_connections.is_empty());
}

#[test]
fn hide_all_children_evicts_depth_first() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    map.add_child(a, "B").unwrap();
    map.add_child(root, "C").unwrap();
    assert_eq!(map.loaded_count(), 4);

    map.hide_all_children(root).unwrap();
    assert_eq!(map.loaded_count(), 1);
    assert!(map.children_of(root).unwrap().is_empty());
    // Disk still declares both top-level children.
    assert_eq!(map.declared_children(root).unwrap(), vec!["A", "C"]);
}

#[test]
fn root_cannot_be_hidden() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    assert!(matches!(
        map.hide_child(root, root),
        Err(MapError::RootImmutable(_))
    ));
}

#[test]
fn loading_an_undeclared_child_fails() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let err = map.load_child(root, "phantom").unwrap_err();
    assert!(matches!(err, MapError::UnknownChild { .. }));
}
