//! Cascading deletion: a removed node takes its descendants, its folders,
//! its child-list entry, and every incident connection with it.

use crate::support::{map_root, scratch_map};
use mindfold::error::MapError;
use mindfold::map::MindMap;
use mindfold::sidecar::read_document;

#[test]
fn delete_removes_subtree_folders_and_connections() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    let b = map.add_child(a, "B").unwrap();
    let c = map.add_child(b, "C").unwrap();
    map.connect(root, b).unwrap();
    map.connect(c, root).unwrap();

    let a_folder = map.root_folder().join("A");
    assert!(a_folder.join("B").join("C").is_dir());
    assert_eq!(map.connections_of(root).unwrap().len(), 2);

    map.remove_child(root, "A").unwrap();

    // Memory: the whole subtree is dead, no edges survive.
    assert!(matches!(map.node(a), Err(MapError::DeadNode)));
    assert!(matches!(map.node(b), Err(MapError::DeadNode)));
    assert!(matches!(map.node(c), Err(MapError::DeadNode)));
    assert!(map.connections_of(root).unwrap().is_empty());
    assert!(map.node(root).unwrap().pending_connections.is_empty());

    // Disk: folder gone, child list empty, no dangling connection entry.
    assert!(!a_folder.exists());
    let root_doc = read_document(map.root_folder());
    assert!(root_doc.children.is_empty());
    assert!(root_doc.connections.is_empty());
}

#[test]
fn delete_of_unloaded_child_cleans_list_folder_and_references() {
    let (dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    let b = map.add_child(a, "B").unwrap();
    map.connect(root, b).unwrap();
    // Collapse A so the next session leaves B unloaded.
    map.set_expanded(a, false).unwrap();
    map.save_map().unwrap();
    drop(map);

    let mut map = MindMap::open_map(&map_root(&dir)).unwrap();
    let root = map.root();
    let a = map.find_child(root, "A").unwrap();
    // B exists on disk but was not materialized.
    assert!(map.children_of(a).unwrap().is_empty());
    assert_eq!(map.declared_children(a).unwrap(), vec!["B"]);

    map.remove_child(a, "B").unwrap();

    assert!(!map_root(&dir).join("A").join("B").exists());
    assert!(read_document(&map_root(&dir).join("A")).children.is_empty());
    // The surviving endpoint's document lost its reference to A/B.
    assert!(read_document(&map_root(&dir)).connections.is_empty());
    assert!(map.node(root).unwrap().pending_connections.is_empty());
}

#[test]
fn removing_unknown_child_fails_without_side_effects() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    map.add_child(root, "A").unwrap();
    let err = map.remove_child(root, "ghost").unwrap_err();
    assert!(matches!(err, MapError::UnknownChild { .. }));
    assert_eq!(map.children_of(root).unwrap().len(), 1);
    assert_eq!(read_document(map.root_folder()).children, vec!["A"]);
}

#[test]
fn root_cannot_be_removed() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    assert!(matches!(
        map.remove_node(root),
        Err(MapError::RootImmutable(_))
    ));
    assert!(map.node(root).is_ok());
}
