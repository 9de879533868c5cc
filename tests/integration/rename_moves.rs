//! Renames move folders and rewrite every persisted reference: subtree
//! path fields, the parent's child list, and connection entries in other
//! documents.

use crate::support::scratch_map;
use mindfold::error::MapError;
use mindfold::sidecar::read_document;

#[test]
fn rename_moves_folder_and_updates_parent_list() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    map.add_child(root, "C").unwrap();

    map.set_text(a, "Alpha").unwrap();

    assert!(map.root_folder().join("Alpha").is_dir());
    assert!(!map.root_folder().join("A").exists());
    assert_eq!(map.node(a).unwrap().text, "Alpha");
    assert_eq!(map.node_rel_path(a).unwrap(), "Alpha");
    // Order in the parent's list is preserved.
    assert_eq!(read_document(map.root_folder()).children, vec!["Alpha", "C"]);
    let doc = read_document(&map.root_folder().join("Alpha"));
    assert_eq!(doc.text, "Alpha");
    assert_eq!(
        doc.path,
        map.root_folder().join("Alpha").to_string_lossy()
    );
}

#[test]
fn rename_rewrites_descendant_paths_and_connection_references() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    let b = map.add_child(a, "B").unwrap();
    let c = map.add_child(root, "C").unwrap();
    map.connect(c, b).unwrap();

    map.set_text(a, "Alpha").unwrap();

    // Descendant folder moved with the subtree; its path field follows.
    let b_folder = map.root_folder().join("Alpha").join("B");
    assert!(b_folder.is_dir());
    assert_eq!(map.node_rel_path(b).unwrap(), "Alpha/B");
    assert_eq!(
        read_document(&b_folder).path,
        b_folder.to_string_lossy()
    );

    // The outside endpoint now references the new location, and the
    // moved document still references the unmoved endpoint.
    let c_doc = read_document(&map.root_folder().join("C"));
    assert_eq!(c_doc.connections, vec!["Alpha/B"]);
    assert_eq!(read_document(&b_folder).connections, vec!["C"]);

    // The edge survived in memory.
    assert!(map.edge_between(c, b).is_some());
}

#[test]
fn rename_to_existing_sibling_fails_cleanly() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    map.add_child(root, "B").unwrap();

    let err = map.set_text(a, "B").unwrap_err();
    assert!(matches!(err, MapError::SiblingExists { .. }));
    // Nothing moved.
    assert!(map.root_folder().join("A").is_dir());
    assert_eq!(map.node(a).unwrap().text, "A");
    assert_eq!(read_document(map.root_folder()).children, vec!["A", "B"]);
}

#[test]
fn root_rename_changes_text_but_not_the_folder() {
    let (_dir, mut map) = scratch_map("old title");
    let root = map.root();
    let folder = map.root_folder().to_path_buf();

    map.set_text(root, "new title").unwrap();

    assert_eq!(map.node(root).unwrap().text, "new title");
    assert_eq!(map.root_folder(), folder.as_path());
    assert_eq!(read_document(&folder).text, "new title");
}

#[test]
fn rename_rejects_invalid_folder_names() {
    let (_dir, mut map) = scratch_map("root");
    let a = map.add_child(map.root(), "A").unwrap();
    assert!(matches!(
        map.set_text(a, "x/y"),
        Err(MapError::InvalidName { .. })
    ));
    assert!(matches!(
        map.set_text(a, ""),
        Err(MapError::InvalidName { .. })
    ));
}
