//! Layout determinism and the expand/collapse visibility rules.

use crate::support::scratch_map;
use mindfold::layout::MapEvent;
use mindfold::types::Point;

#[test]
fn depth_first_placement_uses_fixed_steps() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    let b = map.add_child(a, "B").unwrap();
    let c = map.add_child(root, "C").unwrap();

    map.refresh_layout(Point::new(0.0, 0.0));

    // DFS order: root, A, B, C; one row each, indented by depth.
    assert_eq!(map.node(root).unwrap().position, Point::new(0.0, 0.0));
    assert_eq!(map.node(a).unwrap().position, Point::new(40.0, 60.0));
    assert_eq!(map.node(b).unwrap().position, Point::new(80.0, 120.0));
    assert_eq!(map.node(c).unwrap().position, Point::new(40.0, 180.0));
}

#[test]
fn second_pass_without_changes_reports_no_events() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    map.add_child(root, "A").unwrap();
    let first = map.refresh_layout(Point::default());
    assert!(!first.is_empty());
    let second = map.refresh_layout(Point::default());
    assert!(second.is_empty());
}

#[test]
fn collapse_then_expand_restores_exact_positions() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    let b = map.add_child(a, "B").unwrap();
    let c = map.add_child(root, "C").unwrap();
    map.refresh_layout(Point::default());
    let before: Vec<_> = [root, a, b, c]
        .iter()
        .map(|&id| map.node(id).unwrap().position)
        .collect();

    map.set_expanded(root, false).unwrap();
    map.refresh_layout(Point::default());
    assert!(!map.node(a).unwrap().visible);
    assert!(!map.node(b).unwrap().visible);

    map.set_expanded(root, true).unwrap();
    map.refresh_layout(Point::default());
    let after: Vec<_> = [root, a, b, c]
        .iter()
        .map(|&id| map.node(id).unwrap().position)
        .collect();
    assert_eq!(before, after);
}

/// The end-to-end scenario: collapsing A hides B and the root<->B
/// connection while A stays visible; expanding A brings B back at the
/// same coordinates.
#[test]
fn collapsing_a_subtree_hides_nodes_and_crossing_connections() {
    let (_dir, mut map) = scratch_map("R");
    let root = map.root();
    let a = map.add_child(root, "A").unwrap();
    let b = map.add_child(a, "B").unwrap();
    let conn = map.connect(root, b).unwrap();

    map.refresh_layout(Point::default());
    assert!(map.node(b).unwrap().visible);
    assert!(map.connection(conn).unwrap().visible);
    let b_before = map.node(b).unwrap().position;

    map.set_expanded(a, false).unwrap();
    let events = map.refresh_layout(Point::default());
    assert!(map.node(a).unwrap().visible);
    assert!(!map.node(b).unwrap().visible);
    assert!(!map.connection(conn).unwrap().visible);
    assert!(events.contains(&MapEvent::VisibilityChanged {
        node: b,
        visible: false
    }));
    assert!(events.contains(&MapEvent::ConnectionVisibilityChanged {
        connection: conn,
        visible: false
    }));
    // The collapsed subtree keeps its last computed position.
    assert_eq!(map.node(b).unwrap().position, b_before);

    map.set_expanded(a, true).unwrap();
    map.refresh_layout(Point::default());
    assert!(map.node(b).unwrap().visible);
    assert!(map.connection(conn).unwrap().visible);
    assert_eq!(map.node(b).unwrap().position, b_before);
}

#[test]
fn no_duplicate_children_by_text() {
    let (_dir, mut map) = scratch_map("root");
    let root = map.root();
    let first = map.add_child(root, "X").unwrap();
    let second = map.add_child(root, "X").unwrap();
    assert_eq!(first, second);
    assert_eq!(map.children_of(root).unwrap().len(), 1);
    assert_eq!(map.declared_children(root).unwrap(), vec!["X"]);
}

#[test]
fn custom_steps_drive_placement() {
    use mindfold::layout::LayoutConfig;
    use mindfold::map::MindMap;
    let dir = tempfile::TempDir::new().unwrap();
    let layout = LayoutConfig {
        horizontal_step: 10.0,
        vertical_step: 5.0,
    };
    let mut map = MindMap::create_map_with(&dir.path().join("m"), "root", layout).unwrap();
    let a = map.add_child(map.root(), "A").unwrap();
    map.refresh_layout(Point::new(100.0, 200.0));
    assert_eq!(map.node(a).unwrap().position, Point::new(110.0, 205.0));
}
