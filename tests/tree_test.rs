//! Tests for building, querying and pruning trees through the public API.

use rstest::{fixture, rstest};

use yamltree::util::testing::init_test_setup;
use yamltree::{ErrorKind, NodeType, Tree, YamlError, ROOT};

/// root MAP { a: 1, b: 2, m: { x: 10 }, s: [p] }
#[fixture]
fn tree() -> Tree<'static> {
    init_test_setup();
    let mut tree = Tree::new();
    tree.to_map(ROOT).unwrap();
    for (k, v) in [("a", "1"), ("b", "2")] {
        let child = tree.append_child(ROOT).unwrap();
        tree.to_keyval(child, k, v).unwrap();
    }
    let m = tree.append_child(ROOT).unwrap();
    tree.to_keymap(m, "m").unwrap();
    let x = tree.append_child(m).unwrap();
    tree.to_keyval(x, "x", "10").unwrap();
    let s = tree.append_child(ROOT).unwrap();
    tree.to_keyseq(s, "s").unwrap();
    let p = tree.append_child(s).unwrap();
    tree.to_val(p, "p").unwrap();
    tree
}

// ============================================================
// Construction and queries
// ============================================================

#[test]
fn given_new_tree_when_inspected_then_only_untyped_root_exists() {
    init_test_setup();
    let tree = Tree::new();

    assert_eq!(tree.root_id(), ROOT);
    assert_eq!(tree.size(), 1);
    assert!(tree.is_empty());
    assert!(tree.node_type(ROOT).unwrap().is_notype());
    assert!(tree.is_root(ROOT).unwrap());
    assert_eq!(tree.arena_size(), 0);
}

#[rstest]
fn given_built_tree_when_querying_then_links_and_scalars_match(tree: Tree<'static>) {
    let m = tree.find_child(ROOT, "m").unwrap().expect("m exists");

    assert_eq!(tree.size(), 7);
    assert_eq!(tree.num_children(ROOT).unwrap(), 4);
    assert_eq!(tree.child(ROOT, 2).unwrap(), Some(m));
    assert_eq!(tree.child_pos(ROOT, m).unwrap(), Some(2));
    assert_eq!(tree.node_type(m).unwrap(), NodeType::KEYMAP);
    assert_eq!(tree.key(m).unwrap(), "m");

    let x = tree.first_child(m).unwrap().expect("x exists");
    assert_eq!(tree.val(x).unwrap(), "10");
    assert_eq!(tree.parent(x).unwrap(), Some(m));
    assert!(tree.is_ancestor(ROOT, x).unwrap());
    assert!(!tree.is_ancestor(x, m).unwrap());
    assert!(tree.find_child(ROOT, "missing").unwrap().is_none());
}

#[rstest]
fn given_built_tree_when_walking_siblings_then_order_is_consistent(tree: Tree<'static>) {
    let forward: Vec<_> = tree.children(ROOT).unwrap().collect();
    let mut backward = Vec::new();
    let mut current = tree.last_child(ROOT).unwrap();
    while let Some(node) = current {
        backward.push(node);
        current = tree.prev_sibling(node).unwrap();
    }
    backward.reverse();

    assert_eq!(forward, backward);
}

#[rstest]
fn given_leaf_when_asking_for_key_then_structural_violation(tree: Tree<'static>) {
    let s = tree.find_child(ROOT, "s").unwrap().unwrap();
    let p = tree.first_child(s).unwrap().unwrap();

    let err = tree.key(p).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
}

#[rstest]
fn given_insert_after_sibling_when_inserting_then_lands_between(mut tree: Tree<'static>) {
    let a = tree.child(ROOT, 0).unwrap().unwrap();

    let node = tree.insert_child(ROOT, Some(a)).unwrap();
    tree.to_keyval(node, "between", "yes").unwrap();

    assert_eq!(tree.child_pos(ROOT, node).unwrap(), Some(1));
    assert_eq!(tree.next_sibling(a).unwrap(), Some(node));
}

#[rstest]
fn given_prepend_when_adding_then_node_becomes_first_child(mut tree: Tree<'static>) {
    let node = tree.prepend_child(ROOT).unwrap();
    tree.to_keyval(node, "first", "0").unwrap();

    assert_eq!(tree.first_child(ROOT).unwrap(), Some(node));
    assert_eq!(tree.prev_sibling(node).unwrap(), None);
}

// ============================================================
// Child acceptance policy
// ============================================================

#[rstest]
fn given_map_parent_when_typing_child_as_unkeyed_then_rejected(mut tree: Tree<'static>) {
    let node = tree.append_child(ROOT).unwrap();

    let err = tree.to_val(node, "orphan").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert!(tree.node_type(node).unwrap().is_notype());
}

#[rstest]
fn given_leaf_when_appending_child_then_rejected(mut tree: Tree<'static>) {
    let a = tree.child(ROOT, 0).unwrap().unwrap();
    let size = tree.size();

    let err = tree.append_child(a).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert_eq!(tree.size(), size);
}

#[rstest]
fn given_map_with_keyed_children_when_retyped_as_seq_then_rejected(mut tree: Tree<'static>) {
    let err = tree.to_seq(ROOT).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert_eq!(tree.node_type(ROOT).unwrap(), NodeType::MAP);
}

#[test]
fn given_stream_root_when_adding_documents_then_doc_flag_survives_retyping() {
    init_test_setup();
    let mut tree = Tree::new();
    tree.to_stream(ROOT).unwrap();

    let doc = tree.append_child(ROOT).unwrap();
    tree.to_doc(doc).unwrap();
    tree.to_map(doc).unwrap();

    assert_eq!(tree.node_type(doc).unwrap(), NodeType::DOCMAP);
    assert!(tree.node_type(ROOT).unwrap().is_stream());
}

#[rstest]
fn given_non_root_when_turned_into_stream_then_rejected(mut tree: Tree<'static>) {
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();

    let err = tree.to_stream(m).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
}

#[rstest]
fn given_value_node_when_setting_value_then_text_is_replaced(mut tree: Tree<'static>) {
    let a = tree.child(ROOT, 0).unwrap().unwrap();

    tree.set_val(a, "changed").unwrap();

    assert_eq!(tree.val(a).unwrap(), "changed");
    assert_eq!(
        tree.set_val(ROOT, "x").unwrap_err().kind(),
        ErrorKind::StructuralViolation
    );
}

// ============================================================
// Removal and invalid indices
// ============================================================

#[rstest]
fn given_subtree_when_removed_then_slots_are_freed_and_reused(mut tree: Tree<'static>) {
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();
    let x = tree.first_child(m).unwrap().unwrap();

    tree.remove(m).unwrap();

    assert_eq!(tree.size(), 5);
    assert_eq!(tree.num_children(ROOT).unwrap(), 3);
    assert_eq!(tree.get(x).unwrap_err().kind(), ErrorKind::RuntimeError);

    let fresh = tree.append_child(ROOT).unwrap();
    assert!(fresh == m || fresh == x);
}

#[rstest]
fn given_root_when_removed_then_structural_violation(mut tree: Tree<'static>) {
    let err = tree.remove(ROOT).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert_eq!(tree.size(), 7);
}

#[rstest]
fn given_container_when_removing_children_then_node_is_kept(mut tree: Tree<'static>) {
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();

    tree.remove_children(m).unwrap();

    assert!(!tree.has_children(m).unwrap());
    assert_eq!(tree.node_type(m).unwrap(), NodeType::KEYMAP);
    assert_eq!(tree.size(), 6);
}

#[rstest]
fn given_out_of_range_index_when_accessed_then_runtime_error_with_location(tree: Tree<'static>) {
    let err = tree.get(999).unwrap_err();

    match err {
        YamlError::Runtime { message, location } => {
            assert!(message.contains("999"), "message: {message}");
            assert!(location.name.ends_with("tree_test.rs"), "location: {location}");
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[rstest]
fn given_tree_when_cleared_then_back_to_untyped_root(mut tree: Tree<'static>) {
    tree.clear();

    assert!(tree.is_empty());
    assert_eq!(tree.arena_size(), 0);
}

#[test]
fn given_capacity_requests_when_reserving_then_slack_covers_them() {
    init_test_setup();
    let mut tree = Tree::new();

    tree.reserve(100);
    tree.reserve_arena(256);

    assert!(tree.capacity() >= 100);
    assert!(tree.slack() >= 99);
    assert!(tree.arena_capacity() >= 256);
}

// ============================================================
// Siblings
// ============================================================

#[rstest]
fn given_built_tree_when_querying_siblings_then_parent_children_are_used(tree: Tree<'static>) {
    let a = tree.find_child(ROOT, "a").unwrap().unwrap();
    let b = tree.find_child(ROOT, "b").unwrap().unwrap();
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();
    let s = tree.find_child(ROOT, "s").unwrap().unwrap();
    let x = tree.first_child(m).unwrap().unwrap();

    assert_eq!(tree.num_siblings(b).unwrap(), 4);
    assert_eq!(tree.num_other_siblings(b).unwrap(), 3);
    assert_eq!(tree.sibling_pos(b, m).unwrap(), Some(2));
    assert_eq!(tree.first_sibling(m).unwrap(), a);
    assert_eq!(tree.last_sibling(a).unwrap(), s);
    assert_eq!(tree.sibling(a, 3).unwrap(), Some(s));
    assert_eq!(tree.find_sibling(a, "m").unwrap(), Some(m));
    assert_eq!(tree.find_sibling(x, "x").unwrap(), Some(x));
    assert!(!tree.has_sibling(a, "missing").unwrap());
    assert!(tree.has_other_siblings(a).unwrap());
    assert!(!tree.has_other_siblings(x).unwrap());
}

#[rstest]
fn given_root_when_querying_siblings_then_it_is_its_own_only_sibling(tree: Tree<'static>) {
    assert_eq!(tree.num_siblings(ROOT).unwrap(), 1);
    assert_eq!(tree.sibling_pos(ROOT, ROOT).unwrap(), Some(0));
    assert_eq!(tree.first_sibling(ROOT).unwrap(), ROOT);
    assert_eq!(tree.last_sibling(ROOT).unwrap(), ROOT);
    assert!(!tree.has_other_siblings(ROOT).unwrap());
    assert!(!tree.has_parent(ROOT).unwrap());
}

#[rstest]
fn given_node_when_adding_siblings_then_they_land_under_its_parent(mut tree: Tree<'static>) {
    let a = tree.find_child(ROOT, "a").unwrap().unwrap();
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();
    let s = tree.find_child(ROOT, "s").unwrap().unwrap();
    let x = tree.first_child(m).unwrap().unwrap();
    let p = tree.first_child(s).unwrap().unwrap();

    let after_x = tree.insert_sibling(x, Some(x)).unwrap();
    let first = tree.prepend_sibling(a).unwrap();
    let last = tree.append_sibling(p).unwrap();

    assert_eq!(tree.parent(after_x).unwrap(), Some(m));
    assert_eq!(tree.prev_sibling(after_x).unwrap(), Some(x));
    assert_eq!(tree.first_child(ROOT).unwrap(), Some(first));
    assert_eq!(tree.last_child(s).unwrap(), Some(last));
    assert_eq!(tree.prev_sibling(last).unwrap(), Some(p));
}

#[rstest]
fn given_root_when_adding_sibling_then_structural_violation(mut tree: Tree<'static>) {
    let size = tree.size();

    let err = tree.insert_sibling(ROOT, None).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert_eq!(tree.append_sibling(ROOT).unwrap_err().kind(), ErrorKind::StructuralViolation);
    assert_eq!(tree.size(), size);
}

#[rstest]
fn given_built_tree_when_asking_parent_kind_then_map_and_seq_are_told_apart(tree: Tree<'static>) {
    let a = tree.find_child(ROOT, "a").unwrap().unwrap();
    let s = tree.find_child(ROOT, "s").unwrap().unwrap();
    let p = tree.first_child(s).unwrap().unwrap();

    assert!(tree.parent_is_map(a).unwrap());
    assert!(!tree.parent_is_seq(a).unwrap());
    assert!(tree.parent_is_seq(p).unwrap());
    assert!(!tree.parent_is_map(p).unwrap());
    assert!(!tree.parent_is_map(ROOT).unwrap());
    assert!(tree.has_child(ROOT, "s").unwrap());
}

#[rstest]
fn given_nodes_when_checking_emptiness_then_text_and_children_count(mut tree: Tree<'static>) {
    let a = tree.find_child(ROOT, "a").unwrap().unwrap();
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();
    let s = tree.find_child(ROOT, "s").unwrap().unwrap();
    let fresh = tree.append_child(s).unwrap();

    assert!(tree.is_node_empty(fresh).unwrap());
    tree.to_val(fresh, "").unwrap();
    assert!(tree.is_node_empty(fresh).unwrap());
    assert!(!tree.is_node_empty(a).unwrap());
    tree.remove_children(m).unwrap();
    assert!(!tree.is_node_empty(m).unwrap());
}

// ============================================================
// Changing the kind of a node
// ============================================================

#[rstest]
fn given_keyed_map_when_changed_to_seq_then_key_kept_and_children_dropped(mut tree: Tree<'static>) {
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();
    let size = tree.size();

    assert!(tree.change_type(m, NodeType::SEQ).unwrap());

    assert_eq!(tree.node_type(m).unwrap(), NodeType::KEYSEQ);
    assert_eq!(tree.key(m).unwrap(), "m");
    assert!(!tree.has_children(m).unwrap());
    assert_eq!(tree.size(), size - 1);
    assert!(!tree.change_type(m, NodeType::SEQ).unwrap());
}

#[rstest]
fn given_keyval_when_changed_to_map_then_value_is_dropped(mut tree: Tree<'static>) {
    let a = tree.find_child(ROOT, "a").unwrap().unwrap();

    assert!(tree.change_type(a, NodeType::MAP).unwrap());

    assert_eq!(tree.node_type(a).unwrap(), NodeType::KEYMAP);
    assert_eq!(tree.val(a).unwrap_err().kind(), ErrorKind::StructuralViolation);
    let child = tree.append_child(a).unwrap();
    tree.to_keyval(child, "k", "v").unwrap();
}

#[rstest]
#[case(NodeType::MAP | NodeType::SEQ)]
#[case(NodeType::NOTYPE)]
#[case(NodeType::STREAM)]
fn given_ambiguous_kind_when_changing_type_then_structural_violation(
    mut tree: Tree<'static>,
    #[case] new_type: NodeType,
) {
    let m = tree.find_child(ROOT, "m").unwrap().unwrap();

    let err = tree.change_type(m, new_type).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert_eq!(tree.node_type(m).unwrap(), NodeType::KEYMAP);
}

#[rstest]
fn given_unkeyed_item_when_changed_to_keyed_kind_then_structural_violation(mut tree: Tree<'static>) {
    let s = tree.find_child(ROOT, "s").unwrap().unwrap();
    let p = tree.first_child(s).unwrap().unwrap();

    let err = tree.change_type(p, NodeType::KEYMAP).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StructuralViolation);
    assert!(tree.change_type(p, NodeType::MAP).unwrap());
    assert_eq!(tree.node_type(p).unwrap(), NodeType::MAP);
}
