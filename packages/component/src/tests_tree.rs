/// Tests for tree mutation, lookup and edit tracking
use crate::kind::NodeKind;
use crate::node::ComponentNode;
use crate::tree::{ComponentTree, StructuralChange, TreeError};
use crate::visit::{Slot, VisitHints};
use serde_json::json;

fn output(id: &str) -> ComponentNode {
    ComponentNode::new("weft.Output", NodeKind::Output).with_id(id)
}

fn sample_tree() -> ComponentTree {
    let root = ComponentNode::new("weft.ViewRoot", NodeKind::ViewRoot)
        .with_id("root")
        .with_child(
            ComponentNode::new("weft.Form", NodeKind::NamingContainer)
                .with_id("form")
                .with_child(output("a"))
                .with_child(output("b")),
        )
        .with_child(
            ComponentNode::new("weft.Panel", NodeKind::Container)
                .with_id("side")
                .with_child(output("c")),
        );
    let mut tree = ComponentTree::new(root);
    tree.mark_initial_state();
    tree
}

#[test]
fn test_find_by_client_id() {
    let tree = sample_tree();

    assert_eq!(tree.find("form:a").map(|n| n.id()), Some("a"));
    // Panels are not naming containers
    assert_eq!(tree.find("c").map(|n| n.id()), Some("c"));
    assert!(tree.find("a").is_none());
    assert!(tree.find("side:c").is_none());
    assert_eq!(tree.find("root").map(|n| n.kind()), Some(NodeKind::ViewRoot));
}

#[test]
fn test_locate_reports_parent_and_path() {
    let tree = sample_tree();
    let location = tree.locate("form:b").unwrap();

    assert_eq!(location.parent_client_id.as_deref(), Some("form"));
    assert_eq!(location.path, vec![Slot::Child(0), Slot::Child(1)]);
    assert_eq!(location.depth(), 2);
    assert!(!location.under_dynamic);
}

#[test]
fn test_add_child_is_tracked_and_marked_dynamic() {
    let mut tree = sample_tree();
    let uid = tree.add_child("form", 1, output("inserted")).unwrap();

    let ids: Vec<&str> = tree.find("form").unwrap().children().iter().map(|c| c.id()).collect();
    assert_eq!(ids, vec!["a", "inserted", "b"]);
    assert!(tree.find("form:inserted").unwrap().is_dynamic());
    assert_eq!(tree.changes(), &[StructuralChange::Added(uid)]);
}

#[test]
fn test_add_child_before_tracking_is_not_recorded() {
    let root = ComponentNode::new("weft.ViewRoot", NodeKind::ViewRoot).with_id("root");
    let mut tree = ComponentTree::new(root);

    tree.push_child("root", output("x")).unwrap();
    assert!(tree.changes().is_empty());
    assert!(!tree.find("x").unwrap().is_dynamic());
}

#[test]
fn test_add_child_errors() {
    let mut tree = sample_tree();

    assert_eq!(
        tree.add_child("form", 0, output("a")),
        Err(TreeError::DuplicateId {
            id: "a".into(),
            parent: "form".into()
        })
    );
    assert!(matches!(
        tree.add_child("form", 7, output("z")),
        Err(TreeError::IndexOutOfBounds { index: 7, len: 2, .. })
    ));
    assert!(matches!(
        tree.add_child("nowhere", 0, output("z")),
        Err(TreeError::ParentNotFound(_))
    ));
    // Same id is fine in another naming scope
    assert!(tree.push_child("root", output("a")).is_ok());
}

#[test]
fn test_generated_ids_use_view_counter() {
    let mut tree = sample_tree();
    tree.push_child("side", ComponentNode::new("weft.Output", NodeKind::Output)).unwrap();
    tree.push_child("side", ComponentNode::new("weft.Output", NodeKind::Output)).unwrap();

    assert!(tree.contains("j_id0"));
    assert!(tree.contains("j_id1"));
    assert_eq!(tree.id_counter(), 2);
}

#[test]
fn test_add_then_remove_cancels_out() {
    let mut tree = sample_tree();
    tree.push_child("form", output("temp")).unwrap();
    tree.remove("form:temp").unwrap();

    assert!(tree.changes().is_empty());
}

#[test]
fn test_remove_template_node_logs_baseline_client_id() {
    let mut tree = sample_tree();
    let removed = tree.remove("form:a").unwrap();

    assert_eq!(removed.id(), "a");
    assert_eq!(
        tree.changes(),
        &[StructuralChange::Removed {
            client_id: "form:a".into()
        }]
    );
}

#[test]
fn test_move_logs_single_removal_and_addition() {
    let mut tree = sample_tree();
    tree.move_child("form:b", "form", 0).unwrap();
    tree.move_child("form:b", "side", 0).unwrap();

    let removals: Vec<&StructuralChange> = tree
        .changes()
        .iter()
        .filter(|c| matches!(c, StructuralChange::Removed { .. }))
        .collect();
    let additions = tree.changes().len() - removals.len();

    assert_eq!(removals.len(), 1);
    assert_eq!(additions, 1);
    assert_eq!(tree.find("b").unwrap().baseline_client_id(), Some("form:b"));
}

#[test]
fn test_removing_dynamic_ancestor_drops_nested_additions() {
    let mut tree = sample_tree();
    tree.push_child(
        "root",
        ComponentNode::new("weft.Form", NodeKind::NamingContainer).with_id("extra"),
    )
    .unwrap();
    tree.push_child("extra", output("inner")).unwrap();
    assert_eq!(tree.changes().len(), 2);

    tree.remove("extra").unwrap();
    assert!(tree.changes().is_empty());
}

#[test]
fn test_remove_inside_transient_subtree_is_not_logged() {
    let root = ComponentNode::new("weft.ViewRoot", NodeKind::ViewRoot)
        .with_id("root")
        .with_child(
            ComponentNode::new("weft.Panel", NodeKind::Container)
                .with_id("scratch")
                .with_transient(true)
                .with_child(output("t")),
        );
    let mut tree = ComponentTree::new(root);
    tree.mark_initial_state();

    tree.remove("t").unwrap();
    assert!(tree.changes().is_empty());
}

#[test]
fn test_removing_transient_template_node_is_logged() {
    let root = ComponentNode::new("weft.ViewRoot", NodeKind::ViewRoot)
        .with_id("root")
        .with_child(
            ComponentNode::new("weft.Form", NodeKind::NamingContainer)
                .with_id("f")
                .with_child(output("t").with_transient(true))
                .with_child(output("a")),
        );
    let mut tree = ComponentTree::new(root);
    tree.mark_initial_state();

    tree.remove("f:t").unwrap();
    assert_eq!(
        tree.changes(),
        &[StructuralChange::Removed {
            client_id: "f:t".into()
        }]
    );
}

#[test]
fn test_ids_with_separator_are_rejected() {
    let mut tree = sample_tree();

    assert_eq!(
        tree.add_child("form", 0, output("x:y")),
        Err(TreeError::InvalidId("x:y".into()))
    );
    assert_eq!(
        tree.set_facet("form", "header", output("h:1")),
        Err(TreeError::InvalidId("h:1".into()))
    );
    assert!(tree.changes().is_empty());
    assert_eq!(tree.find("form").unwrap().child_count(), 2);
}

#[test]
fn test_cannot_remove_root() {
    let mut tree = sample_tree();
    assert_eq!(tree.remove("root").unwrap_err(), TreeError::CannotRemoveRoot);
}

#[test]
fn test_facets_replace_and_remove() {
    let mut tree = sample_tree();
    tree.set_facet("form", "header", output("title")).unwrap();
    tree.set_facet("form", "header", output("title2")).unwrap();

    let form = tree.find("form").unwrap();
    assert_eq!(form.facet("header").map(|f| f.id()), Some("title2"));
    // The first facet was dynamic, so replacing it leaves a single addition
    assert_eq!(tree.changes().len(), 1);

    tree.remove_facet("form", "header").unwrap();
    assert!(tree.find("form").unwrap().facet("header").is_none());
    assert!(tree.changes().is_empty());
}

#[test]
fn test_duplicate_client_ids_detected() {
    let root = ComponentNode::new("weft.ViewRoot", NodeKind::ViewRoot)
        .with_id("root")
        .with_child(output("x"))
        .with_child(ComponentNode::new("weft.Panel", NodeKind::Container).with_child(output("x")));
    let tree = ComponentTree::new(root);

    assert_eq!(
        tree.check_id_uniqueness(),
        Err(TreeError::DuplicateClientId("x".into()))
    );
    assert!(sample_tree().check_id_uniqueness().is_ok());
}

#[test]
fn test_mark_initial_state_snapshots_attributes() {
    let mut tree = sample_tree();
    tree.find_mut("form:a").unwrap().set_attribute("value", json!("changed"));

    let node = tree.find("form:a").unwrap();
    assert!(node.initial_attributes().unwrap().is_empty());
    assert_eq!(node.attribute("value"), Some(&json!("changed")));
}

#[test]
fn test_client_ids_skip_unrendered() {
    let mut tree = sample_tree();
    tree.find_mut("side").unwrap().set_attribute("rendered", false);

    let ids = tree.client_ids(VisitHints::processing());
    assert_eq!(ids, vec!["root", "form", "form:a", "form:b"]);
}

#[test]
fn test_restore_changes_marks_added_nodes_dynamic() {
    let mut tree = sample_tree();
    tree.set_tracking(false);
    let uid = tree.push_child("side", output("again")).unwrap();
    assert!(!tree.find("again").unwrap().is_dynamic());

    tree.restore_changes(vec![StructuralChange::Added(uid)]);
    assert!(tree.find("again").unwrap().is_dynamic());
    assert!(tree.is_tracking());
}
