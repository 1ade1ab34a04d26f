//! # State Differ
//!
//! Captures what a live tree changed relative to its template-built baseline
//! and replays that onto a fresh baseline.
//!
//! ## Save
//!
//! 1. Structural records come from the tree's edit log: a `remove` per
//!    template node taken out, an `insert` with a full descriptor per node
//!    added outside any other added subtree
//! 2. Attribute records come from a deterministic walk over template nodes,
//!    comparing current attributes and bindings with the declared ones
//!
//! Nodes below a transient ancestor never produce records.
//!
//! ## Restore
//!
//! Removals deepest-first, then inserts shallowest-first by ascending index,
//! then attribute records. A record that does not resolve against the baseline
//! is skipped and reported as a [`StructuralMismatch`].

use crate::error::StateError;
use crate::saved_state::{AttributeDiff, RecordKind, StructuralEdit, StructuralMismatch, TreeDiff};
use tracing::{debug, warn};
use weft_component::{
    AttributeMap, BuildMode, ComponentNode, ComponentRegistry, ComponentTree, NodeDescriptor,
    StructuralChange, Slot, VisitContext, VisitHints, VisitResult,
};

/// Compute the diff of `tree` against its baseline
pub fn save(tree: &ComponentTree) -> Result<TreeDiff, StateError> {
    tree.check_id_uniqueness()?;

    let mut diff = TreeDiff::default();

    for change in tree.changes() {
        match change {
            StructuralChange::Removed { client_id } => {
                diff.structural_edits.push(StructuralEdit::Remove {
                    client_id: client_id.clone(),
                });
            }
            StructuralChange::Added(uid) => {
                if let Some(edit) = insert_record(tree, *uid) {
                    diff.structural_edits.push(edit);
                }
            }
        }
    }

    tree.visit(
        VisitHints::persistent(),
        &mut |node: &ComponentNode, ctx: &VisitContext<'_>| {
            // Added subtrees are carried whole by their insert record
            if node.is_dynamic() || ctx.under_dynamic {
                return VisitResult::Reject;
            }
            if let Some(record) = attribute_diff(node, ctx.client_id) {
                diff.attribute_diffs.push(record);
            }
            VisitResult::Accept
        },
    );

    debug!(
        attributes = diff.attribute_diffs.len(),
        structural = diff.structural_edits.len(),
        "Captured tree diff"
    );

    Ok(diff)
}

fn insert_record(tree: &ComponentTree, uid: weft_component::NodeUid) -> Option<StructuralEdit> {
    let location = tree.locate_uid(uid)?;
    if location.under_transient || location.under_dynamic {
        return None;
    }

    let node = tree.node_at(&location.path)?;
    let descriptor = node.to_descriptor()?;
    let parent_client_id = location.parent_client_id.clone()?;
    let (_, parent_path) = location.path.split_last()?;
    let parent = tree.node_at(parent_path)?;

    let (index, facet) = match location.slot()? {
        Slot::Child(index) => (restorable_index(parent, *index), None),
        Slot::Facet(name) => (0, Some(name.clone())),
    };

    Some(StructuralEdit::Insert {
        parent_client_id,
        index,
        facet,
        descriptor,
    })
}

/// Position among the siblings that will exist after restore.
/// Added transient siblings are not recreated, so they do not count.
fn restorable_index(parent: &ComponentNode, index: usize) -> usize {
    parent.children()[..index]
        .iter()
        .filter(|sibling| !(sibling.is_transient() && sibling.is_dynamic()))
        .count()
}

fn attribute_diff(node: &ComponentNode, client_id: &str) -> Option<AttributeDiff> {
    let initial = node.initial_attributes()?;
    let current = node.attributes();

    let set: AttributeMap = current
        .iter()
        .filter(|(name, value)| initial.get(*name) != Some(*value))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let cleared: Vec<String> = initial
        .keys()
        .filter(|name| !current.contains_key(*name))
        .cloned()
        .collect();

    let mut bindings = std::collections::BTreeMap::new();
    if let Some(initial_bindings) = node.initial_bindings() {
        for (name, expression) in node.bindings() {
            if initial_bindings.get(name) != Some(expression) {
                bindings.insert(name.clone(), Some(expression.clone()));
            }
        }
        for name in initial_bindings.keys() {
            if node.binding(name).is_none() {
                bindings.insert(name.clone(), None);
            }
        }
    }

    let record = AttributeDiff {
        client_id: client_id.to_string(),
        set,
        cleared,
        bindings,
    };

    if record.is_empty() {
        None
    } else {
        Some(record)
    }
}

/// Apply `diff` to a freshly built baseline (already marked with
/// `mark_initial_state`). The returned tree tracks edits again, with the
/// restored structural changes in its log.
pub fn restore(
    mut tree: ComponentTree,
    diff: &TreeDiff,
    registry: &ComponentRegistry,
) -> (ComponentTree, Vec<StructuralMismatch>) {
    tree.set_tracking(false);

    let mut mismatches = Vec::new();
    let mut changes = Vec::new();

    let mut removals = Vec::new();
    let mut inserts = Vec::new();
    for (position, edit) in diff.structural_edits.iter().enumerate() {
        match edit {
            StructuralEdit::Remove { client_id } => match tree.locate(client_id) {
                Some(location) => removals.push((location.depth(), position, client_id)),
                None => mismatches.push(mismatch(RecordKind::Remove, client_id, "node not found")),
            },
            StructuralEdit::Insert {
                parent_client_id,
                index,
                facet,
                descriptor,
            } => inserts.push((position, parent_client_id, *index, facet.as_deref(), descriptor)),
        }
    }

    // Deepest first so parents are still present when their children go
    removals.sort_by(|a, b| b.0.cmp(&a.0));
    for (_, position, client_id) in removals {
        match tree.remove(client_id) {
            Ok(_) => changes.push((
                position,
                StructuralChange::Removed {
                    client_id: client_id.clone(),
                },
            )),
            Err(err) => mismatches.push(mismatch(RecordKind::Remove, client_id, err.to_string())),
        }
    }

    let mut resolved = Vec::new();
    for (position, parent_client_id, index, facet, descriptor) in inserts {
        match tree.locate(parent_client_id) {
            Some(location) => resolved.push((location.depth(), index, position, parent_client_id, facet, descriptor)),
            None => mismatches.push(mismatch(RecordKind::Insert, parent_client_id, "parent not found")),
        }
    }
    resolved.sort_by_key(|(depth, index, ..)| (*depth, *index));

    for (_, index, position, parent_client_id, facet, descriptor) in resolved {
        match insert(&mut tree, registry, parent_client_id, index, facet, descriptor) {
            Ok(uid) => changes.push((position, StructuralChange::Added(uid))),
            Err(err) => mismatches.push(mismatch(RecordKind::Insert, parent_client_id, err.to_string())),
        }
    }

    for record in &diff.attribute_diffs {
        match tree.find_mut(&record.client_id) {
            Some(node) => apply_attributes(node, record),
            None => mismatches.push(mismatch(RecordKind::Attributes, &record.client_id, "node not found")),
        }
    }

    for skipped in &mismatches {
        warn!(record = %skipped.record, client_id = %skipped.client_id, reason = %skipped.reason, "Restore skipped record");
    }

    // The log keeps record order so the next save emits the same records
    changes.sort_by_key(|(position, _)| *position);
    tree.restore_changes(changes.into_iter().map(|(_, change)| change).collect());
    (tree, mismatches)
}

fn insert(
    tree: &mut ComponentTree,
    registry: &ComponentRegistry,
    parent_client_id: &str,
    index: usize,
    facet: Option<&str>,
    descriptor: &NodeDescriptor,
) -> Result<weft_component::NodeUid, StateError> {
    let node = {
        let mut next_id = || tree.create_unique_id();
        registry.build(descriptor, BuildMode::Exact, &mut next_id)?
    };

    let uid = match facet {
        Some(name) => tree.set_facet(parent_client_id, name, node)?,
        None => tree.add_child(parent_client_id, index, node)?,
    };
    Ok(uid)
}

fn apply_attributes(node: &mut ComponentNode, record: &AttributeDiff) {
    for (name, value) in &record.set {
        node.set_attribute(name.clone(), value.clone());
    }
    for name in &record.cleared {
        node.remove_attribute(name);
    }
    for (name, binding) in &record.bindings {
        match binding {
            Some(expression) => node.set_binding(name.clone(), expression.clone()),
            None => {
                node.remove_binding(name);
            }
        }
    }
}

fn mismatch(record: RecordKind, client_id: &str, reason: impl Into<String>) -> StructuralMismatch {
    StructuralMismatch {
        record,
        client_id: client_id.to_string(),
        reason: reason.into(),
    }
}

/// Describe the whole non-transient tree
pub fn save_full(tree: &ComponentTree) -> Result<NodeDescriptor, StateError> {
    tree.check_id_uniqueness()?;
    tree.root()
        .to_descriptor()
        .ok_or_else(|| StateError::Tree(weft_component::TreeError::NodeNotFound(tree.root_client_id().to_string())))
}

/// Rebuild a tree saved with [`save_full`]; the template is not consulted
pub fn restore_full(descriptor: &NodeDescriptor, registry: &ComponentRegistry) -> Result<ComponentTree, StateError> {
    let mut counter = 0u64;
    let mut next_id = || {
        let id = format!("j_id{}", counter);
        counter += 1;
        id
    };
    let root = registry.build(descriptor, BuildMode::Exact, &mut next_id)?;
    let mut tree = ComponentTree::new(root);
    tree.mark_initial_state();
    Ok(tree)
}
