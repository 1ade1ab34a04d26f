//! # Component Tree
//!
//! Owns the nodes of one view top-down and records structural edits made after
//! the template build so the state differ can reproduce them later.
//!
//! ## Edit tracking
//!
//! - `mark_initial_state` snapshots every node's attributes and client id and
//!   starts tracking; nothing before that point is recorded
//! - Adding a node records `Added(uid)` and marks the node dynamic
//! - Removing a node drops any `Added` entries for nodes in the removed subtree
//!   and, if the node came from the template, records `Removed` with its
//!   template client id (once)
//! - Removals below a transient ancestor are not recorded; removing a
//!   transient template node itself is
//! - Ids must not contain the separator `:`

use crate::node::{Baseline, ComponentNode, NodeUid};
use crate::visit::{
    client_id_for, is_valid_id, walk_tree, walk_tree_mut, Slot, TreeVisitor, TreeVisitorMut,
    VisitContext, VisitHints, VisitResult, SEPARATOR,
};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Parent not found: {0}")]
    ParentNotFound(String),

    #[error("Id '{id}' is already used in the naming container of '{parent}'")]
    DuplicateId { id: String, parent: String },

    #[error("Duplicate client id: {0}")]
    DuplicateClientId(String),

    #[error("Index {index} out of bounds for '{parent}' with {len} children")]
    IndexOutOfBounds {
        parent: String,
        index: usize,
        len: usize,
    },

    #[error("The view root cannot be removed")]
    CannotRemoveRoot,

    #[error("Invalid id '{0}': ids must not contain ':'")]
    InvalidId(String),
}

/// A tracked structural edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralChange {
    /// Node inserted (or re-inserted) after the template build
    Added(NodeUid),
    /// Template node removed; client id as it was in the template-built tree
    Removed { client_id: String },
}

/// Resolved position of a node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLocation {
    pub client_id: String,
    pub parent_client_id: Option<String>,
    pub path: Vec<Slot>,
    pub under_dynamic: bool,
    pub under_transient: bool,
}

impl NodeLocation {
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn slot(&self) -> Option<&Slot> {
        self.path.last()
    }

    fn from_context(ctx: &VisitContext<'_>) -> Self {
        Self {
            client_id: ctx.client_id.to_string(),
            parent_client_id: ctx.parent_client_id.map(str::to_string),
            path: ctx.path.to_vec(),
            under_dynamic: ctx.under_dynamic,
            under_transient: ctx.under_transient,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ComponentTree {
    root: ComponentNode,
    changes: Vec<StructuralChange>,
    tracking: bool,
    next_uid: u64,
    id_counter: u64,
}

impl ComponentTree {
    /// Wrap a freshly built root. Tracking stays off until `mark_initial_state`.
    pub fn new(mut root: ComponentNode) -> Self {
        let mut next_uid = 1;
        assign_uids(&mut root, &mut next_uid);

        Self {
            root,
            changes: Vec::new(),
            tracking: false,
            next_uid,
            id_counter: 0,
        }
    }

    pub fn root(&self) -> &ComponentNode {
        &self.root
    }

    /// Mutable access to the root's attributes and per-request state.
    /// Structural changes go through the tree so they are tracked.
    pub fn root_mut(&mut self) -> &mut ComponentNode {
        &mut self.root
    }

    pub fn root_client_id(&self) -> &str {
        self.root.id()
    }

    /// Record the current attributes of every node as its declared defaults
    /// and start tracking structural edits.
    pub fn mark_initial_state(&mut self) {
        walk_tree_mut(
            &mut self.root,
            VisitHints::all(),
            &mut |node: &mut ComponentNode, ctx: &VisitContext<'_>| {
                node.baseline = Some(Baseline {
                    attributes: node.attributes().clone(),
                    bindings: node.bindings().clone(),
                    client_id: ctx.client_id.to_string(),
                });
                node.dynamic = false;
                VisitResult::Accept
            },
        );
        self.changes.clear();
        self.tracking = true;
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn set_tracking(&mut self, tracking: bool) {
        self.tracking = tracking;
    }

    pub fn changes(&self) -> &[StructuralChange] {
        &self.changes
    }

    /// Install the edit log of a restored tree. `Added` nodes are marked dynamic
    /// so the next save describes them again; tracking resumes.
    pub fn restore_changes(&mut self, changes: Vec<StructuralChange>) {
        let added: HashSet<NodeUid> = changes
            .iter()
            .filter_map(|c| match c {
                StructuralChange::Added(uid) => Some(*uid),
                StructuralChange::Removed { .. } => None,
            })
            .collect();

        self.root.walk_mut(&mut |node| {
            if added.contains(&node.uid) {
                node.mark_dynamic();
            }
        });

        self.changes = changes;
        self.tracking = true;
    }

    pub fn id_counter(&self) -> u64 {
        self.id_counter
    }

    pub fn set_id_counter(&mut self, value: u64) {
        self.id_counter = value;
    }

    /// Generate an id for a node created without one
    pub fn create_unique_id(&mut self) -> String {
        let id = format!("j_id{}", self.id_counter);
        self.id_counter += 1;
        id
    }

    pub fn visit<V: TreeVisitor + ?Sized>(&self, hints: VisitHints, visitor: &mut V) -> bool {
        walk_tree(&self.root, hints, visitor)
    }

    pub fn visit_mut<V: TreeVisitorMut + ?Sized>(&mut self, hints: VisitHints, visitor: &mut V) -> bool {
        walk_tree_mut(&mut self.root, hints, visitor)
    }

    /// Client ids in visiting order
    pub fn client_ids(&self, hints: VisitHints) -> Vec<String> {
        let mut ids = Vec::new();
        self.visit(hints, &mut |_: &ComponentNode, ctx: &VisitContext<'_>| {
            ids.push(ctx.client_id.to_string());
            VisitResult::Accept
        });
        ids
    }

    /// Resolve a client id, pruning naming containers whose prefix cannot match
    pub fn locate(&self, client_id: &str) -> Option<NodeLocation> {
        let mut found = None;
        self.visit(VisitHints::all(), &mut |node: &ComponentNode, ctx: &VisitContext<'_>| {
            if ctx.client_id == client_id {
                found = Some(NodeLocation::from_context(ctx));
                return VisitResult::Complete;
            }
            if node.kind().is_naming_container() && !is_prefix_of(ctx.client_id, client_id) {
                return VisitResult::Reject;
            }
            VisitResult::Accept
        });
        found
    }

    pub fn locate_uid(&self, uid: NodeUid) -> Option<NodeLocation> {
        let mut found = None;
        self.visit(VisitHints::all(), &mut |node: &ComponentNode, ctx: &VisitContext<'_>| {
            if node.uid == uid {
                found = Some(NodeLocation::from_context(ctx));
                return VisitResult::Complete;
            }
            VisitResult::Accept
        });
        found
    }

    pub fn find(&self, client_id: &str) -> Option<&ComponentNode> {
        let location = self.locate(client_id)?;
        node_at(&self.root, &location.path)
    }

    pub fn find_mut(&mut self, client_id: &str) -> Option<&mut ComponentNode> {
        let location = self.locate(client_id)?;
        node_at_mut(&mut self.root, &location.path)
    }

    pub fn contains(&self, client_id: &str) -> bool {
        self.locate(client_id).is_some()
    }

    pub fn find_uid(&self, uid: NodeUid) -> Option<&ComponentNode> {
        let location = self.locate_uid(uid)?;
        node_at(&self.root, &location.path)
    }

    pub fn node_at(&self, path: &[Slot]) -> Option<&ComponentNode> {
        node_at(&self.root, path)
    }

    /// Prefix that children of `parent` get in front of their ids
    fn child_prefix(parent: &ComponentNode, parent_client_id: &str) -> String {
        if parent.kind().is_naming_container() {
            return parent_client_id.to_string();
        }
        parent_client_id
            .strip_suffix(parent.id())
            .map(|rest| rest.trim_end_matches(SEPARATOR).to_string())
            .unwrap_or_default()
    }

    /// Insert `node` as child `index` of `parent_client_id`.
    pub fn add_child(
        &mut self,
        parent_client_id: &str,
        index: usize,
        mut node: ComponentNode,
    ) -> Result<NodeUid, TreeError> {
        let parent_location = self
            .locate(parent_client_id)
            .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;

        self.ensure_id(&mut node)?;

        let (prefix, len) = {
            let parent = node_at(&self.root, &parent_location.path)
                .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;
            (Self::child_prefix(parent, &parent_location.client_id), parent.children.len())
        };

        if index > len {
            return Err(TreeError::IndexOutOfBounds {
                parent: parent_client_id.to_string(),
                index,
                len,
            });
        }

        let client_id = client_id_for(&prefix, node.id());
        if self.contains(&client_id) {
            return Err(TreeError::DuplicateId {
                id: node.id().to_string(),
                parent: parent_client_id.to_string(),
            });
        }

        let uid = self.attach(&mut node);
        let parent = node_at_mut(&mut self.root, &parent_location.path)
            .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;
        parent.children.insert(index, node);

        if self.tracking {
            debug!(client_id = %client_id, parent = %parent_client_id, index, "Tracked dynamic add");
            self.changes.push(StructuralChange::Added(uid));
        }

        Ok(uid)
    }

    /// Append `node` to the children of `parent_client_id`
    pub fn push_child(&mut self, parent_client_id: &str, node: ComponentNode) -> Result<NodeUid, TreeError> {
        let len = self
            .find(parent_client_id)
            .map(ComponentNode::child_count)
            .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;
        self.add_child(parent_client_id, len, node)
    }

    /// Put `node` into facet `name` of `parent_client_id`, replacing any existing facet
    pub fn set_facet(
        &mut self,
        parent_client_id: &str,
        name: &str,
        mut node: ComponentNode,
    ) -> Result<NodeUid, TreeError> {
        let parent_location = self
            .locate(parent_client_id)
            .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;

        self.ensure_id(&mut node)?;

        let existing = {
            let parent = node_at(&self.root, &parent_location.path)
                .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;
            let prefix = Self::child_prefix(parent, &parent_location.client_id);
            parent
                .facet(name)
                .map(|facet| client_id_for(&prefix, facet.id()))
        };
        if let Some(existing_client_id) = existing {
            self.remove(&existing_client_id)?;
        }

        let uid = self.attach(&mut node);
        let parent = node_at_mut(&mut self.root, &parent_location.path)
            .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;
        parent.facets.insert(name.to_string(), node);

        if self.tracking {
            debug!(parent = %parent_client_id, facet = name, "Tracked dynamic facet");
            self.changes.push(StructuralChange::Added(uid));
        }

        Ok(uid)
    }

    pub fn remove_facet(&mut self, parent_client_id: &str, name: &str) -> Result<ComponentNode, TreeError> {
        let parent_location = self
            .locate(parent_client_id)
            .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;
        let client_id = {
            let parent = node_at(&self.root, &parent_location.path)
                .ok_or_else(|| TreeError::ParentNotFound(parent_client_id.to_string()))?;
            let facet = parent
                .facet(name)
                .ok_or_else(|| TreeError::NodeNotFound(format!("{}#{}", parent_client_id, name)))?;
            client_id_for(&Self::child_prefix(parent, &parent_location.client_id), facet.id())
        };
        self.remove(&client_id)
    }

    /// Detach the node with `client_id` (child or facet) and return it
    pub fn remove(&mut self, client_id: &str) -> Result<ComponentNode, TreeError> {
        let location = self
            .locate(client_id)
            .ok_or_else(|| TreeError::NodeNotFound(client_id.to_string()))?;
        let (last, parent_path) = location
            .path
            .split_last()
            .ok_or(TreeError::CannotRemoveRoot)?;
        let below_transient = transient_along(&self.root, parent_path);

        let parent = node_at_mut(&mut self.root, parent_path)
            .ok_or_else(|| TreeError::NodeNotFound(client_id.to_string()))?;
        let removed = match last {
            Slot::Child(index) => parent.children.remove(*index),
            Slot::Facet(name) => parent
                .facets
                .remove(name)
                .ok_or_else(|| TreeError::NodeNotFound(client_id.to_string()))?,
        };

        if self.tracking {
            self.record_removal(&removed, below_transient);
        }

        Ok(removed)
    }

    /// Move a node to a new parent/index. Recorded as remove + add.
    pub fn move_child(
        &mut self,
        client_id: &str,
        new_parent_client_id: &str,
        index: usize,
    ) -> Result<NodeUid, TreeError> {
        if !self.contains(new_parent_client_id) {
            return Err(TreeError::ParentNotFound(new_parent_client_id.to_string()));
        }
        let node = self.remove(client_id)?;
        self.add_child(new_parent_client_id, index, node)
    }

    fn record_removal(&mut self, removed: &ComponentNode, below_transient: bool) {
        let mut uids = HashSet::new();
        removed.walk(&mut |node| {
            uids.insert(node.uid);
        });
        self.changes.retain(|change| match change {
            StructuralChange::Added(uid) => !uids.contains(uid),
            StructuralChange::Removed { .. } => true,
        });

        if below_transient {
            return;
        }

        if let Some(baseline_client_id) = removed.baseline_client_id() {
            let entry = StructuralChange::Removed {
                client_id: baseline_client_id.to_string(),
            };
            if !self.changes.contains(&entry) {
                debug!(client_id = %baseline_client_id, "Tracked removal of template node");
                self.changes.push(entry);
            }
        }
    }

    /// Generate a missing id and reject ids that contain the separator
    fn ensure_id(&mut self, node: &mut ComponentNode) -> Result<(), TreeError> {
        if node.id().is_empty() {
            let id = self.create_unique_id();
            node.set_id(id);
        }
        if !is_valid_id(node.id()) {
            return Err(TreeError::InvalidId(node.id().to_string()));
        }
        Ok(())
    }

    /// Give every node of an incoming subtree a fresh uid; mark it dynamic if tracking
    fn attach(&mut self, node: &mut ComponentNode) -> NodeUid {
        node.walk_mut(&mut |n| n.uid = NodeUid::default());
        assign_uids(node, &mut self.next_uid);
        if self.tracking {
            node.mark_dynamic();
        }
        node.uid
    }

    /// Every client id in the view must be unique before state is saved
    pub fn check_id_uniqueness(&self) -> Result<(), TreeError> {
        let mut seen = HashSet::new();
        let mut duplicate = None;
        self.visit(VisitHints::all(), &mut |_: &ComponentNode, ctx: &VisitContext<'_>| {
            if !seen.insert(ctx.client_id.to_string()) {
                duplicate = Some(ctx.client_id.to_string());
                return VisitResult::Complete;
            }
            VisitResult::Accept
        });

        match duplicate {
            Some(client_id) => Err(TreeError::DuplicateClientId(client_id)),
            None => Ok(()),
        }
    }

    /// Reset per-request input state on every node
    pub fn reset_input_state(&mut self) {
        self.root.walk_mut(&mut |node| {
            *node.input_mut() = Default::default();
        });
    }
}

fn assign_uids(node: &mut ComponentNode, next: &mut u64) {
    node.walk_mut(&mut |n| {
        if !n.uid.is_assigned() {
            n.uid = NodeUid(*next);
            *next += 1;
        }
    });
}

fn is_prefix_of(container_client_id: &str, client_id: &str) -> bool {
    client_id
        .strip_prefix(container_client_id)
        .map(|rest| rest.starts_with(SEPARATOR))
        .unwrap_or(false)
}

/// True if the node at `path` or any node above it is transient
fn transient_along(root: &ComponentNode, path: &[Slot]) -> bool {
    let mut node = root;
    if node.is_transient() {
        return true;
    }
    for step in path {
        node = match step {
            Slot::Child(index) => match node.children.get(*index) {
                Some(child) => child,
                None => return false,
            },
            Slot::Facet(name) => match node.facets.get(name) {
                Some(facet) => facet,
                None => return false,
            },
        };
        if node.is_transient() {
            return true;
        }
    }
    false
}

pub(crate) fn node_at<'a>(mut node: &'a ComponentNode, path: &[Slot]) -> Option<&'a ComponentNode> {
    for step in path {
        node = match step {
            Slot::Child(index) => node.children.get(*index)?,
            Slot::Facet(name) => node.facets.get(name)?,
        };
    }
    Some(node)
}

pub(crate) fn node_at_mut<'a>(mut node: &'a mut ComponentNode, path: &[Slot]) -> Option<&'a mut ComponentNode> {
    for step in path {
        node = match step {
            Slot::Child(index) => node.children.get_mut(*index)?,
            Slot::Facet(name) => node.facets.get_mut(name)?,
        };
    }
    Some(node)
}
