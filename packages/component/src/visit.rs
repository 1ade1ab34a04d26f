//! Depth-first traversal of component trees.
//!
//! Every lifecycle phase and both halves of state saving walk the tree through
//! these functions, so the visiting order is fixed: a node, then its facets in
//! name order, then its children in index order.

use crate::node::ComponentNode;

/// Separator between naming-container segments of a client id
pub const SEPARATOR: char = ':';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitResult {
    /// Continue into the node's facets and children
    Accept,
    /// Skip the node's subtree, continue with its siblings
    Reject,
    /// Stop the whole traversal
    Complete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitHints {
    /// Do not enter transient nodes (state saving)
    pub skip_transient: bool,
    /// Do not enter nodes with `rendered = false` (request processing)
    pub skip_unrendered: bool,
}

impl VisitHints {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn persistent() -> Self {
        Self {
            skip_transient: true,
            skip_unrendered: false,
        }
    }

    pub fn processing() -> Self {
        Self {
            skip_transient: false,
            skip_unrendered: true,
        }
    }
}

/// One step from a parent to a child
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Slot {
    Child(usize),
    Facet(String),
}

/// Where the visited node sits in the tree
#[derive(Debug)]
pub struct VisitContext<'a> {
    pub client_id: &'a str,
    pub parent_client_id: Option<&'a str>,
    /// Steps from the root; empty for the root itself
    pub path: &'a [Slot],
    /// Some strict ancestor was added dynamically
    pub under_dynamic: bool,
    /// The node itself or an ancestor is transient
    pub under_transient: bool,
}

impl VisitContext<'_> {
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn slot(&self) -> Option<&Slot> {
        self.path.last()
    }
}

/// Read-only tree visitor
pub trait TreeVisitor {
    fn visit_node(&mut self, node: &ComponentNode, ctx: &VisitContext<'_>) -> VisitResult;
}

impl<F> TreeVisitor for F
where
    F: FnMut(&ComponentNode, &VisitContext<'_>) -> VisitResult,
{
    fn visit_node(&mut self, node: &ComponentNode, ctx: &VisitContext<'_>) -> VisitResult {
        self(node, ctx)
    }
}

/// Mutating tree visitor. Structure cannot change during the walk; only
/// attributes and per-request state.
pub trait TreeVisitorMut {
    fn visit_node_mut(&mut self, node: &mut ComponentNode, ctx: &VisitContext<'_>) -> VisitResult;
}

impl<F> TreeVisitorMut for F
where
    F: FnMut(&mut ComponentNode, &VisitContext<'_>) -> VisitResult,
{
    fn visit_node_mut(&mut self, node: &mut ComponentNode, ctx: &VisitContext<'_>) -> VisitResult {
        self(node, ctx)
    }
}

/// Ids are joined with `SEPARATOR` into client ids and must not contain it
pub fn is_valid_id(id: &str) -> bool {
    !id.contains(SEPARATOR)
}

pub fn client_id_for(prefix: &str, id: &str) -> String {
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{}{}{}", prefix, SEPARATOR, id)
    }
}

#[derive(Clone, Copy)]
struct Frame<'a> {
    prefix: &'a str,
    parent_client_id: Option<&'a str>,
    under_dynamic: bool,
    under_transient: bool,
}

impl<'a> Frame<'a> {
    fn root() -> Self {
        Self {
            prefix: "",
            parent_client_id: None,
            under_dynamic: false,
            under_transient: false,
        }
    }
}

/// Walk `root` and everything below it. Returns true if the visitor completed early.
pub fn walk_tree<V: TreeVisitor + ?Sized>(
    root: &ComponentNode,
    hints: VisitHints,
    visitor: &mut V,
) -> bool {
    let mut path = Vec::new();
    walk_node(root, Frame::root(), &mut path, hints, visitor)
}

/// Mutable counterpart of [`walk_tree`]
pub fn walk_tree_mut<V: TreeVisitorMut + ?Sized>(
    root: &mut ComponentNode,
    hints: VisitHints,
    visitor: &mut V,
) -> bool {
    let mut path = Vec::new();
    walk_node_mut(root, Frame::root(), &mut path, hints, visitor)
}

fn skipped(node: &ComponentNode, hints: VisitHints) -> bool {
    (hints.skip_transient && node.is_transient()) || (hints.skip_unrendered && !node.is_rendered())
}

fn walk_node<V: TreeVisitor + ?Sized>(
    node: &ComponentNode,
    frame: Frame<'_>,
    path: &mut Vec<Slot>,
    hints: VisitHints,
    visitor: &mut V,
) -> bool {
    if skipped(node, hints) {
        return false;
    }

    let client_id = client_id_for(frame.prefix, node.id());
    let under_transient = frame.under_transient || node.is_transient();
    let ctx = VisitContext {
        client_id: &client_id,
        parent_client_id: frame.parent_client_id,
        path: path.as_slice(),
        under_dynamic: frame.under_dynamic,
        under_transient,
    };

    match visitor.visit_node(node, &ctx) {
        VisitResult::Complete => return true,
        VisitResult::Reject => return false,
        VisitResult::Accept => {}
    }

    let child_frame = Frame {
        prefix: if node.kind().is_naming_container() {
            &client_id
        } else {
            frame.prefix
        },
        parent_client_id: Some(&client_id),
        under_dynamic: frame.under_dynamic || node.is_dynamic(),
        under_transient,
    };

    for (name, facet) in node.facets() {
        path.push(Slot::Facet(name.clone()));
        let done = walk_node(facet, child_frame, path, hints, visitor);
        path.pop();
        if done {
            return true;
        }
    }

    for (index, child) in node.children().iter().enumerate() {
        path.push(Slot::Child(index));
        let done = walk_node(child, child_frame, path, hints, visitor);
        path.pop();
        if done {
            return true;
        }
    }

    false
}

fn walk_node_mut<V: TreeVisitorMut + ?Sized>(
    node: &mut ComponentNode,
    frame: Frame<'_>,
    path: &mut Vec<Slot>,
    hints: VisitHints,
    visitor: &mut V,
) -> bool {
    if skipped(node, hints) {
        return false;
    }

    let client_id = client_id_for(frame.prefix, node.id());
    let under_transient = frame.under_transient || node.is_transient();
    let ctx = VisitContext {
        client_id: &client_id,
        parent_client_id: frame.parent_client_id,
        path: path.as_slice(),
        under_dynamic: frame.under_dynamic,
        under_transient,
    };

    match visitor.visit_node_mut(node, &ctx) {
        VisitResult::Complete => return true,
        VisitResult::Reject => return false,
        VisitResult::Accept => {}
    }

    let child_frame = Frame {
        prefix: if node.kind().is_naming_container() {
            &client_id
        } else {
            frame.prefix
        },
        parent_client_id: Some(&client_id),
        under_dynamic: frame.under_dynamic || node.is_dynamic(),
        under_transient,
    };

    for (name, facet) in node.facets.iter_mut() {
        path.push(Slot::Facet(name.clone()));
        let done = walk_node_mut(facet, child_frame, path, hints, visitor);
        path.pop();
        if done {
            return true;
        }
    }

    for (index, child) in node.children.iter_mut().enumerate() {
        path.push(Slot::Child(index));
        let done = walk_node_mut(child, child_frame, path, hints, visitor);
        path.pop();
        if done {
            return true;
        }
    }

    false
}
