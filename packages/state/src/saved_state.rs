//! Persisted form of a view.
//!
//! ```text
//! { viewId, sequence,
//!   attributeDiffs:  [ { clientId, set, cleared, bindings } ],
//!   structuralEdits: [ { op: "remove", clientId }
//!                    | { op: "insert", parentClientId, index, facet?, descriptor } ],
//!   fullTree?, viewScope, idCounter }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use weft_component::{AttributeMap, NodeDescriptor, ScopeMap};

/// Attribute values of one template node that differ from its declared defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDiff {
    pub client_id: String,

    /// Changed or added values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: AttributeMap,

    /// Declared attributes that were removed
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleared: Vec<String>,

    /// Binding changes; `None` removes the declared binding
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BTreeMap<String, Option<String>>,
}

impl AttributeDiff {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.cleared.is_empty() && self.bindings.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum StructuralEdit {
    /// Remove a template node, addressed by its client id in the template-built tree
    #[serde(rename_all = "camelCase")]
    Remove { client_id: String },

    /// Insert a node that the template does not declare
    #[serde(rename_all = "camelCase")]
    Insert {
        parent_client_id: String,
        index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        facet: Option<String>,
        descriptor: NodeDescriptor,
    },
}

impl StructuralEdit {
    pub fn client_id(&self) -> &str {
        match self {
            StructuralEdit::Remove { client_id } => client_id,
            StructuralEdit::Insert {
                parent_client_id, ..
            } => parent_client_id,
        }
    }
}

/// Difference between a live tree and its template-built baseline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeDiff {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attribute_diffs: Vec<AttributeDiff>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub structural_edits: Vec<StructuralEdit>,
}

impl TreeDiff {
    pub fn is_empty(&self) -> bool {
        self.attribute_diffs.is_empty() && self.structural_edits.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.attribute_diffs.len() + self.structural_edits.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedState {
    pub view_id: String,

    /// Per-session save counter
    pub sequence: u64,

    #[serde(flatten)]
    pub diff: TreeDiff,

    /// Present when the whole tree was saved instead of a diff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_tree: Option<NodeDescriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub view_scope: ScopeMap,

    /// Next generated-id number of the tree
    #[serde(default)]
    pub id_counter: u64,
}

impl SavedState {
    pub fn partial(view_id: impl Into<String>, sequence: u64, diff: TreeDiff) -> Self {
        Self {
            view_id: view_id.into(),
            sequence,
            diff,
            full_tree: None,
            view_scope: ScopeMap::new(),
            id_counter: 0,
        }
    }

    pub fn full(view_id: impl Into<String>, sequence: u64, tree: NodeDescriptor) -> Self {
        Self {
            view_id: view_id.into(),
            sequence,
            diff: TreeDiff::default(),
            full_tree: Some(tree),
            view_scope: ScopeMap::new(),
            id_counter: 0,
        }
    }

    pub fn is_full(&self) -> bool {
        self.full_tree.is_some()
    }
}

/// A saved record that could not be applied to the current template
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Skipped {record} record for '{client_id}': {reason}")]
pub struct StructuralMismatch {
    pub record: RecordKind,
    pub client_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Remove,
    Insert,
    Attributes,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Remove => "remove",
            RecordKind::Insert => "insert",
            RecordKind::Attributes => "attribute",
        };
        f.write_str(name)
    }
}
