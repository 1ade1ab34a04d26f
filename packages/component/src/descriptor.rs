//! Serializable description of a node subtree.
//!
//! Used for JSON templates, for insert records in saved state and for
//! full-state saving.

use crate::node::{AttributeMap, BindingMap, ComponentNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    #[serde(rename = "type")]
    pub component_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: AttributeMap,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bindings: BindingMap,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDescriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, NodeDescriptor>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub transient: bool,
}

impl NodeDescriptor {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), expression.into());
        self
    }

    pub fn with_child(mut self, child: NodeDescriptor) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_facet(mut self, name: impl Into<String>, facet: NodeDescriptor) -> Self {
        self.facets.insert(name.into(), facet);
        self
    }

    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    /// Number of nodes in the described subtree
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(NodeDescriptor::node_count).sum::<usize>()
            + self.facets.values().map(NodeDescriptor::node_count).sum::<usize>()
    }
}

impl ComponentNode {
    /// Describe this node and its non-transient descendants exactly as they are now.
    /// Returns `None` for a transient node.
    pub fn to_descriptor(&self) -> Option<NodeDescriptor> {
        if self.is_transient() {
            return None;
        }

        Some(NodeDescriptor {
            component_type: self.component_type().to_string(),
            id: Some(self.id().to_string()),
            attributes: self.attributes().clone(),
            bindings: self.bindings().clone(),
            children: self
                .children()
                .iter()
                .filter_map(ComponentNode::to_descriptor)
                .collect(),
            facets: self
                .facets()
                .iter()
                .filter_map(|(name, facet)| facet.to_descriptor().map(|d| (name.clone(), d)))
                .collect(),
            transient: false,
        })
    }
}
