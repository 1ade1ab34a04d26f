use crate::kind::NodeKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attribute and model values
pub type Value = serde_json::Value;

/// Attribute name -> value. Ordered so that anything derived from it is deterministic.
pub type AttributeMap = BTreeMap<String, Value>;

/// Attribute name -> expression source (`#{bean.prop}`)
pub type BindingMap = BTreeMap<String, String>;

/// Tree-internal node identity. Never persisted; reassigned on every build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeUid(pub(crate) u64);

impl NodeUid {
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

/// Snapshot taken by `ComponentTree::mark_initial_state`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Baseline {
    pub(crate) attributes: AttributeMap,
    pub(crate) bindings: BindingMap,
    pub(crate) client_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputFaultKind {
    Conversion,
    Validation,
    /// Pushing the value into the bound model property failed
    Model,
}

/// A recoverable fault recorded on an input node for the current request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFault {
    pub kind: InputFaultKind,
    pub message: String,
}

impl InputFault {
    pub fn conversion(message: impl Into<String>) -> Self {
        Self {
            kind: InputFaultKind::Conversion,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: InputFaultKind::Validation,
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self {
            kind: InputFaultKind::Model,
            message: message.into(),
        }
    }
}

/// Per-request processing state of an input node. Not part of saved state.
#[derive(Debug, Clone, PartialEq)]
pub struct InputState {
    /// Raw value decoded from the request
    pub submitted: Option<String>,
    /// Converted (and later validated) value waiting for the model update
    pub local_value: Option<Value>,
    pub valid: bool,
    pub fault: Option<InputFault>,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            submitted: None,
            local_value: None,
            valid: true,
            fault: None,
        }
    }
}

impl InputState {
    pub fn fail(&mut self, fault: InputFault) {
        self.valid = false;
        self.local_value = None;
        self.fault = Some(fault);
    }

    /// Forget the local value once it has been written to the model
    pub fn reset(&mut self) {
        self.submitted = None;
        self.local_value = None;
    }
}

/// A node of the component tree
#[derive(Debug, Clone)]
pub struct ComponentNode {
    pub(crate) uid: NodeUid,
    id: String,
    component_type: String,
    kind: NodeKind,
    attributes: AttributeMap,
    bindings: BindingMap,
    pub(crate) children: Vec<ComponentNode>,
    pub(crate) facets: BTreeMap<String, ComponentNode>,
    transient: bool,
    /// Presence or position not implied by the template
    pub(crate) dynamic: bool,
    pub(crate) baseline: Option<Baseline>,
    input: InputState,
}

impl ComponentNode {
    pub fn new(component_type: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            uid: NodeUid::default(),
            id: String::new(),
            component_type: component_type.into(),
            kind,
            attributes: AttributeMap::new(),
            bindings: BindingMap::new(),
            children: Vec::new(),
            facets: BTreeMap::new(),
            transient: false,
            dynamic: false,
            baseline: None,
            input: InputState::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_binding(mut self, name: impl Into<String>, expression: impl Into<String>) -> Self {
        self.bindings.insert(name.into(), expression.into());
        self
    }

    pub fn with_child(mut self, child: ComponentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, new_children: Vec<ComponentNode>) -> Self {
        self.children.extend(new_children);
        self
    }

    pub fn with_facet(mut self, name: impl Into<String>, facet: ComponentNode) -> Self {
        self.facets.insert(name.into(), facet);
        self
    }

    pub fn with_transient(mut self, transient: bool) -> Self {
        self.transient = transient;
        self
    }

    pub fn uid(&self) -> NodeUid {
        self.uid
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Changing the id of an attached node changes its client id; saved
    /// references to the old client id will no longer resolve. Ids containing
    /// `:` are rejected when the node enters a tree.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn component_type(&self) -> &str {
        &self.component_type
    }

    pub(crate) fn set_component_type(&mut self, component_type: impl Into<String>) {
        self.component_type = component_type.into();
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(Value::as_str)
    }

    pub fn attr_bool(&self, name: &str) -> bool {
        self.attributes
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    pub(crate) fn replace_attributes(&mut self, attributes: AttributeMap) {
        self.attributes = attributes;
    }

    pub fn bindings(&self) -> &BindingMap {
        &self.bindings
    }

    pub fn binding(&self, name: &str) -> Option<&str> {
        self.bindings.get(name).map(String::as_str)
    }

    pub fn set_binding(&mut self, name: impl Into<String>, expression: impl Into<String>) {
        self.bindings.insert(name.into(), expression.into());
    }

    pub fn remove_binding(&mut self, name: &str) -> Option<String> {
        self.bindings.remove(name)
    }

    pub(crate) fn replace_bindings(&mut self, bindings: BindingMap) {
        self.bindings = bindings;
    }

    pub fn children(&self) -> &[ComponentNode] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn facets(&self) -> &BTreeMap<String, ComponentNode> {
        &self.facets
    }

    pub fn facet(&self, name: &str) -> Option<&ComponentNode> {
        self.facets.get(name)
    }

    pub fn is_transient(&self) -> bool {
        self.transient
    }

    pub fn set_transient(&mut self, transient: bool) {
        self.transient = transient;
    }

    /// True when this node was inserted (or moved) after the template build
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub(crate) fn mark_dynamic(&mut self) {
        self.dynamic = true;
    }

    /// Template-declared attribute values, if the node came from the template
    pub fn initial_attributes(&self) -> Option<&AttributeMap> {
        self.baseline.as_ref().map(|b| &b.attributes)
    }

    pub fn initial_bindings(&self) -> Option<&BindingMap> {
        self.baseline.as_ref().map(|b| &b.bindings)
    }

    /// Client id the node had in the template-built tree
    pub fn baseline_client_id(&self) -> Option<&str> {
        self.baseline.as_ref().map(|b| b.client_id.as_str())
    }

    /// `rendered = false` removes a subtree from request processing
    pub fn is_rendered(&self) -> bool {
        self.attributes
            .get("rendered")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut InputState {
        &mut self.input
    }

    /// Compare with another node on everything that survives a save/restore
    /// cycle: ids, types, attributes, bindings, child order and facets.
    /// Transient subtrees are ignored on both sides.
    pub fn equivalent_to(&self, other: &ComponentNode) -> bool {
        if self.id != other.id
            || self.component_type != other.component_type
            || self.kind != other.kind
            || self.attributes != other.attributes
            || self.bindings != other.bindings
        {
            return false;
        }

        let ours: Vec<&ComponentNode> = self.children.iter().filter(|c| !c.transient).collect();
        let theirs: Vec<&ComponentNode> = other.children.iter().filter(|c| !c.transient).collect();
        if ours.len() != theirs.len() {
            return false;
        }
        if !ours.iter().zip(theirs.iter()).all(|(a, b)| a.equivalent_to(b)) {
            return false;
        }

        let our_facets: Vec<(&String, &ComponentNode)> =
            self.facets.iter().filter(|(_, f)| !f.transient).collect();
        let their_facets: Vec<(&String, &ComponentNode)> =
            other.facets.iter().filter(|(_, f)| !f.transient).collect();
        our_facets.len() == their_facets.len()
            && our_facets
                .iter()
                .zip(their_facets.iter())
                .all(|((na, a), (nb, b))| na == nb && a.equivalent_to(b))
    }

    /// Pre-order walk over this node, its facets, then its children
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a ComponentNode)) {
        f(self);
        for facet in self.facets.values() {
            facet.walk(f);
        }
        for child in &self.children {
            child.walk(f);
        }
    }

    pub(crate) fn walk_mut(&mut self, f: &mut dyn FnMut(&mut ComponentNode)) {
        f(self);
        for facet in self.facets.values_mut() {
            facet.walk_mut(f);
        }
        for child in &mut self.children {
            child.walk_mut(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input(id: &str) -> ComponentNode {
        ComponentNode::new("weft.Input", NodeKind::Input).with_id(id)
    }

    #[test]
    fn test_builder_sets_fields() {
        let node = input("age")
            .with_attr("required", true)
            .with_binding("value", "#{user.age}")
            .with_facet("label", ComponentNode::new("weft.Output", NodeKind::Output));

        assert_eq!(node.id(), "age");
        assert!(node.attr_bool("required"));
        assert_eq!(node.binding("value"), Some("#{user.age}"));
        assert!(node.facet("label").is_some());
        assert!(!node.is_dynamic());
        assert!(node.is_rendered());
    }

    #[test]
    fn test_rendered_false() {
        let node = input("x").with_attr("rendered", false);
        assert!(!node.is_rendered());
    }

    #[test]
    fn test_input_state_fail_and_reset() {
        let mut state = InputState::default();
        state.submitted = Some("abc".into());
        state.local_value = Some(json!("abc"));
        state.fail(InputFault::conversion("not a number"));

        assert!(!state.valid);
        assert!(state.local_value.is_none());
        assert_eq!(state.fault.as_ref().unwrap().kind, InputFaultKind::Conversion);

        state.reset();
        assert!(state.submitted.is_none());
    }

    #[test]
    fn test_equivalence_ignores_transient_children() {
        let a = ComponentNode::new("weft.Panel", NodeKind::Container)
            .with_id("p")
            .with_child(input("a"))
            .with_child(input("t").with_transient(true));
        let b = ComponentNode::new("weft.Panel", NodeKind::Container)
            .with_id("p")
            .with_child(input("a"));

        assert!(a.equivalent_to(&b));
        assert!(b.equivalent_to(&a));
    }

    #[test]
    fn test_equivalence_detects_attribute_and_order_changes() {
        let a = ComponentNode::new("weft.Panel", NodeKind::Container)
            .with_child(input("a"))
            .with_child(input("b"));
        let reordered = ComponentNode::new("weft.Panel", NodeKind::Container)
            .with_child(input("b"))
            .with_child(input("a"));
        let changed = ComponentNode::new("weft.Panel", NodeKind::Container)
            .with_child(input("a").with_attr("size", 3))
            .with_child(input("b"));

        assert!(!a.equivalent_to(&reordered));
        assert!(!a.equivalent_to(&changed));
    }
}
