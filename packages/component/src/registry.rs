//! Logical component type -> factory.
//!
//! Populated at configuration time; templates, restore and application code
//! all instantiate nodes through it.

use crate::descriptor::NodeDescriptor;
use crate::kind::NodeKind;
use crate::node::ComponentNode;
use crate::visit::is_valid_id;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub type ComponentFactory = Arc<dyn Fn() -> ComponentNode + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown component type: {0}")]
    UnknownType(String),

    #[error("Invalid id '{0}': ids must not contain ':'")]
    InvalidId(String),
}

/// How descriptor attributes combine with factory defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Descriptor attributes are layered over the factory's defaults
    Template,
    /// Descriptor attributes replace the factory's defaults (restoring saved nodes)
    Exact,
}

#[derive(Clone)]
pub struct ComponentRegistry {
    factories: HashMap<String, ComponentFactory>,
}

impl fmt::Debug for ComponentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.factories.keys().collect();
        types.sort();
        f.debug_struct("ComponentRegistry").field("types", &types).finish()
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ComponentRegistry {
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the `weft.*` component types
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_kind("weft.ViewRoot", NodeKind::ViewRoot);
        registry.register_kind("weft.Form", NodeKind::NamingContainer);
        registry.register_kind("weft.Panel", NodeKind::Container);
        registry.register_kind("weft.Output", NodeKind::Output);
        registry.register_kind("weft.Input", NodeKind::Input);
        registry.register_kind("weft.Command", NodeKind::Command);
        registry
    }

    pub fn register<F>(&mut self, component_type: impl Into<String>, factory: F)
    where
        F: Fn() -> ComponentNode + Send + Sync + 'static,
    {
        self.factories.insert(component_type.into(), Arc::new(factory));
    }

    /// Register a type whose nodes are plain nodes of `kind`
    pub fn register_kind(&mut self, component_type: &str, kind: NodeKind) {
        let name = component_type.to_string();
        self.register(component_type, move || ComponentNode::new(name.clone(), kind));
    }

    pub fn contains(&self, component_type: &str) -> bool {
        self.factories.contains_key(component_type)
    }

    pub fn instantiate(&self, component_type: &str) -> Result<ComponentNode, RegistryError> {
        let factory = self
            .factories
            .get(component_type)
            .ok_or_else(|| RegistryError::UnknownType(component_type.to_string()))?;
        let mut node = factory();
        node.set_component_type(component_type);
        Ok(node)
    }

    /// Instantiate a whole descriptor subtree. Nodes without an id take one from `next_id`.
    pub fn build(
        &self,
        descriptor: &NodeDescriptor,
        mode: BuildMode,
        next_id: &mut dyn FnMut() -> String,
    ) -> Result<ComponentNode, RegistryError> {
        let mut node = self.instantiate(&descriptor.component_type)?;

        match &descriptor.id {
            Some(id) if !is_valid_id(id) => return Err(RegistryError::InvalidId(id.clone())),
            Some(id) if !id.is_empty() => node.set_id(id.clone()),
            _ => node.set_id(next_id()),
        }

        match mode {
            BuildMode::Template => {
                for (name, value) in &descriptor.attributes {
                    node.set_attribute(name.clone(), value.clone());
                }
                for (name, expression) in &descriptor.bindings {
                    node.set_binding(name.clone(), expression.clone());
                }
            }
            BuildMode::Exact => {
                node.replace_attributes(descriptor.attributes.clone());
                node.replace_bindings(descriptor.bindings.clone());
            }
        }

        if descriptor.transient {
            node.set_transient(true);
        }

        for (name, facet) in &descriptor.facets {
            let built = self.build(facet, mode, next_id)?;
            node.facets.insert(name.clone(), built);
        }
        for child in &descriptor.children {
            let built = self.build(child, mode, next_id)?;
            node.children.push(built);
        }

        Ok(node)
    }
}
