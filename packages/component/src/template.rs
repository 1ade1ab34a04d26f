//! View templates: the source of the baseline tree for a view id.

use crate::descriptor::NodeDescriptor;
use crate::registry::{BuildMode, ComponentRegistry, RegistryError};
use crate::node::ComponentNode;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("No template for view: {0}")]
    ViewNotFound(String),

    #[error("Template for '{view_id}' is invalid: {source}")]
    Build {
        view_id: String,
        #[source]
        source: RegistryError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Builds the template-declared tree for a view. Two builds of the same view
/// must produce identical trees, generated ids included.
pub trait ViewTemplates: Send + Sync {
    fn build(&self, view_id: &str, registry: &ComponentRegistry) -> Result<ComponentNode, TemplateError>;

    fn contains(&self, view_id: &str) -> bool;
}

/// Templates declared as JSON node descriptors keyed by view id
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    views: BTreeMap<String, NodeDescriptor>,
}

impl TemplateSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        let views: BTreeMap<String, NodeDescriptor> = serde_json::from_str(json)?;
        Ok(Self { views })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn insert(&mut self, view_id: impl Into<String>, root: NodeDescriptor) {
        self.views.insert(view_id.into(), root);
    }

    pub fn view_ids(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }
}

impl ViewTemplates for TemplateSet {
    fn build(&self, view_id: &str, registry: &ComponentRegistry) -> Result<ComponentNode, TemplateError> {
        let root = self
            .views
            .get(view_id)
            .ok_or_else(|| TemplateError::ViewNotFound(view_id.to_string()))?;

        let mut counter = 0u64;
        let mut next_id = || {
            let id = format!("j_idt{}", counter);
            counter += 1;
            id
        };

        registry
            .build(root, BuildMode::Template, &mut next_id)
            .map_err(|source| TemplateError::Build {
                view_id: view_id.to_string(),
                source,
            })
    }

    fn contains(&self, view_id: &str) -> bool {
        self.views.contains_key(view_id)
    }
}
