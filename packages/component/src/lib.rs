//! # Weft Components
//!
//! The component tree that every request works on.
//!
//! ```text
//! template (NodeDescriptor) ──registry──▶ ComponentNode tree
//!                                              │ mark_initial_state()
//!                                              ▼
//!                                   ComponentTree (edit tracking)
//!                                              │
//!                                              ▼
//!                                  View { tree, scopes, token }
//! ```
//!
//! Nodes are owned top-down by their parent. Client ids are derived from the
//! naming-container ancestors, never stored.

pub mod descriptor;
pub mod kind;
pub mod node;
pub mod registry;
pub mod scope;
pub mod template;
pub mod tree;
pub mod view;
pub mod visit;

#[cfg(test)]
mod tests_tree;

pub use descriptor::NodeDescriptor;
pub use kind::NodeKind;
pub use node::{AttributeMap, BindingMap, ComponentNode, InputFault, InputFaultKind, InputState, NodeUid, Value};
pub use registry::{BuildMode, ComponentFactory, ComponentRegistry, RegistryError};
pub use scope::{Flash, Scope, ScopeMap, SharedScope};
pub use template::{TemplateError, TemplateSet, ViewTemplates};
pub use tree::{ComponentTree, NodeLocation, StructuralChange, TreeError};
pub use view::View;
pub use visit::{
    client_id_for, is_valid_id, walk_tree, walk_tree_mut, Slot, TreeVisitor, TreeVisitorMut, VisitContext,
    VisitHints, VisitResult, SEPARATOR,
};
