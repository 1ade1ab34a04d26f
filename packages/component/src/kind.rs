use serde::{Deserialize, Serialize};

/// Closed set of node capabilities, selected by the registry for a logical type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    ViewRoot,
    /// Plain grouping node, no own namespace
    Container,
    /// Scopes the ids of its descendants (forms, repeated regions)
    NamingContainer,
    Output,
    /// Decodes, converts, validates and updates a model value
    Input,
    /// Decodes into an action event
    Command,
}

impl NodeKind {
    pub fn is_naming_container(self) -> bool {
        matches!(self, NodeKind::NamingContainer)
    }

    pub fn is_input(self) -> bool {
        matches!(self, NodeKind::Input)
    }

    pub fn is_command(self) -> bool {
        matches!(self, NodeKind::Command)
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::ViewRoot => "viewRoot",
            NodeKind::Container => "container",
            NodeKind::NamingContainer => "namingContainer",
            NodeKind::Output => "output",
            NodeKind::Input => "input",
            NodeKind::Command => "command",
        }
    }
}
