//! Error types for state saving

use thiserror::Error;
use weft_component::{RegistryError, TemplateError, TreeError};

#[derive(Error, Debug)]
pub enum StateError {
    /// The token does not resolve to a saved state: never issued, evicted,
    /// undecodable, or issued for another view.
    #[error("View expired: no state for '{view_id}' under token '{token}'")]
    ViewExpired { view_id: String, token: String },

    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid state payload: {0}")]
    Payload(#[from] base64::DecodeError),

    #[error("View cache capacity must be at least 1")]
    ZeroCapacity,
}

impl StateError {
    pub fn expired(view_id: impl Into<String>, token: impl Into<String>) -> Self {
        StateError::ViewExpired {
            view_id: view_id.into(),
            token: token.into(),
        }
    }

    pub fn is_view_expired(&self) -> bool {
        matches!(self, StateError::ViewExpired { .. })
    }
}
