use crate::action::ApplicationError;
use crate::context::Response;
use crate::phase::PhaseId;
use thiserror::Error;
use weft_common::CommonError;
use weft_component::{TemplateError, TreeError};
use weft_state::StateError;

#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Postback token did not resolve and no recovery view is configured
    #[error("View '{view_id}' has expired")]
    ViewExpired { view_id: String, token: Option<String> },

    /// First unhandled application fault; carries whatever could still be rendered
    #[error("Application fault during {phase}: {source}")]
    Application {
        phase: PhaseId,
        source: ApplicationError,
        response: Option<Box<Response>>,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Config(#[from] CommonError),
}

impl LifecycleError {
    pub fn is_view_expired(&self) -> bool {
        matches!(self, LifecycleError::ViewExpired { .. })
    }

    /// Partial response attached to an application fault
    pub fn response(&self) -> Option<&Response> {
        match self {
            LifecycleError::Application { response, .. } => response.as_deref(),
            _ => None,
        }
    }
}
