//! # Weft Lifecycle
//!
//! Request processing for weft views.
//!
//! ```text
//! Request ──▶ Lifecycle::run ──▶ RESTORE ─ APPLY_INPUT ─ PROCESS_VALIDATIONS
//!                                   │            ─ UPDATE_MODEL ─ INVOKE_APPLICATION
//!                                   ▼
//!                                RENDER (state saved, token issued) ──▶ Response
//! ```
//!
//! Everything configured once (templates, registries, listeners, navigation
//! rules, the state manager and session store) lives in [`Application`].
//! Everything that belongs to one request lives in [`RequestContext`], which
//! is passed explicitly to every phase, listener and action.

pub mod action;
pub mod application;
pub mod context;
pub mod convert;
pub mod coordinator;
pub mod el;
pub mod error;
pub mod exception;
pub mod listener;
pub mod message;
pub mod navigation;
pub mod phase;
pub mod validate;

#[cfg(test)]
mod tests_lifecycle;

pub use action::{
    ActionEvent, ActionHandler, ActionListener, ActionRegistry, ApplicationError, ValueChangeEvent, ValueChangeListener,
};
pub use application::Application;
pub use context::{Request, RequestContext, Response};
pub use convert::{ConversionError, Converter, ConverterRegistry};
pub use coordinator::Lifecycle;
pub use el::{ElContext, ElError, ExpressionEvaluator, ScopedPathEvaluator};
pub use error::LifecycleError;
pub use exception::{ApplicationFault, ExceptionQueue, Fault, FaultOrigin, QueuedFault};
pub use listener::{FnListener, ListenerError, PhaseListener};
pub use message::{Message, Severity};
pub use navigation::{NavigationCase, NavigationOutcome, NavigationResolver, NavigationRule};
pub use phase::PhaseId;
pub use validate::{ValidationError, Validator, ValidatorRegistry};
