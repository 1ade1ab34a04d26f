//! Phase listeners.
//!
//! Before-listeners run in registration order, after-listeners in reverse.
//! A failing listener never stops the phase; its error is queued.

use crate::action::ApplicationError;
use crate::context::RequestContext;
use crate::phase::PhaseId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ListenerError {
    /// The listener stops its own work; logged and otherwise ignored
    #[error("Listener aborted: {0}")]
    Abort(String),

    #[error(transparent)]
    Application(#[from] ApplicationError),
}

pub trait PhaseListener: Send + Sync {
    /// Phase this listener observes; [`PhaseId::Any`] for all of them
    fn phase_id(&self) -> PhaseId;

    fn before_phase(&self, _ctx: &mut RequestContext, _phase: PhaseId) -> Result<(), ListenerError> {
        Ok(())
    }

    fn after_phase(&self, _ctx: &mut RequestContext, _phase: PhaseId) -> Result<(), ListenerError> {
        Ok(())
    }
}

type ListenerFn = Box<dyn Fn(&mut RequestContext, PhaseId) -> Result<(), ListenerError> + Send + Sync>;

/// Listener built from closures
pub struct FnListener {
    phase: PhaseId,
    before: Option<ListenerFn>,
    after: Option<ListenerFn>,
}

impl FnListener {
    pub fn new(phase: PhaseId) -> Self {
        Self {
            phase,
            before: None,
            after: None,
        }
    }

    pub fn before<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RequestContext, PhaseId) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.before = Some(Box::new(f));
        self
    }

    pub fn after<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut RequestContext, PhaseId) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.after = Some(Box::new(f));
        self
    }
}

impl PhaseListener for FnListener {
    fn phase_id(&self) -> PhaseId {
        self.phase
    }

    fn before_phase(&self, ctx: &mut RequestContext, phase: PhaseId) -> Result<(), ListenerError> {
        match &self.before {
            Some(f) => f(ctx, phase),
            None => Ok(()),
        }
    }

    fn after_phase(&self, ctx: &mut RequestContext, phase: PhaseId) -> Result<(), ListenerError> {
        match &self.after {
            Some(f) => f(ctx, phase),
            None => Ok(()),
        }
    }
}
