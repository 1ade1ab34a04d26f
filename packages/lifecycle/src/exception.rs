//! # Exception Queue
//!
//! Faults raised while a phase runs are queued instead of unwinding, so
//! sibling listeners and callbacks still run. The coordinator drains the queue
//! after every phase.

use crate::action::ApplicationError;
use crate::phase::PhaseId;
use tracing::{debug, error, warn};
use weft_state::StructuralMismatch;

#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Uncaught failure of application code; fails the request
    Application(ApplicationError),
    /// Postback token did not resolve
    ViewExpired { view_id: String, token: Option<String> },
    /// Saved record skipped during restore
    StructuralMismatch(StructuralMismatch),
    /// A listener gave up on its own work; logged only
    AbortProcessing(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOrigin {
    BeforePhase,
    Phase,
    AfterPhase,
    Action,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuedFault {
    pub fault: Fault,
    pub phase: PhaseId,
    pub origin: FaultOrigin,
}

/// An application fault picked up by [`ExceptionQueue::handle`]
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationFault {
    pub error: ApplicationError,
    pub phase: PhaseId,
    pub origin: FaultOrigin,
}

/// What the coordinator has to act on after draining the queue
#[derive(Debug, Default)]
pub struct HandleOutcome {
    /// First application fault of the batch
    pub application: Option<ApplicationFault>,
    /// `(view_id, token)` of an expired postback
    pub view_expired: Option<(String, Option<String>)>,
}

#[derive(Debug, Default)]
pub struct ExceptionQueue {
    unhandled: Vec<QueuedFault>,
    handled: Vec<QueuedFault>,
}

impl ExceptionQueue {
    pub fn queue(&mut self, fault: Fault, phase: PhaseId, origin: FaultOrigin) {
        debug!(phase = %phase, origin = ?origin, fault = ?fault, "Fault queued");
        self.unhandled.push(QueuedFault { fault, phase, origin });
    }

    pub fn is_empty(&self) -> bool {
        self.unhandled.is_empty()
    }

    pub fn unhandled(&self) -> &[QueuedFault] {
        &self.unhandled
    }

    pub fn handled(&self) -> &[QueuedFault] {
        &self.handled
    }

    pub fn into_handled(self) -> Vec<QueuedFault> {
        self.handled
    }

    /// Move every queued fault to the handled list
    pub fn handle(&mut self) -> HandleOutcome {
        let mut outcome = HandleOutcome::default();

        for entry in self.unhandled.drain(..) {
            match &entry.fault {
                Fault::Application(err) => {
                    error!(phase = %entry.phase, origin = ?entry.origin, error = %err, "Application fault");
                    if outcome.application.is_none() {
                        outcome.application = Some(ApplicationFault {
                            error: err.clone(),
                            phase: entry.phase,
                            origin: entry.origin,
                        });
                    }
                }
                Fault::ViewExpired { view_id, token } => {
                    warn!(view_id = %view_id, "View expired");
                    if outcome.view_expired.is_none() {
                        outcome.view_expired = Some((view_id.clone(), token.clone()));
                    }
                }
                Fault::StructuralMismatch(mismatch) => {
                    warn!(client_id = %mismatch.client_id, reason = %mismatch.reason, "Partially restored view");
                }
                Fault::AbortProcessing(reason) => {
                    debug!(phase = %entry.phase, reason = %reason, "Listener aborted");
                }
            }
            self.handled.push(entry);
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_application_fault_wins() {
        let mut queue = ExceptionQueue::default();
        queue.queue(Fault::AbortProcessing("skip".into()), PhaseId::ApplyInput, FaultOrigin::BeforePhase);
        queue.queue(
            Fault::Application(ApplicationError::new("first")),
            PhaseId::InvokeApplication,
            FaultOrigin::Action,
        );
        queue.queue(
            Fault::Application(ApplicationError::new("second")),
            PhaseId::InvokeApplication,
            FaultOrigin::AfterPhase,
        );

        let outcome = queue.handle();
        let first = outcome.application.unwrap();
        assert_eq!(first.error, ApplicationError::new("first"));
        assert_eq!(first.origin, FaultOrigin::Action);
        assert!(outcome.view_expired.is_none());
        assert!(queue.is_empty());
        assert_eq!(queue.handled().len(), 3);
    }

    #[test]
    fn test_view_expired_is_reported() {
        let mut queue = ExceptionQueue::default();
        queue.queue(
            Fault::ViewExpired {
                view_id: "/a".into(),
                token: Some("t".into()),
            },
            PhaseId::Restore,
            FaultOrigin::Phase,
        );
        let outcome = queue.handle();
        assert_eq!(outcome.view_expired, Some(("/a".to_string(), Some("t".to_string()))));
        assert!(outcome.application.is_none());
    }
}
