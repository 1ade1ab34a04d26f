//! Per-request state threaded through every phase.

use crate::action::ActionEvent;
use crate::el::{truthy, ElContext, ElError, ExpressionEvaluator};
use crate::exception::{ExceptionQueue, Fault, FaultOrigin, QueuedFault};
use crate::message::{Message, Severity};
use crate::phase::PhaseId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use weft_component::{Flash, ScopeMap, SharedScope, Value, View};
use weft_state::{SessionState, StructuralMismatch};

/// One incoming request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub session_id: String,
    pub view_id: String,
    /// Marks a follow-up to a rendered view even when no token came with it
    #[serde(default)]
    pub postback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Submitted values keyed by client id
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Request {
    /// First request for a view
    pub fn initial(session_id: impl Into<String>, view_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            view_id: view_id.into(),
            ..Default::default()
        }
    }

    pub fn postback(session_id: impl Into<String>, view_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            view_id: view_id.into(),
            postback: true,
            state_token: Some(token.into()),
            ..Default::default()
        }
    }

    pub fn with_param(mut self, client_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(client_id.into(), value.into());
        self
    }

    pub fn is_postback(&self) -> bool {
        self.postback || self.state_token.is_some()
    }
}

/// Result of one lifecycle run
#[derive(Debug)]
pub struct Response {
    /// View that was rendered, or the requested one if nothing was
    pub view_id: String,
    pub view: Option<View>,
    pub state_token: Option<String>,
    /// Target of a client redirect
    pub redirect: Option<String>,
    pub messages: Vec<Message>,
    /// The postback token did not resolve and the recovery view was shown
    pub view_expired: bool,
    pub phases_run: Vec<PhaseId>,
    pub faults: Vec<QueuedFault>,
    pub mismatches: Vec<StructuralMismatch>,
    pub complete: bool,
}

impl Response {
    pub fn messages_for<'a>(&'a self, client_id: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        self.messages
            .iter()
            .filter(move |m| m.client_id.as_deref() == Some(client_id))
    }

    pub fn has_errors(&self) -> bool {
        self.messages.iter().any(|m| m.severity >= Severity::Error)
    }
}

pub struct RequestContext {
    request: Request,
    locale: String,
    view: Option<View>,
    detached_view_scope: ScopeMap,
    request_scope: ScopeMap,
    flash: Flash,
    session: Arc<SessionState>,
    session_scope: SharedScope,
    application_scope: SharedScope,
    evaluator: Arc<dyn ExpressionEvaluator>,
    messages: Vec<Message>,
    render_response: bool,
    response_complete: bool,
    phase: PhaseId,
    pub(crate) exceptions: ExceptionQueue,
    pub(crate) events: Vec<ActionEvent>,
    pub(crate) redirect: Option<String>,
    pub(crate) view_expired: bool,
    pub(crate) mismatches: Vec<StructuralMismatch>,
    pub(crate) phases_run: Vec<PhaseId>,
    pub(crate) state_token: Option<String>,
}

impl RequestContext {
    pub(crate) fn new(
        request: Request,
        locale: String,
        session: Arc<SessionState>,
        application_scope: SharedScope,
        evaluator: Arc<dyn ExpressionEvaluator>,
    ) -> Self {
        let flash = Flash::from_pending(session.take_flash());
        let session_scope = session.scope();
        Self {
            request,
            locale,
            view: None,
            detached_view_scope: ScopeMap::new(),
            request_scope: ScopeMap::new(),
            flash,
            session,
            session_scope,
            application_scope,
            evaluator,
            messages: Vec::new(),
            render_response: false,
            response_complete: false,
            phase: PhaseId::Restore,
            exceptions: ExceptionQueue::default(),
            events: Vec::new(),
            redirect: None,
            view_expired: false,
            mismatches: Vec::new(),
            phases_run: Vec::new(),
            state_token: None,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn phase(&self) -> PhaseId {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: PhaseId) {
        self.phase = phase;
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> Option<&mut View> {
        self.view.as_mut()
    }

    /// Replace the current view; the old one is dropped unsaved
    pub fn set_view(&mut self, view: View) {
        if let Some(old) = &self.view {
            debug!(from = %old.view_id, to = %view.view_id, "View replaced");
        }
        self.view = Some(view);
    }

    /// The view alongside the request, for passes that read submitted values
    pub(crate) fn view_and_request(&mut self) -> (Option<&mut View>, &Request) {
        (self.view.as_mut(), &self.request)
    }

    pub fn view_id(&self) -> &str {
        self.view
            .as_ref()
            .map(|v| v.view_id.as_str())
            .unwrap_or(self.request.view_id.as_str())
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn flash(&self) -> &Flash {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut Flash {
        &mut self.flash
    }

    pub fn request_scope(&self) -> &ScopeMap {
        &self.request_scope
    }

    pub fn request_scope_mut(&mut self) -> &mut ScopeMap {
        &mut self.request_scope
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn add_message(&mut self, message: Message) {
        debug!(severity = ?message.severity, client_id = ?message.client_id, summary = %message.summary, "Message added");
        self.messages.push(message);
    }

    /// Skip the remaining phases up to RENDER
    pub fn render_response(&mut self) {
        self.render_response = true;
    }

    /// Skip every remaining phase, RENDER included
    pub fn response_complete(&mut self) {
        self.response_complete = true;
    }

    pub fn is_render_response(&self) -> bool {
        self.render_response
    }

    pub fn is_response_complete(&self) -> bool {
        self.response_complete
    }

    /// Queue a fault raised by the current phase
    pub fn queue_fault(&mut self, fault: Fault) {
        self.queue_fault_from(fault, FaultOrigin::Phase);
    }

    pub(crate) fn queue_fault_from(&mut self, fault: Fault, origin: FaultOrigin) {
        self.exceptions.queue(fault, self.phase, origin);
    }

    fn el(&mut self) -> ElContext<'_> {
        let view = match self.view.as_mut() {
            Some(view) => &mut view.view_scope,
            None => &mut self.detached_view_scope,
        };
        ElContext {
            request: &mut self.request_scope,
            view,
            flash: &mut self.flash,
            session: &self.session_scope,
            application: &self.application_scope,
        }
    }

    pub fn evaluate_get(&mut self, expression: &str) -> Result<Value, ElError> {
        let evaluator = Arc::clone(&self.evaluator);
        let el = self.el();
        evaluator.get(expression, &el)
    }

    pub fn evaluate_set(&mut self, expression: &str, value: Value) -> Result<(), ElError> {
        let evaluator = Arc::clone(&self.evaluator);
        let mut el = self.el();
        evaluator.set(expression, &mut el, value)
    }

    /// Conditions that fail to evaluate count as false
    pub fn evaluate_condition(&mut self, expression: &str) -> bool {
        match self.evaluate_get(expression) {
            Ok(value) => truthy(&value),
            Err(err) => {
                warn!(expression = %expression, error = %err, "Condition failed to evaluate");
                false
            }
        }
    }

    /// The request failed without a response. Flash values it received, and
    /// any it added, are handed back to the session for the next request.
    pub(crate) fn abandon(self) {
        let mut pending = self.flash.current().clone();
        pending.extend(self.flash.outgoing().clone());
        if !pending.is_empty() {
            debug!(values = pending.len(), "Returning flash to session");
        }
        self.session.set_flash(pending);
    }

    /// End of request. Flash values go to the session only if the response redirects.
    pub(crate) fn finish(self) -> Response {
        let view_id = self.view_id().to_string();
        self.session
            .set_flash(self.flash.into_pending(self.redirect.is_some()));

        Response {
            view_id,
            view: self.view,
            state_token: self.state_token,
            redirect: self.redirect,
            messages: self.messages,
            view_expired: self.view_expired,
            phases_run: self.phases_run,
            faults: self.exceptions.into_handled(),
            mismatches: self.mismatches,
            complete: self.response_complete,
        }
    }
}
