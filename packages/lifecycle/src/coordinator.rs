//! # Lifecycle Coordinator
//!
//! Runs one request against one view:
//!
//! ```text
//! RESTORE → APPLY_INPUT → PROCESS_VALIDATIONS → UPDATE_MODEL → INVOKE_APPLICATION → RENDER
//! ```
//!
//! Each phase is wrapped by its listeners and followed by a drain of the
//! exception queue. Transitions are unconditional except for:
//!
//! - `render_response()`: the remaining phases are skipped up to RENDER
//! - `response_complete()`: everything is skipped, RENDER included
//! - an input that failed conversion, validation or model update: RENDER
//!   follows UPDATE_MODEL directly, so no action runs on bad input
//! - an application fault: the request fails after a best-effort RENDER

use crate::action::{ActionEvent, ApplicationError, ValueChangeEvent};
use crate::application::Application;
use crate::context::{Request, RequestContext, Response};
use crate::convert::ConversionError;
use crate::el::expression_body;
use crate::error::LifecycleError;
use crate::exception::{Fault, FaultOrigin};
use crate::listener::{ListenerError, PhaseListener};
use crate::message::Message;
use crate::phase::PhaseId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use weft_component::{
    ComponentNode, ComponentTree, InputFault, Value, View, VisitContext, VisitHints, VisitResult,
};

#[derive(Debug, Clone)]
pub struct Lifecycle {
    app: Arc<Application>,
}

impl Lifecycle {
    pub fn new(app: Arc<Application>) -> Self {
        Self { app }
    }

    pub fn application(&self) -> &Application {
        &self.app
    }

    /// Run every phase for `request`
    #[instrument(skip(self, request), fields(view_id = %request.view_id, session_id = %request.session_id, postback = request.is_postback()))]
    pub fn run(&self, request: Request) -> Result<Response, LifecycleError> {
        let session = self.app.sessions().get_or_create(&request.session_id)?;
        let locale = request
            .locale
            .clone()
            .unwrap_or_else(|| self.app.config().default_locale.clone());
        let mut ctx = RequestContext::new(request, locale, session, self.app.scope(), self.app.evaluator());

        let outcome = match self.execute(&mut ctx) {
            Ok(()) => self.render(&mut ctx),
            Err(err @ LifecycleError::Application { .. }) => {
                // Show whatever state and messages exist
                if let Err(render_err) = self.render(&mut ctx) {
                    warn!(error = %render_err, "Best-effort render failed");
                }
                Err(err)
            }
            Err(err) => {
                ctx.abandon();
                return Err(err);
            }
        };

        match outcome {
            Ok(()) => {
                let response = ctx.finish();
                info!(
                    rendered = %response.view_id,
                    phases = response.phases_run.len(),
                    messages = response.messages.len(),
                    redirect = ?response.redirect,
                    "Request complete"
                );
                Ok(response)
            }
            Err(LifecycleError::Application { phase, source, .. }) => Err(LifecycleError::Application {
                phase,
                source,
                response: Some(Box::new(ctx.finish())),
            }),
            Err(err) => {
                ctx.abandon();
                Err(err)
            }
        }
    }

    /// RESTORE through INVOKE_APPLICATION
    pub fn execute(&self, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        for phase in PhaseId::EXECUTE {
            if ctx.is_response_complete() || ctx.is_render_response() {
                debug!(phase = %phase, "Skipping phase");
                continue;
            }
            self.run_phase(phase, ctx)?;
        }
        Ok(())
    }

    pub fn render(&self, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        if ctx.is_response_complete() {
            debug!("Response complete, skipping render");
            return Ok(());
        }
        self.run_phase(PhaseId::Render, ctx)
    }

    #[instrument(skip_all, fields(phase = %phase))]
    fn run_phase(&self, phase: PhaseId, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        ctx.set_phase(phase);
        debug!("Phase begin");

        self.broadcast(phase, ctx, FaultOrigin::BeforePhase);

        let skip = ctx.is_response_complete() || (phase != PhaseId::Render && ctx.is_render_response());
        if skip {
            debug!("Phase body skipped by listener");
        } else {
            match phase {
                PhaseId::Restore => self.restore_view(ctx)?,
                PhaseId::ApplyInput => self.apply_input(ctx)?,
                PhaseId::ProcessValidations => self.process_validations(ctx),
                PhaseId::UpdateModel => self.update_model(ctx),
                PhaseId::InvokeApplication => self.invoke_application(ctx)?,
                PhaseId::Render => self.render_view(ctx)?,
                PhaseId::Any => {}
            }
        }

        self.broadcast(phase, ctx, FaultOrigin::AfterPhase);
        ctx.phases_run.push(phase);
        debug!("Phase end");

        self.handle_exceptions(ctx)
    }

    fn broadcast(&self, phase: PhaseId, ctx: &mut RequestContext, origin: FaultOrigin) {
        let mut listeners: Vec<&Arc<dyn PhaseListener>> = self
            .app
            .listeners()
            .iter()
            .filter(|listener| listener.phase_id().matches(phase))
            .collect();
        if origin == FaultOrigin::AfterPhase {
            listeners.reverse();
        }

        for listener in listeners {
            let result = match origin {
                FaultOrigin::BeforePhase => listener.before_phase(ctx, phase),
                _ => listener.after_phase(ctx, phase),
            };
            if let Err(err) = result {
                let fault = match err {
                    ListenerError::Abort(reason) => Fault::AbortProcessing(reason),
                    ListenerError::Application(err) => Fault::Application(err),
                };
                ctx.queue_fault_from(fault, origin);
            }
        }
    }

    fn handle_exceptions(&self, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        if ctx.exceptions.is_empty() {
            return Ok(());
        }

        let outcome = ctx.exceptions.handle();
        if let Some((view_id, token)) = outcome.view_expired {
            self.recover(ctx, view_id, token)?;
        }

        match outcome.application {
            Some(fault) => Err(LifecycleError::Application {
                phase: fault.phase,
                source: fault.error,
                response: None,
            }),
            None => Ok(()),
        }
    }

    fn recover(&self, ctx: &mut RequestContext, view_id: String, token: Option<String>) -> Result<(), LifecycleError> {
        let recovery = match &self.app.config().view_expired_recovery_view {
            Some(recovery) => recovery.clone(),
            None => return Err(LifecycleError::ViewExpired { view_id, token }),
        };

        info!(view_id = %view_id, recovery = %recovery, "Rendering recovery view");
        let view = self.create_view(&recovery, ctx.locale())?;
        ctx.set_view(view);
        ctx.view_expired = true;
        ctx.render_response();
        Ok(())
    }

    fn create_view(&self, view_id: &str, locale: &str) -> Result<View, LifecycleError> {
        let root = self.app.templates().build(view_id, self.app.registry())?;
        let mut tree = ComponentTree::new(root);
        tree.mark_initial_state();
        debug!(view_id = %view_id, "Created view from template");
        Ok(View::new(view_id, tree, locale))
    }

    fn restore_view(&self, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        let view_id = ctx.request().view_id.clone();

        if !ctx.request().is_postback() {
            let view = self.create_view(&view_id, ctx.locale())?;
            ctx.set_view(view);
            ctx.render_response();
            return Ok(());
        }

        let token = match ctx.request().state_token.clone() {
            Some(token) => token,
            None => {
                ctx.queue_fault(Fault::ViewExpired { view_id, token: None });
                return Ok(());
            }
        };

        let session = Arc::clone(ctx.session());
        let restored = self.app.state().restore(
            &view_id,
            &token,
            ctx.locale(),
            &session,
            self.app.templates(),
            self.app.registry(),
        );

        match restored {
            Ok(restored) => {
                for mismatch in restored.mismatches {
                    ctx.mismatches.push(mismatch.clone());
                    ctx.queue_fault(Fault::StructuralMismatch(mismatch));
                }
                ctx.set_view(restored.view);
                Ok(())
            }
            Err(err) if err.is_view_expired() => {
                ctx.queue_fault(Fault::ViewExpired {
                    view_id,
                    token: Some(token),
                });
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    fn apply_input(&self, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        let mut events = Vec::new();
        let (mut has_immediate, mut has_deferred) = (false, false);

        let (view, request) = ctx.view_and_request();
        if let Some(view) = view {
            view.tree.visit_mut(
                VisitHints::processing(),
                &mut |node: &mut ComponentNode, visit: &VisitContext<'_>| {
                    let kind = node.kind();
                    if !(kind.is_input() || kind.is_command()) || node.attr_bool("disabled") {
                        return VisitResult::Accept;
                    }
                    let submitted = match request.params.get(visit.client_id) {
                        Some(value) => value.clone(),
                        None => return VisitResult::Accept,
                    };
                    let immediate = node.attr_bool("immediate");

                    if kind.is_command() {
                        debug!(source = %visit.client_id, immediate, "Command activated");
                        events.push(ActionEvent {
                            source: visit.client_id.to_string(),
                            immediate,
                        });
                    } else {
                        node.input_mut().submitted = Some(submitted);
                        if immediate {
                            has_immediate = true;
                        } else {
                            has_deferred = true;
                        }
                    }
                    VisitResult::Accept
                },
            );
        }

        let immediate_failed = has_immediate && {
            let conversion_failed = self.convert_inputs(ctx, true);
            let validation_failed = self.validate_inputs(ctx, true);
            conversion_failed || validation_failed
        };

        let (immediate, deferred): (Vec<ActionEvent>, Vec<ActionEvent>) =
            events.into_iter().partition(|e| e.immediate);
        ctx.events = deferred;

        if !immediate.is_empty() {
            if immediate_failed {
                debug!(events = immediate.len(), "Immediate input invalid, dropping immediate events");
            } else {
                self.dispatch_events(ctx, immediate)?;
                if !ctx.is_response_complete() {
                    ctx.render_response();
                }
            }
        }

        if ctx.is_render_response() || ctx.is_response_complete() {
            return Ok(());
        }
        if has_deferred {
            self.convert_inputs(ctx, false);
        }
        Ok(())
    }

    fn process_validations(&self, ctx: &mut RequestContext) {
        // Immediate inputs were validated during APPLY_INPUT
        self.validate_inputs(ctx, false);
    }

    fn update_model(&self, ctx: &mut RequestContext) {
        let mut writes = Vec::new();
        if let Some(view) = ctx.view_mut() {
            view.tree.visit_mut(
                VisitHints::processing(),
                &mut |node: &mut ComponentNode, visit: &VisitContext<'_>| {
                    if !node.kind().is_input() || !node.input().valid {
                        return VisitResult::Accept;
                    }
                    let value = match &node.input().local_value {
                        Some(value) => value.clone(),
                        None => return VisitResult::Accept,
                    };
                    match node.binding("value").map(String::from) {
                        Some(expression) => writes.push((visit.client_id.to_string(), expression, value)),
                        None => {
                            node.set_attribute("value", value);
                            node.input_mut().reset();
                        }
                    }
                    VisitResult::Accept
                },
            );
        }

        let mut outcomes = HashMap::new();
        for (client_id, expression, value) in writes {
            let outcome = ctx.evaluate_set(&expression, value).map_err(|err| err.to_string());
            if outcome.is_ok() {
                debug!(client_id = %client_id, expression = %expression, "Model updated");
            }
            outcomes.insert(client_id, outcome);
        }

        let mut messages = Vec::new();
        if let Some(view) = ctx.view_mut().filter(|_| !outcomes.is_empty()) {
            view.tree.visit_mut(
                VisitHints::processing(),
                &mut |node: &mut ComponentNode, visit: &VisitContext<'_>| {
                    match outcomes.remove(visit.client_id) {
                        Some(Ok(())) => node.input_mut().reset(),
                        Some(Err(message)) => reject(node, visit.client_id, InputFault::model(message), &mut messages),
                        None => {}
                    }
                    if outcomes.is_empty() {
                        VisitResult::Complete
                    } else {
                        VisitResult::Accept
                    }
                },
            );
        }
        for message in messages {
            ctx.add_message(message);
        }

        if has_invalid_input(ctx) {
            info!("Input errors present, skipping to render");
            ctx.render_response();
        }
    }

    fn invoke_application(&self, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        let events = std::mem::take(&mut ctx.events);
        self.dispatch_events(ctx, events)
    }

    /// Broadcast events in order; stops after the first navigation
    fn dispatch_events(&self, ctx: &mut RequestContext, events: Vec<ActionEvent>) -> Result<(), LifecycleError> {
        for event in events {
            if ctx.is_response_complete() {
                break;
            }
            if self.dispatch(ctx, &event)? {
                break;
            }
        }
        Ok(())
    }

    /// Returns true if the event navigated
    fn dispatch(&self, ctx: &mut RequestContext, event: &ActionEvent) -> Result<bool, LifecycleError> {
        let (listener, action_binding, action_outcome) = match find(ctx, &event.source) {
            Some(node) => (
                node.binding("actionListener").map(String::from),
                node.binding("action").map(String::from),
                node.attr_str("action").map(String::from),
            ),
            None => {
                debug!(source = %event.source, "Command no longer in view");
                return Ok(false);
            }
        };
        info!(source = %event.source, immediate = event.immediate, "Dispatching action");

        if let Some(expression) = listener {
            let name = expression_body(&expression);
            let result = match self.app.actions().listener(name) {
                Some(listener) => listener(ctx, event),
                None => Err(ApplicationError::new(format!("No action listener named '{}'", name))),
            };
            if let Err(err) = result {
                ctx.queue_fault_from(Fault::Application(err), FaultOrigin::Action);
                return Ok(false);
            }
        }

        let outcome = match &action_binding {
            Some(expression) => {
                let name = expression_body(expression);
                let result = match self.app.actions().action(name) {
                    Some(handler) => handler(ctx, event),
                    None => Err(ApplicationError::new(format!("No action named '{}'", name))),
                };
                match result {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        ctx.queue_fault_from(Fault::Application(err), FaultOrigin::Action);
                        return Ok(false);
                    }
                }
            }
            None => action_outcome,
        };

        self.navigate(ctx, action_binding.as_deref(), outcome.as_deref())
    }

    fn navigate(
        &self,
        ctx: &mut RequestContext,
        from_action: Option<&str>,
        outcome: Option<&str>,
    ) -> Result<bool, LifecycleError> {
        let from_view = ctx.view_id().to_string();
        let templates = self.app.templates();
        let target = self.app.navigation().resolve(
            &from_view,
            from_action,
            outcome,
            &mut |condition| ctx.evaluate_condition(condition),
            &|view_id| templates.contains(view_id),
        );

        let target = match target {
            Some(target) => target,
            None => return Ok(false),
        };

        if target.redirect {
            info!(from_view = %from_view, to_view = %target.to_view, "Redirecting");
            ctx.redirect = Some(target.to_view);
            ctx.response_complete();
        } else {
            info!(from_view = %from_view, to_view = %target.to_view, "Forwarding");
            let view = self.create_view(&target.to_view, ctx.locale())?;
            ctx.set_view(view);
            ctx.render_response();
        }
        Ok(true)
    }

    fn render_view(&self, ctx: &mut RequestContext) -> Result<(), LifecycleError> {
        let session = Arc::clone(ctx.session());
        let view = match ctx.view_mut() {
            Some(view) => view,
            None => return Ok(()),
        };
        if view.transient {
            debug!(view_id = %view.view_id, "Transient view, not saving state");
            return Ok(());
        }

        view.tree.check_id_uniqueness()?;
        let token = self.app.state().save(view, &session)?;
        ctx.state_token = Some(token);
        Ok(())
    }

    /// Convert the submitted values of immediate or deferred inputs in one pass.
    /// Returns true if any conversion failed.
    fn convert_inputs(&self, ctx: &mut RequestContext, immediate: bool) -> bool {
        let mut messages = Vec::new();
        if let Some(view) = ctx.view_mut() {
            view.tree.visit_mut(
                VisitHints::processing(),
                &mut |node: &mut ComponentNode, visit: &VisitContext<'_>| {
                    if !node.kind().is_input() || node.attr_bool("immediate") != immediate {
                        return VisitResult::Accept;
                    }
                    let raw = match &node.input().submitted {
                        Some(raw) => raw.clone(),
                        None => return VisitResult::Accept,
                    };
                    match self.convert(node, raw) {
                        Ok(value) => node.input_mut().local_value = Some(value),
                        Err(err) => reject(node, visit.client_id, InputFault::conversion(err.message), &mut messages),
                    }
                    VisitResult::Accept
                },
            );
        }

        let failed = !messages.is_empty();
        for message in messages {
            ctx.add_message(message);
        }
        failed
    }

    fn convert(&self, node: &ComponentNode, raw: String) -> Result<Value, ConversionError> {
        match node.attr_str("converter") {
            None => Ok(Value::String(raw)),
            Some(id) => match self.app.converters().get(id) {
                Some(converter) => converter.as_value(&raw),
                None => Err(ConversionError::new(format!("No converter named '{}'", id))),
            },
        }
    }

    /// Validate the converted values of immediate or deferred inputs in one
    /// pass, then deliver their value changes. Returns true if any validation failed.
    fn validate_inputs(&self, ctx: &mut RequestContext, immediate: bool) -> bool {
        let mut messages = Vec::new();
        let mut changes = Vec::new();
        if let Some(view) = ctx.view_mut() {
            view.tree.visit_mut(
                VisitHints::processing(),
                &mut |node: &mut ComponentNode, visit: &VisitContext<'_>| {
                    if !node.kind().is_input() || node.attr_bool("immediate") != immediate || !node.input().valid {
                        return VisitResult::Accept;
                    }
                    let value = match &node.input().local_value {
                        Some(value) => value.clone(),
                        None => return VisitResult::Accept,
                    };
                    let declared = node
                        .attribute("validators")
                        .and_then(Value::as_array)
                        .cloned()
                        .unwrap_or_default();

                    if let Err(message) = self.check(&value, node.attr_bool("required"), &declared) {
                        reject(node, visit.client_id, InputFault::validation(message), &mut messages);
                        return VisitResult::Accept;
                    }
                    if let Some(listener) = node.binding("valueChangeListener") {
                        changes.push(PendingChange {
                            source: visit.client_id.to_string(),
                            listener: listener.to_string(),
                            model: node.binding("value").map(String::from),
                            previous: node.attribute("value").cloned().unwrap_or(Value::Null),
                            value,
                        });
                    }
                    VisitResult::Accept
                },
            );
        }

        let failed = !messages.is_empty();
        for message in messages {
            ctx.add_message(message);
        }
        self.deliver_value_changes(ctx, changes);
        failed
    }

    /// Fire the `valueChangeListener` of every valid input whose new value
    /// differs from the current model value, in tree order
    fn deliver_value_changes(&self, ctx: &mut RequestContext, changes: Vec<PendingChange>) {
        for change in changes {
            if ctx.is_response_complete() {
                break;
            }
            let old_value = match &change.model {
                Some(expression) => ctx.evaluate_get(expression).unwrap_or_else(|err| {
                    debug!(expression = %expression, error = %err, "Previous value unavailable");
                    Value::Null
                }),
                None => change.previous,
            };
            if !values_differ(&old_value, &change.value) {
                continue;
            }

            let name = expression_body(&change.listener);
            let event = ValueChangeEvent {
                source: change.source,
                old_value,
                new_value: change.value,
            };
            info!(source = %event.source, listener = %name, "Value changed");
            let result = match self.app.actions().value_change_listener(name) {
                Some(listener) => listener(ctx, &event),
                None => Err(ApplicationError::new(format!("No value change listener named '{}'", name))),
            };
            if let Err(err) = result {
                ctx.queue_fault_from(Fault::Application(err), FaultOrigin::Action);
            }
        }
    }

    fn check(&self, value: &Value, required: bool, declared: &[Value]) -> Result<(), String> {
        if is_empty(value) {
            return if required {
                Err("Value is required".to_string())
            } else {
                Ok(())
            };
        }

        for declaration in declared {
            let id = declaration
                .get("id")
                .and_then(Value::as_str)
                .or_else(|| declaration.as_str())
                .unwrap_or_default();
            match self.app.validators().get(id) {
                Some(validator) => validator.validate(value, declaration).map_err(|e| e.message)?,
                None => return Err(format!("No validator named '{}'", id)),
            }
        }
        Ok(())
    }
}

/// A valid input with a value change listener, before its old value is known
struct PendingChange {
    source: String,
    listener: String,
    model: Option<String>,
    previous: Value,
    value: Value,
}

fn reject(node: &mut ComponentNode, client_id: &str, fault: InputFault, messages: &mut Vec<Message>) {
    debug!(client_id = %client_id, kind = ?fault.kind, message = %fault.message, "Input invalid");
    messages.push(Message::error(fault.message.clone()).for_client(client_id));
    node.input_mut().fail(fault);
}

fn find<'c>(ctx: &'c RequestContext, client_id: &str) -> Option<&'c ComponentNode> {
    ctx.view().and_then(|view| view.tree.find(client_id))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Numbers compare by value, and null equals the empty string
fn values_differ(old: &Value, new: &Value) -> bool {
    if is_empty(old) && is_empty(new) {
        return false;
    }
    match (old, new) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() != b.as_f64(),
        _ => old != new,
    }
}

fn has_invalid_input(ctx: &RequestContext) -> bool {
    let mut invalid = false;
    if let Some(view) = ctx.view() {
        view.tree.visit(
            VisitHints::processing(),
            &mut |node: &ComponentNode, _: &VisitContext<'_>| {
                if node.kind().is_input() && !node.input().valid {
                    invalid = true;
                    VisitResult::Complete
                } else {
                    VisitResult::Accept
                }
            },
        );
    }
    invalid
}
