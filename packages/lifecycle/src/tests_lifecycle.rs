/// Phase sequencing, input gating, listeners and actions
use crate::action::{ActionRegistry, ApplicationError, ValueChangeEvent};
use crate::application::Application;
use crate::context::{Request, Response};
use crate::coordinator::Lifecycle;
use crate::error::LifecycleError;
use crate::exception::{Fault, FaultOrigin};
use crate::listener::{FnListener, ListenerError};
use crate::phase::PhaseId;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use weft_common::Config;
use weft_component::{ComponentNode, InputFaultKind, NodeKind, TemplateSet, Value};

const TEMPLATES: &str = r##"{
    "/order": {
        "type": "weft.ViewRoot", "id": "root",
        "children": [{
            "type": "weft.Form", "id": "f",
            "children": [
                { "type": "weft.Input", "id": "qty",
                  "attributes": { "converter": "integer", "required": true },
                  "bindings": { "value": "#{order.quantity}", "valueChangeListener": "#{order.quantityChanged}" } },
                { "type": "weft.Input", "id": "note",
                  "attributes": { "validators": [{ "id": "length", "max": 5 }] } },
                { "type": "weft.Input", "id": "memo", "bindings": { "value": "#{draft.memo}" } },
                { "type": "weft.Command", "id": "place", "bindings": { "action": "#{orders.place}" } },
                { "type": "weft.Command", "id": "cancel", "attributes": { "immediate": true, "action": "/home" } }
            ]
        }]
    },
    "/home": { "type": "weft.ViewRoot", "id": "root" },
    "/done": { "type": "weft.ViewRoot", "id": "root" }
}"##;

const ALL_PHASES: [PhaseId; 6] = [
    PhaseId::Restore,
    PhaseId::ApplyInput,
    PhaseId::ProcessValidations,
    PhaseId::UpdateModel,
    PhaseId::InvokeApplication,
    PhaseId::Render,
];

struct Harness {
    lifecycle: Lifecycle,
    placed: Arc<AtomicUsize>,
    changes: Arc<Mutex<Vec<(PhaseId, ValueChangeEvent)>>>,
}

impl Harness {
    fn new() -> Self {
        Self::build(Config::default(), |app| app)
    }

    fn build(config: Config, customize: impl FnOnce(Application) -> Application) -> Self {
        let placed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&placed);

        let changes = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&changes);

        let mut actions = ActionRegistry::new();
        actions.register_action("orders.place", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Some("done".to_string()))
        });
        actions.register_value_change_listener("order.quantityChanged", move |ctx, event| {
            recorder.lock().unwrap().push((ctx.phase(), event.clone()));
            Ok(())
        });

        let app = Application::new(config, TemplateSet::from_json(TEMPLATES).unwrap())
            .unwrap()
            .with_actions(actions);
        let app = customize(app);
        app.scope()
            .write()
            .unwrap()
            .insert("order".into(), json!({ "quantity": 1 }));

        Self {
            lifecycle: Lifecycle::new(Arc::new(app)),
            placed,
            changes,
        }
    }

    fn token(&self) -> String {
        self.lifecycle
            .run(Request::initial("s", "/order"))
            .unwrap()
            .state_token
            .unwrap()
    }

    fn quantity(&self) -> Value {
        self.lifecycle.application().scope().read().unwrap()["order"]["quantity"].clone()
    }

    fn placed(&self) -> usize {
        self.placed.load(Ordering::SeqCst)
    }

    fn changes(&self) -> Vec<(PhaseId, ValueChangeEvent)> {
        self.changes.lock().unwrap().clone()
    }
}

fn input_fault(response: &Response, client_id: &str) -> Option<InputFaultKind> {
    let view = response.view.as_ref()?;
    let node = view.tree.find(client_id)?;
    node.input().fault.as_ref().map(|f| f.kind)
}

#[test]
fn test_initial_request_skips_to_render() {
    let harness = Harness::new();
    let response = harness.lifecycle.run(Request::initial("s", "/order")).unwrap();

    assert_eq!(response.phases_run, vec![PhaseId::Restore, PhaseId::Render]);
    assert_eq!(response.view_id, "/order");
    assert!(response.state_token.is_some());
    assert!(response.messages.is_empty());
}

#[test]
fn test_valid_postback_updates_model_and_runs_action() {
    let harness = Harness::new();
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "7").with_param("f:place", ""))
        .unwrap();

    assert_eq!(response.phases_run, ALL_PHASES.to_vec());
    assert_eq!(harness.quantity(), json!(7));
    assert_eq!(harness.placed(), 1);
    // "done" names an existing view
    assert_eq!(response.view_id, "/done");
    assert!(response.state_token.is_some());
}

#[test]
fn test_conversion_failure_blocks_application() {
    let harness = Harness::new();
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "abc").with_param("f:place", ""))
        .unwrap();

    assert_eq!(input_fault(&response, "f:qty"), Some(InputFaultKind::Conversion));
    assert_eq!(harness.quantity(), json!(1));
    assert_eq!(harness.placed(), 0);
    assert_eq!(response.messages_for("f:qty").count(), 1);
    assert!(!response.phases_run.contains(&PhaseId::InvokeApplication));
    assert_eq!(response.phases_run.last(), Some(&PhaseId::Render));
    assert_eq!(response.view_id, "/order");
}

#[test]
fn test_validation_failure_keeps_valid_updates_but_skips_actions() {
    let harness = Harness::new();
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(
            Request::postback("s", "/order", token)
                .with_param("f:qty", "3")
                .with_param("f:note", "far too long")
                .with_param("f:place", ""),
        )
        .unwrap();

    assert_eq!(input_fault(&response, "f:note"), Some(InputFaultKind::Validation));
    assert_eq!(harness.quantity(), json!(3));
    assert_eq!(harness.placed(), 0);
    assert!(response.has_errors());
}

#[test]
fn test_required_input_rejects_empty_value() {
    let harness = Harness::new();
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "  "))
        .unwrap();

    assert_eq!(input_fault(&response, "f:qty"), Some(InputFaultKind::Validation));
    let message = response.messages_for("f:qty").next().unwrap();
    assert_eq!(message.summary, "Value is required");
}

#[test]
fn test_unbound_input_keeps_value_on_node() {
    let harness = Harness::new();
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:note", "hi"))
        .unwrap();

    let view = response.view.unwrap();
    assert_eq!(view.tree.find("f:note").unwrap().attribute("value"), Some(&json!("hi")));
}

#[test]
fn test_immediate_command_skips_conversion_of_other_inputs() {
    let harness = Harness::new();
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(
            Request::postback("s", "/order", token)
                .with_param("f:qty", "abc")
                .with_param("f:cancel", ""),
        )
        .unwrap();

    assert_eq!(
        response.phases_run,
        vec![PhaseId::Restore, PhaseId::ApplyInput, PhaseId::Render]
    );
    assert!(response.messages.is_empty());
    assert_eq!(response.view_id, "/home");
}

#[test]
fn test_listeners_wrap_phases_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (Arc::clone(&log), Arc::clone(&log));
    let (c, d) = (Arc::clone(&log), Arc::clone(&log));

    let harness = Harness::build(Config::default(), move |app| {
        app.with_listener(
            FnListener::new(PhaseId::Any)
                .before(move |_, phase| {
                    a.lock().unwrap().push(format!("first before {}", phase));
                    Ok(())
                })
                .after(move |_, phase| {
                    b.lock().unwrap().push(format!("first after {}", phase));
                    Ok(())
                }),
        )
        .with_listener(
            FnListener::new(PhaseId::Restore)
                .before(move |_, phase| {
                    c.lock().unwrap().push(format!("second before {}", phase));
                    Ok(())
                })
                .after(move |_, phase| {
                    d.lock().unwrap().push(format!("second after {}", phase));
                    Ok(())
                }),
        )
    });

    harness.lifecycle.run(Request::initial("s", "/order")).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![
            "first before RESTORE",
            "second before RESTORE",
            "second after RESTORE",
            "first after RESTORE",
            "first before RENDER",
            "first after RENDER",
        ]
    );
}

#[test]
fn test_aborting_listener_is_logged_only() {
    let harness = Harness::build(Config::default(), |app| {
        app.with_listener(
            FnListener::new(PhaseId::ApplyInput).before(|_, _| Err(ListenerError::Abort("not today".into()))),
        )
    });
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "2").with_param("f:place", ""))
        .unwrap();

    assert_eq!(harness.placed(), 1);
    assert!(response
        .faults
        .iter()
        .any(|f| f.fault == Fault::AbortProcessing("not today".into()) && f.origin == FaultOrigin::BeforePhase));
}

#[test]
fn test_listener_fault_fails_request_after_best_effort_render() {
    let after_listener_ran = Arc::new(AtomicUsize::new(0));
    let ran = Arc::clone(&after_listener_ran);

    let harness = Harness::build(Config::default(), move |app| {
        app.with_listener(FnListener::new(PhaseId::InvokeApplication).after(move |_, _| {
            ran.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .with_listener(
            FnListener::new(PhaseId::InvokeApplication)
                .after(|_, _| Err(ApplicationError::new("audit log unavailable").into())),
        )
    });
    let token = harness.token();

    let err = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "2").with_param("f:place", ""))
        .unwrap_err();

    match &err {
        LifecycleError::Application { phase, source, .. } => {
            assert_eq!(*phase, PhaseId::InvokeApplication);
            assert_eq!(source.message, "audit log unavailable");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    // The sibling listener still ran
    assert_eq!(after_listener_ran.load(Ordering::SeqCst), 1);

    let partial = err.response().unwrap();
    assert_eq!(partial.phases_run.last(), Some(&PhaseId::Render));
    assert!(partial.state_token.is_some());
}

#[test]
fn test_failing_action_is_an_application_fault() {
    let harness = Harness::build(Config::default(), |mut app| {
        app.actions_mut()
            .register_action("orders.place", |_, _| Err(ApplicationError::new("out of stock")));
        app
    });
    let token = harness.token();

    let err = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "2").with_param("f:place", ""))
        .unwrap_err();

    let partial = err.response().unwrap();
    assert_eq!(partial.view_id, "/order");
    assert!(partial
        .faults
        .iter()
        .any(|f| f.origin == FaultOrigin::Action && f.phase == PhaseId::InvokeApplication));
}

#[test]
fn test_response_complete_skips_render() {
    let harness = Harness::build(Config::default(), |app| {
        app.with_listener(FnListener::new(PhaseId::ApplyInput).before(|ctx, _| {
            ctx.response_complete();
            Ok(())
        }))
    });
    let token = harness.token();

    let response = harness.lifecycle.run(Request::postback("s", "/order", token)).unwrap();

    assert_eq!(response.phases_run, vec![PhaseId::Restore, PhaseId::ApplyInput]);
    assert!(response.complete);
    assert!(response.state_token.is_none());
}

#[test]
fn test_dynamic_children_survive_postbacks() {
    let harness = Harness::build(Config::default(), |mut app| {
        app.actions_mut().register_action("orders.place", |ctx, _| {
            if let Some(view) = ctx.view_mut() {
                view.tree
                    .push_child(
                        "f",
                        ComponentNode::new("weft.Output", NodeKind::Output)
                            .with_id("receipt")
                            .with_attr("value", "thanks"),
                    )
                    .map_err(|e| ApplicationError::new(e.to_string()))?;
            }
            Ok(None)
        });
        app
    });
    let token = harness.token();

    let placed = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "2").with_param("f:place", ""))
        .unwrap();
    assert_eq!(placed.view_id, "/order");

    let next = harness
        .lifecycle
        .run(Request::postback("s", "/order", placed.state_token.unwrap()))
        .unwrap();
    let view = next.view.unwrap();
    let receipt = view.tree.find("f:receipt").unwrap();
    assert_eq!(receipt.attribute("value"), Some(&json!("thanks")));
    assert!(receipt.is_dynamic());
}

#[test]
fn test_value_change_listener_sees_old_and_new_value() {
    let harness = Harness::new();
    let token = harness.token();

    harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "7"))
        .unwrap();

    assert_eq!(
        harness.changes(),
        vec![(
            PhaseId::ProcessValidations,
            ValueChangeEvent {
                source: "f:qty".into(),
                old_value: json!(1),
                new_value: json!(7),
            }
        )]
    );
    assert_eq!(harness.quantity(), json!(7));
}

#[test]
fn test_no_value_change_for_same_or_invalid_value() {
    let harness = Harness::new();

    for submitted in ["1", "abc", " "] {
        let token = harness.token();
        harness
            .lifecycle
            .run(Request::postback("s", "/order", token).with_param("f:qty", submitted))
            .unwrap();
    }

    assert!(harness.changes().is_empty());
}

#[test]
fn test_failing_value_change_listener_is_an_application_fault() {
    let harness = Harness::build(Config::default(), |mut app| {
        app.actions_mut()
            .register_value_change_listener("order.quantityChanged", |_, _| Err(ApplicationError::new("quota")));
        app
    });
    let token = harness.token();

    let err = harness
        .lifecycle
        .run(Request::postback("s", "/order", token).with_param("f:qty", "3").with_param("f:place", ""))
        .unwrap_err();

    match &err {
        LifecycleError::Application { phase, source, .. } => {
            assert_eq!(*phase, PhaseId::ProcessValidations);
            assert_eq!(source.message, "quota");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(harness.placed(), 0);
}

#[test]
fn test_inputs_are_processed_together_in_tree_order() {
    let harness = Harness::new();
    let token = harness.token();

    let response = harness
        .lifecycle
        .run(
            Request::postback("s", "/order", token)
                .with_param("f:qty", "5")
                .with_param("f:note", "far too long")
                .with_param("f:memo", "hi")
                .with_param("f:place", ""),
        )
        .unwrap();

    // One model write succeeds, the other has no target
    assert_eq!(harness.quantity(), json!(5));
    assert_eq!(input_fault(&response, "f:memo"), Some(InputFaultKind::Model));
    assert_eq!(input_fault(&response, "f:note"), Some(InputFaultKind::Validation));
    assert!(input_fault(&response, "f:qty").is_none());

    let order: Vec<&str> = response
        .messages
        .iter()
        .filter_map(|m| m.client_id.as_deref())
        .collect();
    assert_eq!(order, vec!["f:note", "f:memo"]);
    assert_eq!(harness.placed(), 0);
}
