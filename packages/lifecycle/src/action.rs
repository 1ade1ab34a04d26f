//! Application callbacks invoked for command and value change events.

use crate::context::RequestContext;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use weft_component::Value;

/// Failure raised by application code (actions, listeners)
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ApplicationError {
    pub message: String,
}

impl ApplicationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A command was activated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionEvent {
    pub source: String,
    pub immediate: bool,
}

/// A valid input received a value different from its previous one
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChangeEvent {
    pub source: String,
    pub old_value: Value,
    pub new_value: Value,
}

/// Returns the navigation outcome, if any
pub type ActionHandler =
    Arc<dyn Fn(&mut RequestContext, &ActionEvent) -> Result<Option<String>, ApplicationError> + Send + Sync>;

pub type ActionListener = Arc<dyn Fn(&mut RequestContext, &ActionEvent) -> Result<(), ApplicationError> + Send + Sync>;

pub type ValueChangeListener =
    Arc<dyn Fn(&mut RequestContext, &ValueChangeEvent) -> Result<(), ApplicationError> + Send + Sync>;

/// Named callbacks that `action`, `actionListener` and `valueChangeListener`
/// bindings refer to. `#{orders.save}` resolves to the name `orders.save`.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionHandler>,
    listeners: HashMap<String, ActionListener>,
    value_change_listeners: HashMap<String, ValueChangeListener>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&String> = self.actions.keys().collect();
        actions.sort();
        let mut listeners: Vec<&String> = self.listeners.keys().collect();
        listeners.sort();
        let mut value_change_listeners: Vec<&String> = self.value_change_listeners.keys().collect();
        value_change_listeners.sort();
        f.debug_struct("ActionRegistry")
            .field("actions", &actions)
            .field("listeners", &listeners)
            .field("value_change_listeners", &value_change_listeners)
            .finish()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut RequestContext, &ActionEvent) -> Result<Option<String>, ApplicationError> + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(handler));
    }

    pub fn register_listener<F>(&mut self, name: impl Into<String>, listener: F)
    where
        F: Fn(&mut RequestContext, &ActionEvent) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        self.listeners.insert(name.into(), Arc::new(listener));
    }

    pub fn register_value_change_listener<F>(&mut self, name: impl Into<String>, listener: F)
    where
        F: Fn(&mut RequestContext, &ValueChangeEvent) -> Result<(), ApplicationError> + Send + Sync + 'static,
    {
        self.value_change_listeners.insert(name.into(), Arc::new(listener));
    }

    pub fn action(&self, name: &str) -> Option<ActionHandler> {
        self.actions.get(name).cloned()
    }

    pub fn listener(&self, name: &str) -> Option<ActionListener> {
        self.listeners.get(name).cloned()
    }

    pub fn value_change_listener(&self, name: &str) -> Option<ValueChangeListener> {
        self.value_change_listeners.get(name).cloned()
    }
}
