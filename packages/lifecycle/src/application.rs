//! Everything configured once and shared by all requests.

use crate::action::ActionRegistry;
use crate::convert::ConverterRegistry;
use crate::el::{ExpressionEvaluator, ScopedPathEvaluator};
use crate::error::LifecycleError;
use crate::listener::PhaseListener;
use crate::navigation::NavigationResolver;
use crate::validate::ValidatorRegistry;
use std::fmt;
use std::sync::Arc;
use weft_common::Config;
use weft_component::{ComponentRegistry, SharedScope, ViewTemplates};
use weft_state::{SessionStore, StateManager};

pub struct Application {
    config: Config,
    registry: ComponentRegistry,
    templates: Arc<dyn ViewTemplates>,
    converters: ConverterRegistry,
    validators: ValidatorRegistry,
    evaluator: Arc<dyn ExpressionEvaluator>,
    actions: ActionRegistry,
    navigation: NavigationResolver,
    listeners: Vec<Arc<dyn PhaseListener>>,
    state: StateManager,
    sessions: SessionStore,
    scope: SharedScope,
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("actions", &self.actions)
            .field("navigation", &self.navigation)
            .field("listeners", &self.listeners.len())
            .field("sessions", &self.sessions)
            .finish()
    }
}

impl Application {
    pub fn new(config: Config, templates: impl ViewTemplates + 'static) -> Result<Self, LifecycleError> {
        config.validate()?;
        let sessions = SessionStore::new(config.number_of_logical_views, config.number_of_views_in_session)?;
        let navigation = NavigationResolver::default().with_implicit(config.implicit_navigation);
        Ok(Self {
            state: StateManager::new(&config),
            config,
            registry: ComponentRegistry::with_builtins(),
            templates: Arc::new(templates),
            converters: ConverterRegistry::default(),
            validators: ValidatorRegistry::default(),
            evaluator: Arc::new(ScopedPathEvaluator),
            actions: ActionRegistry::new(),
            navigation,
            listeners: Vec::new(),
            sessions,
            scope: SharedScope::default(),
        })
    }

    pub fn with_registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    pub fn with_actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = actions;
        self
    }

    /// Rules replace the current set; the implicit-navigation flag stays as configured
    pub fn with_navigation(mut self, navigation: NavigationResolver) -> Self {
        self.navigation = navigation.with_implicit(self.config.implicit_navigation);
        self
    }

    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    pub fn with_validators(mut self, validators: ValidatorRegistry) -> Self {
        self.validators = validators;
        self
    }

    pub fn with_listener(mut self, listener: impl PhaseListener + 'static) -> Self {
        self.listeners.push(Arc::new(listener));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn templates(&self) -> &dyn ViewTemplates {
        self.templates.as_ref()
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn validators(&self) -> &ValidatorRegistry {
        &self.validators
    }

    pub fn evaluator(&self) -> Arc<dyn ExpressionEvaluator> {
        Arc::clone(&self.evaluator)
    }

    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    pub fn actions_mut(&mut self) -> &mut ActionRegistry {
        &mut self.actions
    }

    pub fn navigation(&self) -> &NavigationResolver {
        &self.navigation
    }

    pub fn listeners(&self) -> &[Arc<dyn PhaseListener>] {
        &self.listeners
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Register session hooks before the application is shared
    pub fn sessions_mut(&mut self) -> &mut SessionStore {
        &mut self.sessions
    }

    /// Application scope map
    pub fn scope(&self) -> SharedScope {
        Arc::clone(&self.scope)
    }
}
