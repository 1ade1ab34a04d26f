//! Scenario file format for `weft run`.
//!
//! ```json
//! {
//!   "name": "checkout",
//!   "templates": { "/cart": { "type": "weft.ViewRoot", "id": "root", "children": [] } },
//!   "navigation": [{ "fromView": "/cart", "cases": [{ "fromOutcome": "pay", "toView": "/pay" }] }],
//!   "model": { "cart": { "items": 0 } },
//!   "actions": { "cart.add": { "set": { "#{cart.items}": 1 }, "outcome": "pay" } },
//!   "requests": [
//!     { "viewId": "/cart" },
//!     { "viewId": "/cart", "postback": true, "params": { "form:add": "" } }
//!   ]
//! }
//! ```
//!
//! A postback without an explicit `token` reuses the last token issued to its session.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use weft_common::Config;
use weft_component::{NodeDescriptor, ScopeMap, TemplateSet, Value};
use weft_lifecycle::{ActionRegistry, Application, ApplicationError, Message, NavigationResolver, NavigationRule, Request};

fn default_session() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Replaces the directory configuration for this scenario
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,

    #[serde(default)]
    pub templates: BTreeMap<String, NodeDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub navigation: Vec<NavigationRule>,

    /// Initial application scope
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub model: ScopeMap,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ScriptedAction>,

    #[serde(default)]
    pub requests: Vec<ScenarioRequest>,
}

/// Canned behavior for an action binding
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    /// Expression -> value assignments
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub set: BTreeMap<String, Value>,

    /// Values put into flash for the next request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flash: ScopeMap,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Fail with this message instead of running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRequest {
    #[serde(default = "default_session")]
    pub session_id: String,
    pub view_id: String,
    #[serde(default)]
    pub postback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ScenarioRequest {
    /// `last_tokens` maps session ids to the token of their last rendered view
    pub fn to_request(&self, last_tokens: &HashMap<String, String>) -> Request {
        let state_token = match (&self.token, self.postback) {
            (Some(token), _) => Some(token.clone()),
            (None, true) => last_tokens.get(&self.session_id).cloned(),
            (None, false) => None,
        };

        Request {
            session_id: self.session_id.clone(),
            view_id: self.view_id.clone(),
            postback: self.postback,
            state_token,
            locale: None,
            params: self.params.clone(),
        }
    }
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| anyhow!("Cannot read {}: {}", path.display(), e))?;
        Self::from_json(&content).map_err(|e| anyhow!("Invalid scenario {}: {}", path.display(), e))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn templates(&self) -> TemplateSet {
        let mut set = TemplateSet::new();
        for (view_id, root) in &self.templates {
            set.insert(view_id.clone(), root.clone());
        }
        set
    }

    fn actions(&self) -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        for (name, action) in &self.actions {
            let action = action.clone();
            registry.register_action(name.clone(), move |ctx, _| {
                if let Some(reason) = &action.fail {
                    return Err(ApplicationError::new(reason.clone()));
                }
                for (expression, value) in &action.set {
                    ctx.evaluate_set(expression, value.clone())
                        .map_err(|e| ApplicationError::new(e.to_string()))?;
                }
                for (key, value) in &action.flash {
                    ctx.flash_mut().put(key.clone(), value.clone());
                }
                if let Some(message) = &action.message {
                    ctx.add_message(Message::info(message.clone()));
                }
                Ok(action.outcome.clone())
            });
        }
        registry
    }

    /// Application for this scenario; `base` applies unless the scenario brings its own config
    pub fn application(&self, base: &Config) -> Result<Application> {
        let config = self.config.clone().unwrap_or_else(|| base.clone());
        let app = Application::new(config, self.templates())?
            .with_actions(self.actions())
            .with_navigation(NavigationResolver::new(self.navigation.clone()));

        app.scope()
            .write()
            .map_err(|_| anyhow!("Application scope lock poisoned"))?
            .extend(self.model.clone());
        Ok(app)
    }

    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(fallback)
    }
}
