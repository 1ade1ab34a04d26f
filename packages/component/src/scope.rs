//! Scoped attribute maps and flash storage.

use crate::node::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

pub type ScopeMap = BTreeMap<String, Value>;

/// Session and application maps are shared between requests
pub type SharedScope = Arc<RwLock<ScopeMap>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scope {
    Request,
    View,
    Flash,
    Session,
    Application,
}

impl Scope {
    /// Lookup order for unqualified names
    pub const SEARCH_ORDER: [Scope; 5] = [
        Scope::Request,
        Scope::View,
        Scope::Flash,
        Scope::Session,
        Scope::Application,
    ];

    /// Name used to address the scope explicitly in expressions
    pub fn expression_name(self) -> &'static str {
        match self {
            Scope::Request => "requestScope",
            Scope::View => "viewScope",
            Scope::Flash => "flash",
            Scope::Session => "sessionScope",
            Scope::Application => "applicationScope",
        }
    }

    pub fn from_expression_name(name: &str) -> Option<Self> {
        Scope::SEARCH_ORDER
            .into_iter()
            .find(|scope| scope.expression_name() == name)
    }
}

/// Flash storage for one request.
///
/// `now` holds what the previous (redirecting) request put for this one.
/// `next` is handed to the following request, but only if this response redirects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flash {
    now: ScopeMap,
    next: ScopeMap,
}

impl Flash {
    pub fn from_pending(pending: ScopeMap) -> Self {
        Self {
            now: pending,
            next: ScopeMap::new(),
        }
    }

    /// Visible to this request: values carried over, overlaid by `put_now` values
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.now.get(key).or_else(|| self.next.get(key))
    }

    /// Store for the next request
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.next.insert(key.into(), value);
    }

    /// Store for this request only
    pub fn put_now(&mut self, key: impl Into<String>, value: Value) {
        self.now.insert(key.into(), value);
    }

    /// Carry a value received from the previous request over one more redirect
    pub fn keep(&mut self, key: &str) -> bool {
        match self.now.get(key) {
            Some(value) => {
                self.next.insert(key.to_string(), value.clone());
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> &ScopeMap {
        &self.now
    }

    pub fn outgoing(&self) -> &ScopeMap {
        &self.next
    }

    /// End of request: what the next request receives
    pub fn into_pending(self, redirected: bool) -> ScopeMap {
        if redirected {
            self.next
        } else {
            ScopeMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flash_survives_one_redirect() {
        let mut flash = Flash::default();
        flash.put("notice", json!("saved"));
        assert_eq!(flash.get("notice"), Some(&json!("saved")));

        let pending = flash.into_pending(true);
        let mut next_request = Flash::from_pending(pending);
        assert_eq!(next_request.get("notice"), Some(&json!("saved")));

        next_request.put_now("local", json!(1));
        assert!(next_request.into_pending(false).is_empty());
    }

    #[test]
    fn test_keep_extends_lifetime() {
        let mut pending = ScopeMap::new();
        pending.insert("notice".into(), json!("saved"));

        let mut flash = Flash::from_pending(pending);
        assert!(flash.keep("notice"));
        assert!(!flash.keep("missing"));

        let carried = flash.into_pending(true);
        assert_eq!(carried.get("notice"), Some(&json!("saved")));
    }

    #[test]
    fn test_scope_names() {
        assert_eq!(Scope::from_expression_name("viewScope"), Some(Scope::View));
        assert_eq!(Scope::from_expression_name("bean"), None);
    }
}
