//! Expression evaluation.
//!
//! The evaluator is a collaborator behind [`ExpressionEvaluator`]; the
//! lifecycle only needs `get` and `set`. [`ScopedPathEvaluator`] resolves
//! dotted paths (`#{user.address.city}`) against the five scopes.

use std::sync::PoisonError;
use thiserror::Error;
use weft_component::{Flash, Scope, ScopeMap, SharedScope, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ElError {
    #[error("Invalid expression: {0}")]
    Syntax(String),

    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    #[error("Cannot assign to {0}")]
    NotWritable(String),
}

/// Scopes visible to one evaluation
pub struct ElContext<'a> {
    pub request: &'a mut ScopeMap,
    pub view: &'a mut ScopeMap,
    pub flash: &'a mut Flash,
    pub session: &'a SharedScope,
    pub application: &'a SharedScope,
}

impl ElContext<'_> {
    fn root(&self, scope: Scope, name: &str) -> Option<Value> {
        match scope {
            Scope::Request => self.request.get(name).cloned(),
            Scope::View => self.view.get(name).cloned(),
            Scope::Flash => self.flash.get(name).cloned(),
            Scope::Session => self
                .session
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned(),
            Scope::Application => self
                .application
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned(),
        }
    }

    /// Apply `f` to the map of `scope`
    fn with_scope_mut<R>(&mut self, scope: Scope, f: impl FnOnce(&mut ScopeMap) -> R) -> R {
        match scope {
            Scope::Request => f(&mut *self.request),
            Scope::View => f(&mut *self.view),
            Scope::Flash => {
                // Writes go to the outgoing map so the value survives a redirect
                let mut outgoing = self.flash.outgoing().clone();
                let result = f(&mut outgoing);
                for (key, value) in outgoing {
                    self.flash.put(key, value);
                }
                result
            }
            Scope::Session => f(&mut *self.session.write().unwrap_or_else(PoisonError::into_inner)),
            Scope::Application => f(&mut *self.application.write().unwrap_or_else(PoisonError::into_inner)),
        }
    }
}

pub trait ExpressionEvaluator: Send + Sync {
    fn get(&self, expression: &str, el: &ElContext<'_>) -> Result<Value, ElError>;

    fn set(&self, expression: &str, el: &mut ElContext<'_>, value: Value) -> Result<(), ElError>;
}

/// Is the value "true" for conditions and `rendered`-style flags?
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "false",
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Body of `#{...}` / `${...}`; a bare path is accepted as is
pub fn expression_body(expression: &str) -> &str {
    let trimmed = expression.trim();
    trimmed
        .strip_prefix("#{")
        .or_else(|| trimmed.strip_prefix("${"))
        .and_then(|rest| rest.strip_suffix('}'))
        .unwrap_or(trimmed)
        .trim()
}

#[derive(Debug, PartialEq)]
struct ParsedPath<'e> {
    negated: bool,
    scope: Option<Scope>,
    segments: Vec<&'e str>,
}

fn parse(expression: &str) -> Result<ParsedPath<'_>, ElError> {
    let body = expression_body(expression);
    let (negated, body) = match body.strip_prefix('!') {
        Some(rest) => (true, rest.trim()),
        None => (false, body),
    };

    let mut segments: Vec<&str> = body.split('.').collect();
    let valid = |s: &&str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !segments.iter().all(valid) {
        return Err(ElError::Syntax(expression.to_string()));
    }

    let scope = Scope::from_expression_name(segments[0]);
    if scope.is_some() {
        segments.remove(0);
        if segments.is_empty() {
            return Err(ElError::Syntax(expression.to_string()));
        }
    }

    Ok(ParsedPath {
        negated,
        scope,
        segments,
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScopedPathEvaluator;

impl ScopedPathEvaluator {
    fn find_root(&self, el: &ElContext<'_>, path: &ParsedPath<'_>) -> Option<(Scope, Value)> {
        let name = path.segments[0];
        match path.scope {
            Some(scope) => el.root(scope, name).map(|v| (scope, v)),
            None => Scope::SEARCH_ORDER
                .into_iter()
                .find_map(|scope| el.root(scope, name).map(|v| (scope, v))),
        }
    }
}

impl ExpressionEvaluator for ScopedPathEvaluator {
    fn get(&self, expression: &str, el: &ElContext<'_>) -> Result<Value, ElError> {
        let body = expression_body(expression);
        match body {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }

        let path = parse(expression)?;
        let mut value = match self.find_root(el, &path) {
            Some((_, root)) => root,
            None => Value::Null,
        };
        for segment in &path.segments[1..] {
            value = value.get(*segment).cloned().unwrap_or(Value::Null);
        }

        if path.negated {
            Ok(Value::Bool(!truthy(&value)))
        } else {
            Ok(value)
        }
    }

    fn set(&self, expression: &str, el: &mut ElContext<'_>, value: Value) -> Result<(), ElError> {
        let path = parse(expression)?;
        if path.negated {
            return Err(ElError::NotWritable(expression.to_string()));
        }

        let scope = match path.scope {
            Some(scope) if path.segments.len() == 1 => scope,
            _ => self
                .find_root(el, &path)
                .map(|(scope, _)| scope)
                .ok_or_else(|| ElError::PropertyNotFound(path.segments[0].to_string()))?,
        };

        el.with_scope_mut(scope, |map| {
            let (last, parents) = path
                .segments
                .split_last()
                .ok_or_else(|| ElError::Syntax(expression.to_string()))?;
            if parents.is_empty() {
                map.insert(last.to_string(), value);
                return Ok(());
            }

            let mut target = map
                .get_mut(parents[0])
                .ok_or_else(|| ElError::PropertyNotFound(parents[0].to_string()))?;
            for segment in &parents[1..] {
                target = target
                    .get_mut(*segment)
                    .ok_or_else(|| ElError::PropertyNotFound(segment.to_string()))?;
            }
            match target.as_object_mut() {
                Some(object) => {
                    object.insert(last.to_string(), value);
                    Ok(())
                }
                None => Err(ElError::NotWritable(expression.to_string())),
            }
        })
    }
}
