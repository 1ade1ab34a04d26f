//! # Navigation
//!
//! Picks the next view from an action outcome.
//!
//! Rules are matched by the current view id. An exact `fromView` beats the
//! longest matching prefix wildcard (`/admin/*`), which beats `*`. Within the
//! first rule that has a matching case, cases are tried in declaration order.
//! When nothing matches, a non-null outcome may still name a view directly
//! (implicit navigation).

use serde::{Deserialize, Serialize};
use tracing::debug;

const REDIRECT_FLAG: &str = "faces-redirect=true";

fn any_view() -> String {
    "*".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRule {
    #[serde(default = "any_view")]
    pub from_view: String,
    #[serde(default)]
    pub cases: Vec<NavigationCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_outcome: Option<String>,
    /// Action expression that produced the outcome, e.g. `#{orders.save}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    pub to_view: String,
    #[serde(default)]
    pub redirect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationOutcome {
    pub to_view: String,
    pub redirect: bool,
}

/// How specific a `fromView` pattern is for a given view id; `None` if it does not match
fn specificity(pattern: &str, view_id: &str) -> Option<(u8, usize)> {
    if pattern == "*" {
        Some((0, 0))
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        view_id.starts_with(prefix).then_some((1, prefix.len()))
    } else {
        (pattern == view_id).then_some((2, pattern.len()))
    }
}

/// Split `?faces-redirect=true` (and any other query) off a view reference
fn split_target(target: &str) -> (&str, bool) {
    match target.split_once('?') {
        Some((view, query)) => (view, query.split('&').any(|pair| pair == REDIRECT_FLAG)),
        None => (target, false),
    }
}

/// Resolve `target` against the directory of `from_view`
fn resolve_relative(from_view: &str, target: &str) -> String {
    if target.starts_with('/') {
        return target.to_string();
    }
    match from_view.rfind('/') {
        Some(slash) => format!("{}{}", &from_view[..=slash], target),
        None => format!("/{}", target),
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavigationResolver {
    rules: Vec<NavigationRule>,
    implicit: bool,
}

impl NavigationResolver {
    pub fn new(rules: Vec<NavigationRule>) -> Self {
        Self { rules, implicit: true }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn with_implicit(mut self, implicit: bool) -> Self {
        self.implicit = implicit;
        self
    }

    pub fn add_rule(&mut self, rule: NavigationRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[NavigationRule] {
        &self.rules
    }

    /// Pick at most one target.
    ///
    /// `condition` evaluates case conditions; `view_exists` gates implicit
    /// navigation. `None` means stay on the current view.
    pub fn resolve(
        &self,
        from_view: &str,
        from_action: Option<&str>,
        outcome: Option<&str>,
        condition: &mut dyn FnMut(&str) -> bool,
        view_exists: &dyn Fn(&str) -> bool,
    ) -> Option<NavigationOutcome> {
        let mut candidates: Vec<(usize, (u8, usize))> = self
            .rules
            .iter()
            .enumerate()
            .filter_map(|(index, rule)| specificity(&rule.from_view, from_view).map(|rank| (index, rank)))
            .collect();
        // Stable sort keeps declaration order among equally specific rules
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        for (index, _) in candidates {
            let rule = &self.rules[index];
            let matched = rule
                .cases
                .iter()
                .find(|case| case_matches(case, from_action, outcome, condition));
            if let Some(case) = matched {
                let (view, flagged) = split_target(&case.to_view);
                let to_view = resolve_relative(from_view, view);
                debug!(from_view = %from_view, rule = %rule.from_view, to_view = %to_view, "Navigation case matched");
                return Some(NavigationOutcome {
                    to_view,
                    redirect: case.redirect || flagged,
                });
            }
        }

        let outcome = outcome?;
        if !self.implicit {
            return None;
        }
        let (view, redirect) = split_target(outcome);
        let to_view = resolve_relative(from_view, view);
        if view_exists(&to_view) {
            debug!(from_view = %from_view, to_view = %to_view, "Implicit navigation");
            Some(NavigationOutcome { to_view, redirect })
        } else {
            debug!(from_view = %from_view, outcome = %outcome, "No navigation case for outcome");
            None
        }
    }
}

fn case_matches(
    case: &NavigationCase,
    from_action: Option<&str>,
    outcome: Option<&str>,
    condition: &mut dyn FnMut(&str) -> bool,
) -> bool {
    match (&case.from_outcome, outcome) {
        (Some(expected), Some(actual)) if expected == actual => {}
        (Some(_), _) => return false,
        (None, None) if case.condition.is_none() => return false,
        (None, _) => {}
    }

    if let Some(expected) = &case.from_action {
        if from_action != Some(expected.as_str()) {
            return false;
        }
    }

    match &case.condition {
        Some(expression) => condition(expression),
        None => true,
    }
}
