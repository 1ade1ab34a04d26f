//! Validators check converted values.
//!
//! Inputs declare them as `validators: [{ "id": "length", "min": 2 }]`; the
//! whole declaration object is passed as parameters.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use weft_component::Value;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait Validator: Send + Sync {
    fn validate(&self, value: &Value, params: &Value) -> Result<(), ValidationError>;
}

fn param_f64(params: &Value, name: &str) -> Option<f64> {
    params.get(name).and_then(Value::as_f64)
}

/// `min` / `max` characters of the string form
pub struct LengthValidator;

impl Validator for LengthValidator {
    fn validate(&self, value: &Value, params: &Value) -> Result<(), ValidationError> {
        let len = match value {
            Value::String(s) => s.chars().count(),
            other => other.to_string().chars().count(),
        } as f64;

        if let Some(min) = param_f64(params, "min") {
            if len < min {
                return Err(ValidationError::new(format!("Must be at least {} characters", min)));
            }
        }
        if let Some(max) = param_f64(params, "max") {
            if len > max {
                return Err(ValidationError::new(format!("Must be at most {} characters", max)));
            }
        }
        Ok(())
    }
}

/// Numeric `min` / `max`
pub struct RangeValidator;

impl Validator for RangeValidator {
    fn validate(&self, value: &Value, params: &Value) -> Result<(), ValidationError> {
        let number = value
            .as_f64()
            .ok_or_else(|| ValidationError::new("Not a number"))?;

        if let Some(min) = param_f64(params, "min") {
            if number < min {
                return Err(ValidationError::new(format!("Must be at least {}", min)));
            }
        }
        if let Some(max) = param_f64(params, "max") {
            if number > max {
                return Err(ValidationError::new(format!("Must be at most {}", max)));
            }
        }
        Ok(())
    }
}

/// Whole-value match against `regex`
pub struct PatternValidator;

impl Validator for PatternValidator {
    fn validate(&self, value: &Value, params: &Value) -> Result<(), ValidationError> {
        let pattern = params
            .get("regex")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::new("Pattern validator needs a 'regex' parameter"))?;
        let regex = Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| ValidationError::new(format!("Invalid pattern: {}", e)))?;

        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if regex.is_match(&text) {
            Ok(())
        } else {
            Err(ValidationError::new(format!("Does not match '{}'", pattern)))
        }
    }
}

#[derive(Clone)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.validators.keys().collect();
        ids.sort();
        f.debug_struct("ValidatorRegistry").field("ids", &ids).finish()
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        let mut registry = Self {
            validators: HashMap::new(),
        };
        registry.register("length", LengthValidator);
        registry.register("range", RangeValidator);
        registry.register("pattern", PatternValidator);
        registry
    }
}

impl ValidatorRegistry {
    pub fn register(&mut self, id: impl Into<String>, validator: impl Validator + 'static) {
        self.validators.insert(id.into(), Arc::new(validator));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Validator>> {
        self.validators.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_length() {
        let params = json!({ "id": "length", "min": 2, "max": 4 });
        assert!(LengthValidator.validate(&json!("abc"), &params).is_ok());
        assert!(LengthValidator.validate(&json!("a"), &params).is_err());
        assert!(LengthValidator.validate(&json!("abcde"), &params).is_err());
    }

    #[test]
    fn test_range() {
        let params = json!({ "min": 0, "max": 120 });
        assert!(RangeValidator.validate(&json!(30), &params).is_ok());
        assert_eq!(
            RangeValidator.validate(&json!(130), &params).unwrap_err().message,
            "Must be at most 120"
        );
        assert!(RangeValidator.validate(&json!("x"), &params).is_err());
    }

    #[test]
    fn test_pattern_matches_whole_value() {
        let params = json!({ "regex": "[a-z]+" });
        assert!(PatternValidator.validate(&json!("abc"), &params).is_ok());
        assert!(PatternValidator.validate(&json!("abc1"), &params).is_err());
        assert!(PatternValidator.validate(&json!("abc"), &json!({})).is_err());
    }
}
