//! Converters turn submitted strings into typed values.
//!
//! Empty submissions convert to `null` for every non-string converter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use weft_component::Value;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ConversionError {
    pub message: String,
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait Converter: Send + Sync {
    fn as_value(&self, raw: &str) -> Result<Value, ConversionError>;

    fn as_string(&self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub struct IntegerConverter;

impl Converter for IntegerConverter {
    fn as_value(&self, raw: &str) -> Result<Value, ConversionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Value::Null);
        }
        raw.parse::<i64>()
            .map(Value::from)
            .map_err(|_| ConversionError::new(format!("'{}' is not a whole number", raw)))
    }
}

pub struct FloatConverter;

impl Converter for FloatConverter {
    fn as_value(&self, raw: &str) -> Result<Value, ConversionError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Value::Null);
        }
        raw.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| ConversionError::new(format!("'{}' is not a number", raw)))
    }
}

pub struct BooleanConverter;

impl Converter for BooleanConverter {
    fn as_value(&self, raw: &str) -> Result<Value, ConversionError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" => Ok(Value::Null),
            "true" | "on" | "yes" | "1" => Ok(Value::Bool(true)),
            "false" | "off" | "no" | "0" => Ok(Value::Bool(false)),
            other => Err(ConversionError::new(format!("'{}' is not true or false", other))),
        }
    }
}

pub struct StringConverter;

impl Converter for StringConverter {
    fn as_value(&self, raw: &str) -> Result<Value, ConversionError> {
        Ok(Value::String(raw.to_string()))
    }
}

/// Converter id -> converter
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn Converter>>,
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.converters.keys().collect();
        ids.sort();
        f.debug_struct("ConverterRegistry").field("ids", &ids).finish()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        let mut registry = Self {
            converters: HashMap::new(),
        };
        registry.register("integer", IntegerConverter);
        registry.register("float", FloatConverter);
        registry.register("boolean", BooleanConverter);
        registry.register("string", StringConverter);
        registry
    }
}

impl ConverterRegistry {
    pub fn register(&mut self, id: impl Into<String>, converter: impl Converter + 'static) {
        self.converters.insert(id.into(), Arc::new(converter));
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(id).cloned()
    }
}
