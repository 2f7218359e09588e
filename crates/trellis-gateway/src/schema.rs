//! Command argument schemas
//!
//! Declarative per-command argument shapes. Payloads are validated into typed
//! arguments before any handler or upstream call runs; the first failing
//! field short-circuits.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

/// Type and bounds of a single argument field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// A string, optionally of an exact character length.
    String { exact_len: Option<usize> },
    /// An integer within optional inclusive bounds.
    Integer { min: Option<i64>, max: Option<i64> },
}

impl FieldKind {
    fn expected(&self) -> &'static str {
        match self {
            FieldKind::String { .. } => "string",
            FieldKind::Integer { .. } => "integer",
        }
    }
}

/// Declaration of one argument field.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: Option<String>,
}

impl FieldDef {
    /// A required string field.
    pub fn string(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::String { exact_len: None },
            required: true,
            description: None,
        }
    }

    /// A required string field of an exact length.
    pub fn string_exact(name: &str, exact_len: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::String {
                exact_len: Some(exact_len),
            },
            required: true,
            description: None,
        }
    }

    /// A required integer field with optional inclusive bounds.
    pub fn integer(name: &str, min: Option<i64>, max: Option<i64>) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Integer { min, max },
            required: true,
            description: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn describe(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }
}

/// The declared argument shape of one command. Immutable after registration.
#[derive(Debug, Clone, Default)]
pub struct CommandSchema {
    pub fields: Vec<FieldDef>,
}

impl CommandSchema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    /// Schema for a command that takes no arguments.
    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    /// Validate a raw payload against this schema.
    ///
    /// Fields not declared in the schema are ignored. A `null` payload is
    /// treated as an empty object so argument-less commands accept an absent
    /// body.
    pub fn validate(&self, raw: &Value) -> Result<CommandArgs, ValidationError> {
        let object = match raw {
            Value::Object(map) => Some(map),
            Value::Null => None,
            _ => return Err(ValidationError::NotAnObject),
        };

        let mut values = HashMap::new();
        for field in &self.fields {
            match object.and_then(|map| map.get(&field.name)) {
                None | Some(Value::Null) => {
                    if field.required {
                        return Err(ValidationError::MissingField {
                            field: field.name.clone(),
                        });
                    }
                }
                Some(value) => {
                    values.insert(field.name.clone(), check_field(field, value)?);
                }
            }
        }
        Ok(CommandArgs { values })
    }
}

fn check_field(field: &FieldDef, value: &Value) -> Result<ArgValue, ValidationError> {
    match &field.kind {
        FieldKind::String { exact_len } => {
            let text = value.as_str().ok_or_else(|| ValidationError::WrongType {
                field: field.name.clone(),
                expected: field.kind.expected(),
            })?;
            if let Some(expected) = exact_len {
                let actual = text.chars().count();
                if actual != *expected {
                    return Err(ValidationError::WrongLength {
                        field: field.name.clone(),
                        expected: *expected,
                        actual,
                    });
                }
            }
            Ok(ArgValue::String(text.to_string()))
        }
        FieldKind::Integer { min, max } => {
            let number = value.as_i64().ok_or_else(|| ValidationError::WrongType {
                field: field.name.clone(),
                expected: field.kind.expected(),
            })?;
            if min.map_or(false, |min| number < min) || max.map_or(false, |max| number > max) {
                return Err(ValidationError::OutOfRange {
                    field: field.name.clone(),
                    value: number,
                });
            }
            Ok(ArgValue::Integer(number))
        }
    }
}

/// A validated argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
}

/// Validated, typed arguments handed to a command handler.
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    values: HashMap<String, ArgValue>,
}

impl CommandArgs {
    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::String(text)) => Some(text.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Integer(number)) => Some(*number),
            _ => None,
        }
    }
}

/// Validation failures, carrying the offending field and reason.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Arguments must be a JSON object")]
    NotAnObject,

    #[error("Missing required argument: {field}")]
    MissingField { field: String },

    #[error("Argument '{field}' must be a {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("Argument '{field}' must be exactly {expected} characters, got {actual}")]
    WrongLength {
        field: String,
        expected: usize,
        actual: usize,
    },

    #[error("Argument '{field}' is out of range: {value}")]
    OutOfRange { field: String, value: i64 },
}
