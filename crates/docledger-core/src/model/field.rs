use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

///
/// FieldModel
/// Runtime field metadata used by argument parsing, validation and decoding.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldModel {
    /// Field name as stored in the JSON encoding and used in predicates.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default = "default_required")]
    pub required: bool,
}

const fn default_required() -> bool {
    true
}

impl FieldModel {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }
}

///
/// FieldKind
///
/// Scalar type surface of a record field.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Int,
    Float,
}

impl FieldKind {
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Parse one raw string argument into a value of this kind.
    ///
    /// Non-finite floats are rejected; they have no JSON encoding.
    pub fn parse(self, raw: &str) -> Result<Value, ParseValueError> {
        match self {
            Self::Text => Ok(Value::Text(raw.to_string())),
            Self::Int => raw
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ParseValueError { kind: self }),
            Self::Float => match raw.parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Value::Float(n)),
                _ => Err(ParseValueError { kind: self }),
            },
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Text => "text",
            Self::Int => "int",
            Self::Float => "float",
        };
        write!(f, "{label}")
    }
}

///
/// ParseValueError
///

#[derive(Debug, ThisError)]
#[error("expected a numeric string ({kind})")]
pub struct ParseValueError {
    pub kind: FieldKind,
}
