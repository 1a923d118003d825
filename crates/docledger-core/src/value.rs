use crate::model::FieldKind;
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// Value
///
/// Scalar field value of a record.
/// Serializes as the bare JSON scalar; integers and floats stay distinct so a
/// float field holding `100.0` never decodes back as an integer.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view with integer widening.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(n) => Some(*n as f64),
            Self::Float(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    /// Project a stored JSON value into a scalar of the declared kind.
    #[must_use]
    pub fn from_json(json: &serde_json::Value, kind: FieldKind) -> Option<Self> {
        match (json, kind) {
            (serde_json::Value::String(s), FieldKind::Text) => Some(Self::Text(s.clone())),
            (serde_json::Value::Number(n), FieldKind::Int) => n.as_i64().map(Self::Int),
            (serde_json::Value::Number(n), FieldKind::Float) => n.as_f64().map(Self::Float),
            _ => None,
        }
    }

    /// Render this value as one composite-key part.
    #[must_use]
    pub fn to_key_part(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}
