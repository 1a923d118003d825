use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};
use thiserror::Error as ThisError;

///
/// WriteMode
/// Record write that an invariant can be attached to.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    Create,
    Update,
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Update => write!(f, "update"),
        }
    }
}

///
/// SumInvariant
///
/// Declares that the numeric field `total` equals the sum of `parts`.
/// Checked after argument parsing and before any ledger write.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SumInvariant {
    pub total: String,
    pub parts: Vec<String>,
    #[serde(default = "all_modes")]
    pub enforce_on: Vec<WriteMode>,
}

fn all_modes() -> Vec<WriteMode> {
    vec![WriteMode::Create, WriteMode::Update]
}

// Relative tolerance for comparing the declared total against the sum.
const SUM_TOLERANCE: f64 = 1e-9;

impl SumInvariant {
    #[must_use]
    pub fn new(total: impl Into<String>, parts: &[&str]) -> Self {
        Self {
            total: total.into(),
            parts: parts.iter().map(ToString::to_string).collect(),
            enforce_on: all_modes(),
        }
    }

    /// Restrict enforcement to the given write modes.
    #[must_use]
    pub fn enforced_on(mut self, modes: &[WriteMode]) -> Self {
        self.enforce_on = modes.to_vec();
        self
    }

    #[must_use]
    pub fn applies_to(&self, mode: WriteMode) -> bool {
        self.enforce_on.contains(&mode)
    }

    /// Check the invariant against parsed field values.
    pub fn check(&self, fields: &BTreeMap<String, Value>) -> Result<(), InvariantViolation> {
        let numeric = |name: &str| fields.get(name).and_then(Value::as_f64);

        let total = numeric(&self.total).ok_or_else(|| InvariantViolation::MissingField {
            field: self.total.clone(),
        })?;

        let mut sum = 0.0;
        for part in &self.parts {
            sum += numeric(part).ok_or_else(|| InvariantViolation::MissingField {
                field: part.clone(),
            })?;
        }

        if (sum - total).abs() > SUM_TOLERANCE * total.abs().max(1.0) {
            return Err(InvariantViolation::SumMismatch {
                total: self.total.clone(),
                declared: total,
                sum,
            });
        }

        Ok(())
    }
}

///
/// InvariantViolation
///

#[derive(Debug, ThisError)]
pub enum InvariantViolation {
    #[error("'{total}' is {declared} but its parts sum to {sum}")]
    SumMismatch {
        total: String,
        declared: f64,
        sum: f64,
    },

    #[error("invariant field '{field}' is missing or not numeric")]
    MissingField { field: String },
}
