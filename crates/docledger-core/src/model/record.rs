use crate::{
    KIND_FIELD, MAX_INDEX_FIELDS,
    db::key::KeyCodec,
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{FieldKind, FieldModel, IndexModel, SumInvariant, WriteMode},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// RecordModel
///
/// Runtime schema for one record kind.
/// Replaces hand-written per-shape handlers: argument order, field types,
/// the optional secondary index and cross-field invariants all live here.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecordModel {
    /// Kind discriminator stored in every record (`docType`).
    pub kind: String,
    /// Field holding the primary key; always text and required.
    pub primary_key: String,
    /// Ordered field list. Dispatcher arguments map onto it positionally.
    pub fields: Vec<FieldModel>,
    #[serde(default)]
    pub index: Option<IndexModel>,
    #[serde(default)]
    pub invariants: Vec<SumInvariant>,
}

impl RecordModel {
    #[must_use]
    pub fn new(
        kind: impl Into<String>,
        primary_key: impl Into<String>,
        fields: Vec<FieldModel>,
    ) -> Self {
        Self {
            kind: kind.into(),
            primary_key: primary_key.into(),
            fields,
            index: None,
            invariants: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_index(mut self, index: IndexModel) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn with_invariant(mut self, invariant: SumInvariant) -> Self {
        self.invariants.push(invariant);
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldModel> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of positional arguments a full-field write expects.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn invariants_for(&self, mode: WriteMode) -> impl Iterator<Item = &SumInvariant> {
        self.invariants.iter().filter(move |inv| inv.applies_to(mode))
    }

    /// Check structural consistency of the model.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.kind.is_empty() {
            return Err(ModelError::EmptyKind);
        }

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(ModelError::EmptyFieldName);
            }
            if field.name == KIND_FIELD {
                return Err(ModelError::ReservedField(field.name.clone()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ModelError::DuplicateField(field.name.clone()));
            }
        }

        let pk = self
            .field(&self.primary_key)
            .ok_or_else(|| ModelError::MissingPrimaryKey(self.primary_key.clone()))?;
        if pk.kind != FieldKind::Text || !pk.required {
            return Err(ModelError::PrimaryKeyShape(self.primary_key.clone()));
        }

        if let Some(index) = &self.index {
            self.validate_index(index)?;
        }

        for inv in &self.invariants {
            for name in std::iter::once(&inv.total).chain(&inv.parts) {
                match self.field(name) {
                    Some(f) if f.kind.is_numeric() && f.required => {}
                    Some(_) => return Err(ModelError::InvariantFieldShape(name.clone())),
                    None => return Err(ModelError::UnknownField(name.clone())),
                }
            }
        }

        Ok(())
    }

    fn validate_index(&self, index: &IndexModel) -> Result<(), ModelError> {
        KeyCodec::check_part(&index.name)
            .map_err(|err| ModelError::IndexName(index.name.clone(), err.to_string()))?;
        if index.name.is_empty() {
            return Err(ModelError::IndexName(index.name.clone(), "empty".into()));
        }
        if index.fields.is_empty() || index.fields.len() > MAX_INDEX_FIELDS {
            return Err(ModelError::IndexWidth {
                index: index.name.clone(),
                len: index.fields.len(),
            });
        }

        for name in &index.fields {
            match self.field(name) {
                Some(f) if f.required => {}
                Some(_) => return Err(ModelError::OptionalIndexField(name.clone())),
                None => return Err(ModelError::UnknownField(name.clone())),
            }
        }

        Ok(())
    }
}

///
/// ModelError
/// Structural errors in a record model declaration.
///

#[derive(Debug, ThisError)]
pub enum ModelError {
    #[error("record kind must be non-empty")]
    EmptyKind,

    #[error("field names must be non-empty")]
    EmptyFieldName,

    #[error("field name '{0}' is reserved")]
    ReservedField(String),

    #[error("field '{0}' is declared twice")]
    DuplicateField(String),

    #[error("primary key field '{0}' is not declared")]
    MissingPrimaryKey(String),

    #[error("primary key field '{0}' must be a required text field")]
    PrimaryKeyShape(String),

    #[error("field '{0}' is not declared")]
    UnknownField(String),

    #[error("index name '{0}' is invalid: {1}")]
    IndexName(String, String),

    #[error("index '{index}' declares {len} fields (expected 1..={MAX_INDEX_FIELDS})")]
    IndexWidth { index: String, len: usize },

    #[error("indexed field '{0}' must be required")]
    OptionalIndexField(String),

    #[error("invariant field '{0}' must be a required numeric field")]
    InvariantFieldShape(String),
}

impl From<ModelError> for InternalError {
    fn from(err: ModelError) -> Self {
        Self::new(ErrorClass::InvalidArgument, ErrorOrigin::Config, err.to_string())
    }
}
