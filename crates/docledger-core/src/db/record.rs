use crate::{
    KIND_FIELD,
    db::key::{KeyCodec, KeyError},
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{FieldKind, RecordModel, WriteMode, invariant::InvariantViolation},
    value::Value,
};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// Record
///
/// Decoded record: kind discriminator plus field values.
/// Optional fields left empty are absent from `fields`.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    kind: String,
    fields: BTreeMap<String, Value>,
}

impl Record {
    #[must_use]
    pub fn new(kind: impl Into<String>, fields: BTreeMap<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            fields,
        }
    }

    /// Build a record from positional string arguments.
    ///
    /// Checks arity, emptiness and per-field parsing; no ledger access.
    pub fn from_args(model: &RecordModel, args: &[String]) -> Result<Self, RecordError> {
        if args.len() != model.arity() {
            return Err(RecordError::Arity {
                expected: model.arity(),
                got: args.len(),
            });
        }

        let mut fields = BTreeMap::new();
        for (field, raw) in model.fields.iter().zip(args) {
            if raw.is_empty() {
                if field.required {
                    return Err(RecordError::EmptyField(field.name.clone()));
                }
                continue;
            }

            let value = parse_field(&field.name, field.kind, raw)?;
            fields.insert(field.name.clone(), value);
        }

        let record = Self::new(model.kind.clone(), fields);
        KeyCodec::check_primary(record.primary_key(model)?)?;

        Ok(record)
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn primary_key<'a>(&'a self, model: &RecordModel) -> Result<&'a str, RecordError> {
        self.get(&model.primary_key)
            .and_then(Value::as_text)
            .ok_or_else(|| RecordError::EmptyField(model.primary_key.clone()))
    }

    /// Replace one field from its raw string form.
    ///
    /// The primary key is the record's identity and cannot be reassigned.
    pub fn set(&mut self, model: &RecordModel, field: &str, raw: &str) -> Result<(), RecordError> {
        let declared = model
            .field(field)
            .ok_or_else(|| RecordError::UnknownField(field.to_string()))?;
        if declared.name == model.primary_key {
            return Err(RecordError::PrimaryKeyImmutable(field.to_string()));
        }

        if raw.is_empty() {
            if declared.required {
                return Err(RecordError::EmptyField(field.to_string()));
            }
            self.fields.remove(field);
            return Ok(());
        }

        let value = parse_field(field, declared.kind, raw)?;
        self.fields.insert(field.to_string(), value);

        Ok(())
    }

    /// Check every invariant the model attaches to `mode`.
    pub fn check_invariants(&self, model: &RecordModel, mode: WriteMode) -> Result<(), RecordError> {
        for invariant in model.invariants_for(mode) {
            invariant.check(&self.fields)?;
        }

        Ok(())
    }

    /// Indexed attribute values in declared order, if the model has an index.
    #[must_use]
    pub fn index_parts(&self, model: &RecordModel) -> Option<Vec<String>> {
        let index = model.index.as_ref()?;

        index
            .fields
            .iter()
            .map(|field| self.get(field).map(Value::to_key_part))
            .collect()
    }

    /// Kind discriminator of stored bytes, without decoding any field.
    #[must_use]
    pub fn peek_kind(bytes: &[u8]) -> Option<String> {
        #[derive(Deserialize)]
        struct Kind {
            #[serde(rename = "docType")]
            kind: String,
        }

        serde_json::from_slice::<Kind>(bytes).ok().map(|k| k.kind)
    }

    /// Encode as the flat JSON document stored in the ledger.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        serde_json::to_vec(self).map_err(|err| RecordError::Encode(err.to_string()))
    }

    /// Decode stored bytes against the model.
    ///
    /// `key` is the ledger key the bytes were read from; the primary-key
    /// field must agree with it.
    pub fn decode(model: &RecordModel, key: &str, bytes: &[u8]) -> Result<Self, RecordError> {
        let corrupt = |reason: String| RecordError::Corrupt {
            key: key.to_string(),
            reason,
        };

        let json: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|err| corrupt(err.to_string()))?;
        let serde_json::Value::Object(object) = json else {
            return Err(corrupt("not a JSON object".into()));
        };

        match object.get(KIND_FIELD).and_then(serde_json::Value::as_str) {
            Some(kind) if kind == model.kind => {}
            Some(kind) => return Err(corrupt(format!("unexpected {KIND_FIELD} '{kind}'"))),
            None => return Err(corrupt(format!("missing {KIND_FIELD}"))),
        }

        let mut fields = BTreeMap::new();
        for field in &model.fields {
            match object.get(&field.name) {
                Some(json) => {
                    let value = Value::from_json(json, field.kind).ok_or_else(|| {
                        corrupt(format!("field '{}' is not {}", field.name, field.kind))
                    })?;
                    fields.insert(field.name.clone(), value);
                }
                None if field.required => {
                    return Err(corrupt(format!("missing field '{}'", field.name)));
                }
                None => {}
            }
        }

        for name in object.keys() {
            if name != KIND_FIELD && model.field(name).is_none() {
                tracing::warn!(key, field = %name, kind = %model.kind, "ignoring undeclared field");
            }
        }

        let record = Self::new(model.kind.clone(), fields);
        let stored = record
            .primary_key(model)
            .map_err(|_| corrupt("primary key field is empty".into()))?;
        if stored != key {
            return Err(corrupt(format!("primary key field holds '{stored}'")));
        }

        Ok(record)
    }
}

// docType first, then fields in name order.
impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry(KIND_FIELD, &self.kind)?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn parse_field(name: &str, kind: FieldKind, raw: &str) -> Result<Value, RecordError> {
    kind.parse(raw).map_err(|_| RecordError::NotNumeric {
        field: name.to_string(),
        kind,
    })
}

///
/// RecordError
///

#[derive(Debug, ThisError)]
pub enum RecordError {
    #[error("incorrect number of arguments: expecting {expected}, got {got}")]
    Arity { expected: usize, got: usize },

    #[error("field '{0}' must be a non-empty string")]
    EmptyField(String),

    #[error("field '{field}' must be a numeric string ({kind})")]
    NotNumeric { field: String, kind: FieldKind },

    #[error("field '{0}' is not declared")]
    UnknownField(String),

    #[error("primary key field '{0}' cannot be changed")]
    PrimaryKeyImmutable(String),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("validation failed: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("corrupt record at '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("record encoding failed: {0}")]
    Encode(String),
}

impl RecordError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::Arity { .. }
            | Self::EmptyField(_)
            | Self::NotNumeric { .. }
            | Self::UnknownField(_)
            | Self::PrimaryKeyImmutable(_) => ErrorClass::InvalidArgument,
            Self::Key(err) => err.class(),
            Self::Invariant(_) => ErrorClass::ValidationError,
            Self::Corrupt { .. } => ErrorClass::CorruptRecord,
            Self::Encode(_) => ErrorClass::Internal,
        }
    }

    pub(crate) const fn origin(&self) -> ErrorOrigin {
        match self {
            Self::Corrupt { .. } | Self::Encode(_) | Self::Key(_) => ErrorOrigin::Codec,
            _ => ErrorOrigin::Store,
        }
    }
}

impl From<RecordError> for InternalError {
    fn from(err: RecordError) -> Self {
        Self::new(err.class(), err.origin(), err.to_string())
    }
}
