//! Composite keys for secondary index entries.
//!
//! Layout: `U+0000`, the index name, then each part, each followed by
//! `U+0000`. Because the separator sorts below every other code point, the
//! ledger's byte order groups entries by name, then by each part in turn.

use crate::error::{ErrorClass, ErrorOrigin, InternalError};
use std::fmt;
use thiserror::Error as ThisError;

/// Leading byte reserved for composite keys.
pub const NAMESPACE: char = '\u{0}';

/// Terminator following the index name and every part.
pub const SEPARATOR: char = '\u{0}';

/// Open upper bound of prefix scans; never valid inside a part.
pub const MAX_UNICODE: char = '\u{10FFFF}';

///
/// KeyCodec
///

pub struct KeyCodec;

impl KeyCodec {
    /// Compose a full composite key. Every part must be non-empty.
    pub fn compose<S: AsRef<str>>(index_name: &str, parts: &[S]) -> Result<String, KeyError> {
        for part in parts {
            if part.as_ref().is_empty() {
                return Err(KeyError::InvalidKeyPart {
                    part: String::new(),
                    reason: "empty part",
                });
            }
        }

        Self::compose_partial(index_name, parts)
    }

    /// Compose a key prefix fixing only the leading parts.
    ///
    /// Every index entry whose parts start with `parts` sorts after the
    /// prefix and shares it byte for byte.
    pub fn compose_partial<S: AsRef<str>>(
        index_name: &str,
        parts: &[S],
    ) -> Result<String, KeyError> {
        if index_name.is_empty() {
            return Err(KeyError::InvalidKeyPart {
                part: String::new(),
                reason: "empty index name",
            });
        }
        Self::check_part(index_name)?;

        let mut key = String::with_capacity(
            2 + index_name.len() + parts.iter().map(|p| p.as_ref().len() + 1).sum::<usize>(),
        );
        key.push(NAMESPACE);
        key.push_str(index_name);
        key.push(SEPARATOR);

        for part in parts {
            let part = part.as_ref();
            Self::check_part(part)?;
            key.push_str(part);
            key.push(SEPARATOR);
        }

        Ok(key)
    }

    /// Split a composite key back into `(index_name, parts)`.
    pub fn split(key: &str) -> Result<(String, Vec<String>), KeyError> {
        let malformed = || KeyError::MalformedKey(key.to_string());

        let body = key
            .strip_prefix(NAMESPACE)
            .and_then(|rest| rest.strip_suffix(SEPARATOR))
            .ok_or_else(malformed)?;
        if body.contains(MAX_UNICODE) {
            return Err(malformed());
        }

        let mut segments = body.split(SEPARATOR);
        let index_name = match segments.next() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(malformed()),
        };

        Ok((index_name, segments.map(str::to_string).collect()))
    }

    /// Whether `key` lives in the composite namespace.
    #[must_use]
    pub fn is_composite(key: &str) -> bool {
        key.starts_with(NAMESPACE)
    }

    /// Validate one part (or index name) for use inside a composite key.
    pub fn check_part(part: &str) -> Result<(), KeyError> {
        let reason = if part.contains(SEPARATOR) {
            "contains the key separator"
        } else if part.contains(MAX_UNICODE) {
            "contains U+10FFFF"
        } else {
            return Ok(());
        };

        Err(KeyError::InvalidKeyPart {
            part: part.to_string(),
            reason,
        })
    }

    /// Validate a simple (primary) key.
    pub fn check_primary(key: &str) -> Result<(), KeyError> {
        if key.is_empty() {
            return Err(KeyError::EmptyPrimaryKey);
        }
        if Self::is_composite(key) {
            return Err(KeyError::ReservedPrimaryKey(key.to_string()));
        }

        Ok(())
    }
}

///
/// CompositeKey
/// Decoded form of a composite key.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompositeKey {
    pub index_name: String,
    pub parts: Vec<String>,
}

impl CompositeKey {
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        let (index_name, parts) = KeyCodec::split(key)?;

        Ok(Self { index_name, parts })
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.index_name, self.parts.join(", "))
    }
}

///
/// KeyError
///

#[derive(Debug, ThisError)]
pub enum KeyError {
    #[error("invalid key part {part:?}: {reason}")]
    InvalidKeyPart { part: String, reason: &'static str },

    #[error("malformed composite key {0:?}")]
    MalformedKey(String),

    #[error("primary key must be non-empty")]
    EmptyPrimaryKey,

    #[error("primary key {0:?} uses the reserved composite namespace")]
    ReservedPrimaryKey(String),
}

impl KeyError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidKeyPart { .. } => ErrorClass::InvalidKeyPart,
            Self::MalformedKey(_) => ErrorClass::MalformedKey,
            Self::EmptyPrimaryKey | Self::ReservedPrimaryKey(_) => ErrorClass::InvalidArgument,
        }
    }
}

impl From<KeyError> for InternalError {
    fn from(err: KeyError) -> Self {
        Self::new(err.class(), ErrorOrigin::Codec, err.to_string())
    }
}
