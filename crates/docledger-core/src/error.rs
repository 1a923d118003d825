use serde::Serialize;
use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable classification.
/// Every component error converts into this type before it leaves the
/// operation boundary, so callers can branch on `class` and render `message`.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct an argument error raised before any ledger access.
    pub fn invalid_argument(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvalidArgument, origin, message)
    }

    /// Construct a corruption error for stored bytes that failed to decode.
    pub fn corruption(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::CorruptRecord, origin, message)
    }

    /// Construct a serialize-origin internal error.
    pub(crate) fn serialize_internal(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Internal, ErrorOrigin::Serialize, message)
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.class, ErrorClass::NotFound)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
///
/// Caller-facing error kind. Dispatchers branch on this, never on messages.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum ErrorClass {
    /// Arity, emptiness or type-parse failure; raised before ledger access.
    InvalidArgument,
    AlreadyExists,
    NotFound,
    /// Cross-field invariant violation.
    ValidationError,
    /// Stored bytes failed to decode.
    CorruptRecord,
    MalformedKey,
    InvalidKeyPart,
    UnsupportedQuery,
    /// Error surfaced by the ledger collaborator itself.
    UpstreamFailure,
    Internal,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InvalidArgument => "invalid_argument",
            Self::AlreadyExists => "already_exists",
            Self::NotFound => "not_found",
            Self::ValidationError => "validation",
            Self::CorruptRecord => "corrupt_record",
            Self::MalformedKey => "malformed_key",
            Self::InvalidKeyPart => "invalid_key_part",
            Self::UnsupportedQuery => "unsupported_query",
            Self::UpstreamFailure => "upstream",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Component that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Codec,
    Config,
    Dispatch,
    History,
    Index,
    Ledger,
    Query,
    Serialize,
    Store,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Codec => "codec",
            Self::Config => "config",
            Self::Dispatch => "dispatch",
            Self::History => "history",
            Self::Index => "index",
            Self::Ledger => "ledger",
            Self::Query => "query",
            Self::Serialize => "serialize",
            Self::Store => "store",
        };
        write!(f, "{label}")
    }
}
