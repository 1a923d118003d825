use docledger_core::error::{ErrorClass, ErrorOrigin, InternalError};
use serde::Serialize;
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable class + origin taxonomy.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, ThisError)]
#[error("{origin}:{class}: {message}")]
pub struct Error {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl Error {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Whether the caller can fix the request and retry.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(
            self.class,
            ErrorClass::InvalidArgument
                | ErrorClass::AlreadyExists
                | ErrorClass::NotFound
                | ErrorClass::ValidationError
                | ErrorClass::InvalidKeyPart
                | ErrorClass::UnsupportedQuery
        )
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        Self::new(err.class, err.origin, err.message)
    }
}
