//! The versioned key-value ledger consumed by the record layer.
//!
//! Durable storage, transaction ordering and versioning all belong to the
//! ledger. The record layer only reads, stages writes into a `WriteBatch`,
//! and replays the change log.

pub mod batch;
pub mod cursor;
pub mod memory;

use crate::{
    db::query::filter::Filter,
    error::{ErrorClass, ErrorOrigin, InternalError},
};
use derive_more::{Deref, Display};
use thiserror::Error as ThisError;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

// re-exports
pub use batch::{BatchOp, WriteBatch};
pub use cursor::{Cursor, HistoryCursor, KvCursor, KvPair};

///
/// Ledger
///
/// Narrow interface onto the external ledger engine.
/// Every cursor returned here must be released on every exit path; the
/// `Cursor` wrapper takes care of that for callers.
///

pub trait Ledger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), LedgerError>;

    fn delete(&mut self, key: &str) -> Result<(), LedgerError>;

    /// Ordered scan over `[start, end)`; an empty bound is open.
    fn scan_range(&self, start: &str, end: &str) -> Result<KvCursor<'_>, LedgerError>;

    /// Ordered scan over every key starting with `prefix`.
    fn scan_prefix(&self, prefix: &str) -> Result<KvCursor<'_>, LedgerError>;

    /// Whether `query_predicate` is answered at all.
    fn supports_predicate_query(&self) -> bool {
        false
    }

    fn query_predicate(&self, _filter: &Filter) -> Result<KvCursor<'_>, LedgerError> {
        Err(LedgerError::Unsupported("predicate queries"))
    }

    /// Change log for `key`, oldest first.
    fn history(&self, key: &str) -> Result<HistoryCursor<'_>, LedgerError>;

    /// Apply a staged batch as one logical operation.
    ///
    /// The default applies each op in order within the caller's transaction
    /// context; ledgers with native batches should override it.
    fn write_batch(&mut self, batch: WriteBatch) -> Result<(), LedgerError> {
        for op in batch {
            match op {
                BatchOp::Put { key, value } => self.put(&key, &value)?,
                BatchOp::Delete { key } => self.delete(&key)?,
            }
        }

        Ok(())
    }
}

///
/// TxId
/// Opaque transaction identifier assigned by the ledger.
///

#[derive(Clone, Debug, Deref, Display, Eq, Hash, PartialEq)]
pub struct TxId(String);

impl TxId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

///
/// Timestamp
/// Commit time as seconds and nanoseconds since the Unix epoch.
///

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: u32,
}

impl Timestamp {
    #[must_use]
    pub const fn new(seconds: i64, nanos: u32) -> Self {
        Self { seconds, nanos }
    }

    /// Render as RFC 3339 in UTC.
    pub fn to_rfc3339(self) -> Result<String, time::error::Error> {
        let nanos = i128::from(self.seconds) * 1_000_000_000 + i128::from(self.nanos);
        let at = OffsetDateTime::from_unix_timestamp_nanos(nanos)?;

        Ok(at.format(&Rfc3339)?)
    }
}

///
/// HistoryRecord
/// One change-log entry; `value` is `None` for deletions.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HistoryRecord {
    pub tx_id: TxId,
    pub timestamp: Timestamp,
    pub is_delete: bool,
    pub value: Option<Vec<u8>>,
}

///
/// LedgerError
///

#[derive(Debug, ThisError)]
pub enum LedgerError {
    #[error("ledger failure: {0}")]
    Backend(String),

    #[error("ledger does not support {0}")]
    Unsupported(&'static str),

    #[error("invalid ledger key '{0}'")]
    InvalidKey(String),
}

impl LedgerError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::Backend(_) => ErrorClass::UpstreamFailure,
            Self::Unsupported(_) => ErrorClass::UnsupportedQuery,
            Self::InvalidKey(_) => ErrorClass::InvalidArgument,
        }
    }
}

impl From<LedgerError> for InternalError {
    fn from(err: LedgerError) -> Self {
        Self::new(err.class(), ErrorOrigin::Ledger, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_renders_rfc3339() {
        let ts = Timestamp::new(1_514_764_800, 0);

        assert_eq!(ts.to_rfc3339().unwrap(), "2018-01-01T00:00:00Z");
    }

    #[test]
    fn ledger_errors_map_to_classes() {
        let unsupported: InternalError = LedgerError::Unsupported("predicate queries").into();
        let backend: InternalError = LedgerError::Backend("down".into()).into();

        assert_eq!(unsupported.class, ErrorClass::UnsupportedQuery);
        assert_eq!(backend.class, ErrorClass::UpstreamFailure);
        assert_eq!(backend.origin, ErrorOrigin::Ledger);
    }

    #[test]
    fn tx_id_displays_inner_value() {
        assert_eq!(TxId::new("abc").to_string(), "abc");
        assert_eq!(TxId::new("abc").len(), 3);
    }
}
