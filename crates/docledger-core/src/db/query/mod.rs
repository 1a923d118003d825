//! Read paths over the ledger: primary-key ranges, partial composite-key
//! scans over the secondary index, and predicate queries delegated to the
//! ledger.

pub mod filter;
pub mod response;

use crate::{
    db::{
        index::IndexMaintainer,
        key::{CompositeKey, KeyCodec},
        record::Record,
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    ledger::{KvCursor, Ledger},
    model::RecordModel,
    obs::sink::{self, MetricsEvent, OpKind, Span},
};
use thiserror::Error as ThisError;

// re-exports
pub use filter::Filter;
pub use response::{QueryResult, ReadStability, Row};

///
/// QueryEngine
///
/// Read-only query surface for one record model.
/// Every ledger cursor opened here is drained or dropped before the call
/// returns, so no cursor outlives an operation.
///

pub struct QueryEngine<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    model: &'a RecordModel,
}

impl<'a, L: Ledger + ?Sized> QueryEngine<'a, L> {
    #[must_use]
    pub const fn new(ledger: &'a L, model: &'a RecordModel) -> Self {
        Self { ledger, model }
    }

    /// Every record with a primary key in `[start, end)`, in key order.
    ///
    /// An empty bound is open. Records of every kind are returned.
    pub fn range(&self, start: &str, end: &str) -> Result<QueryResult, InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Query, &model.kind);
        for bound in [start, end] {
            if KeyCodec::is_composite(bound) {
                return Err(QueryError::CompositeBound(bound.to_string()).into());
            }
        }

        let rows = self.collect(self.ledger.scan_range(start, end)?)?;
        tracing::debug!(kind = %model.kind, start, end, rows = rows.len(), "range query");
        span.succeed(rows.len() as u64);

        Ok(QueryResult::new(rows, ReadStability::Revalidated))
    }

    /// Lazy scan of the index entries whose leading attributes equal `parts`.
    pub fn prefix<S: AsRef<str>>(
        &self,
        index_name: &str,
        parts: &[S],
    ) -> Result<IndexStream<'a>, InternalError> {
        let model = self.model;
        let index = model
            .index
            .as_ref()
            .ok_or_else(|| QueryError::NoIndex(model.kind.clone()))?;
        if index.name != index_name {
            return Err(QueryError::UnknownIndex {
                kind: model.kind.clone(),
                index: index_name.to_string(),
            }
            .into());
        }
        if parts.len() > index.fields.len() {
            return Err(QueryError::PrefixWidth {
                index: index.to_string(),
                max: index.fields.len(),
                got: parts.len(),
            }
            .into());
        }

        let parts = IndexMaintainer::new(model).prefix_parts(parts)?;
        let prefix = KeyCodec::compose_partial(index_name, &parts)?;
        let ledger: &'a L = self.ledger;
        let cursor = ledger.scan_prefix(&prefix)?;

        Ok(IndexStream {
            cursor,
            width: index.fields.len(),
            kind: &model.kind,
            scanned: 0,
        })
    }

    /// Dereference every index match into its live record.
    ///
    /// An entry whose record is gone, or no longer carries the indexed
    /// values, is index corruption.
    pub fn resolve(&self, stream: IndexStream<'_>) -> Result<QueryResult, InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Query, &model.kind);
        let indexes = IndexMaintainer::new(model);

        let mut rows = Vec::new();
        for found in stream {
            let found = found?;
            let bytes = self.ledger.get(&found.primary_key)?.ok_or_else(|| {
                InternalError::corruption(
                    ErrorOrigin::Index,
                    format!("index entry {} points at missing record", found.entry()),
                )
            })?;

            let record = Record::decode(model, &found.primary_key, &bytes)?;
            if indexes.entry_key(&record)?.as_deref() != Some(found.key.as_str()) {
                return Err(InternalError::corruption(
                    ErrorOrigin::Index,
                    format!("index entry {} is stale", found.entry()),
                ));
            }

            rows.push(Row::from_stored(found.primary_key, &bytes));
        }

        tracing::debug!(kind = %model.kind, rows = rows.len(), "index entries resolved");
        span.succeed(rows.len() as u64);

        Ok(QueryResult::new(rows, ReadStability::Revalidated))
    }

    /// Partial-key scan followed by dereference.
    pub fn prefix_query<S: AsRef<str>>(
        &self,
        index_name: &str,
        parts: &[S],
    ) -> Result<QueryResult, InternalError> {
        self.resolve(self.prefix(index_name, parts)?)
    }

    /// Hand `filter` to the ledger's predicate engine.
    pub fn predicate(&self, filter: &Filter) -> Result<QueryResult, InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Query, &model.kind);
        if !self.ledger.supports_predicate_query() {
            return Err(QueryError::Unsupported.into());
        }

        let rows = self.collect(self.ledger.query_predicate(filter)?)?;
        tracing::debug!(kind = %model.kind, %filter, rows = rows.len(), "predicate query");
        span.succeed(rows.len() as u64);

        Ok(QueryResult::new(rows, ReadStability::PointInTime))
    }

    /// Records of this kind whose `field` equals `raw`, parsed per the
    /// field's declared kind.
    pub fn query_by_field(&self, field: &str, raw: &str) -> Result<QueryResult, InternalError> {
        let model = self.model;
        let declared = model
            .field(field)
            .ok_or_else(|| QueryError::UnknownField(field.to_string()))?;
        let value = declared.kind.parse(raw).map_err(|err| {
            InternalError::invalid_argument(ErrorOrigin::Query, format!("{field}: {err}"))
        })?;
        let json = serde_json::to_value(&value)
            .map_err(|err| InternalError::serialize_internal(err.to_string()))?;

        self.predicate(&Filter::eq_selector(&model.kind, field, json)?)
    }

    fn collect(&self, cursor: KvCursor<'_>) -> Result<Vec<Row>, InternalError> {
        let mut rows = Vec::new();
        for item in cursor {
            let (key, bytes) = item?;
            if KeyCodec::is_composite(&key) {
                continue;
            }
            rows.push(Row::from_stored(key, &bytes));
        }

        sink::record(MetricsEvent::RowsScanned {
            kind: &self.model.kind,
            rows: rows.len() as u64,
        });

        Ok(rows)
    }
}

///
/// IndexMatch
/// One index entry split back into its attributes and primary key.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexMatch {
    pub key: String,
    pub index_name: String,
    pub attributes: Vec<String>,
    pub primary_key: String,
}

impl IndexMatch {
    fn parse(key: String, width: usize) -> Result<Self, InternalError> {
        let CompositeKey {
            index_name,
            mut parts,
        } = CompositeKey::parse(&key)?;
        if parts.len() != width + 1 {
            return Err(InternalError::corruption(
                ErrorOrigin::Index,
                format!(
                    "index entry {index_name}[{}] has {} parts, expected {}",
                    parts.join(", "),
                    parts.len(),
                    width + 1
                ),
            ));
        }
        let primary_key = parts.pop().unwrap_or_default();

        Ok(Self {
            key,
            index_name,
            attributes: parts,
            primary_key,
        })
    }

    fn entry(&self) -> CompositeKey {
        let mut parts = self.attributes.clone();
        parts.push(self.primary_key.clone());

        CompositeKey {
            index_name: self.index_name.clone(),
            parts,
        }
    }
}

///
/// IndexStream
///
/// Lazy, forward-only stream of index matches.
/// The underlying ledger cursor is released when the stream is drained,
/// dropped, or yields an error.
///

pub struct IndexStream<'a> {
    cursor: KvCursor<'a>,
    width: usize,
    kind: &'a str,
    scanned: u64,
}

impl Iterator for IndexStream<'_> {
    type Item = Result<IndexMatch, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.cursor.next()?;
        self.scanned += 1;

        Some(
            item.map_err(InternalError::from)
                .and_then(|(key, _)| IndexMatch::parse(key, self.width)),
        )
    }
}

impl Drop for IndexStream<'_> {
    fn drop(&mut self) {
        if self.scanned > 0 {
            sink::record(MetricsEvent::RowsScanned {
                kind: self.kind,
                rows: self.scanned,
            });
        }
    }
}

///
/// QueryError
///

#[derive(Debug, ThisError)]
pub enum QueryError {
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("ledger does not support predicate queries")]
    Unsupported,

    #[error("range bound '{}' lies in the composite key namespace", .0.escape_debug())]
    CompositeBound(String),

    #[error("record kind '{0}' declares no index")]
    NoIndex(String),

    #[error("record kind '{kind}' has no index named '{index}'")]
    UnknownIndex { kind: String, index: String },

    #[error("index {index} takes at most {max} prefix parts, got {got}")]
    PrefixWidth {
        index: String,
        max: usize,
        got: usize,
    },

    #[error("unknown field '{0}'")]
    UnknownField(String),
}

impl QueryError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::Unsupported => ErrorClass::UnsupportedQuery,
            _ => ErrorClass::InvalidArgument,
        }
    }
}

impl From<QueryError> for InternalError {
    fn from(err: QueryError) -> Self {
        Self::new(err.class(), ErrorOrigin::Query, err.to_string())
    }
}
