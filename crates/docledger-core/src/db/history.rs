use crate::{
    db::key::KeyCodec,
    error::{ErrorClass, ErrorOrigin, InternalError},
    ledger::{HistoryCursor, HistoryRecord, Ledger},
    model::RecordModel,
    obs::sink::{OpKind, Span},
};
use serde::Serialize;

///
/// HistoryReader
///
/// Replays the ledger's change log for one primary key.
///

pub struct HistoryReader<'a, L: Ledger + ?Sized> {
    ledger: &'a L,
    model: &'a RecordModel,
}

impl<'a, L: Ledger + ?Sized> HistoryReader<'a, L> {
    #[must_use]
    pub const fn new(ledger: &'a L, model: &'a RecordModel) -> Self {
        Self { ledger, model }
    }

    /// Lazy stream of every change to `key`, oldest first.
    pub fn history_of(&self, key: &str) -> Result<HistoryStream<'a>, InternalError> {
        KeyCodec::check_primary(key)?;
        let ledger: &'a L = self.ledger;

        Ok(HistoryStream {
            key: key.to_string(),
            cursor: ledger.history(key)?,
        })
    }

    /// Drain the history of `key` into a JSON array of entries.
    pub fn render(&self, key: &str) -> Result<Vec<u8>, InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::History, &model.kind);

        let entries = self.history_of(key)?.collect::<Result<Vec<_>, _>>()?;
        let bytes = serde_json::to_vec(&entries)
            .map_err(|err| InternalError::serialize_internal(err.to_string()))?;

        tracing::debug!(kind = %model.kind, key, entries = entries.len(), "history read");
        span.succeed(entries.len() as u64);

        Ok(bytes)
    }
}

///
/// HistoryEntry
///
/// One rendered change. `value` is JSON null for deletions.
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HistoryEntry {
    #[serde(rename = "TxId")]
    pub tx_id: String,

    #[serde(rename = "Value")]
    pub value: serde_json::Value,

    #[serde(rename = "Timestamp")]
    pub timestamp: String,

    #[serde(rename = "IsDelete")]
    pub is_delete: bool,
}

impl HistoryEntry {
    fn from_record(key: &str, record: HistoryRecord) -> Result<Self, InternalError> {
        let timestamp = record.timestamp.to_rfc3339().map_err(|err| {
            InternalError::new(
                ErrorClass::Internal,
                ErrorOrigin::History,
                format!("timestamp of tx {} out of range: {err}", record.tx_id),
            )
        })?;

        let value = match (&record.value, record.is_delete) {
            (_, true) | (None, false) => serde_json::Value::Null,
            (Some(bytes), false) => serde_json::from_slice(bytes).map_err(|err| {
                InternalError::corruption(
                    ErrorOrigin::History,
                    format!("history value of '{key}' at tx {}: {err}", record.tx_id),
                )
            })?,
        };

        Ok(Self {
            tx_id: record.tx_id.to_string(),
            value,
            timestamp,
            is_delete: record.is_delete,
        })
    }
}

///
/// HistoryStream
///
/// Lazy, finite and not restartable.
/// The ledger cursor is released once drained, dropped, or after an error.
///

pub struct HistoryStream<'a> {
    key: String,
    cursor: HistoryCursor<'a>,
}

impl Iterator for HistoryStream<'_> {
    type Item = Result<HistoryEntry, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.cursor.next()?;

        Some(
            item.map_err(InternalError::from)
                .and_then(|record| HistoryEntry::from_record(&self.key, record)),
        )
    }
}
