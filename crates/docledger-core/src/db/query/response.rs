use crate::error::InternalError;
use serde::Serialize;

///
/// ReadStability
///
/// Whether a result set is safe to feed a write.
/// `Revalidated` reads are re-checked by the ledger's commit protocol;
/// `PointInTime` reads are not and may see phantoms.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum ReadStability {
    Revalidated,
    PointInTime,
}

///
/// Row
///

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Row {
    #[serde(rename = "Key")]
    pub key: String,

    #[serde(rename = "Record")]
    pub record: serde_json::Value,
}

impl Row {
    /// Row over stored bytes; bytes that are not JSON render as a string.
    #[must_use]
    pub fn from_stored(key: String, bytes: &[u8]) -> Self {
        let record = serde_json::from_slice(bytes).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned())
        });

        Self { key, record }
    }
}

///
/// QueryResult
///

#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub stability: ReadStability,
}

impl QueryResult {
    #[must_use]
    pub const fn new(rows: Vec<Row>, stability: ReadStability) -> Self {
        Self { rows, stability }
    }

    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.rows.iter().map(|row| row.key.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render as a JSON array of `{"Key", "Record"}` objects.
    pub fn to_json(&self) -> Result<Vec<u8>, InternalError> {
        serde_json::to_vec(&self.rows)
            .map_err(|err| InternalError::serialize_internal(err.to_string()))
    }
}
