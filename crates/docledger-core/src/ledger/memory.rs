use crate::{
    db::{key::KeyCodec, query::filter::Filter},
    ledger::{
        BatchOp, Cursor, HistoryCursor, HistoryRecord, KvCursor, Ledger, LedgerError, Timestamp,
        TxId, WriteBatch,
    },
};
use sha2::{Digest, Sha256};
use std::{
    cell::Cell,
    collections::BTreeMap,
    fmt::Write as _,
    ops::Bound,
    rc::Rc,
    time::{SystemTime, UNIX_EPOCH},
};

///
/// FailPoint
/// Ledger call that fails the next time it runs.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailPoint {
    Get,
    Put,
    Delete,
    Scan,
    WriteBatch,
    History,
    /// The `index`-th item of the next scan cursor fails.
    CursorItem { index: usize },
}

///
/// MemoryLedger
///
/// In-process reference ledger: ordered keys, one transaction id per
/// write call, an append-only change log, optional predicate queries,
/// open-cursor accounting and one-shot fault injection.
///
/// Not durable; it exists so the record layer can be embedded and tested.
///

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: BTreeMap<String, Vec<u8>>,
    log: BTreeMap<String, Vec<HistoryRecord>>,
    seq: u64,
    rich_queries: bool,
    open_cursors: Rc<Cell<usize>>,
    fail: Cell<Option<FailPoint>>,
}

impl MemoryLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that also answers predicate queries.
    #[must_use]
    pub fn with_rich_queries() -> Self {
        Self {
            rich_queries: true,
            ..Self::default()
        }
    }

    /// Arm a one-shot failure.
    pub fn fail_next(&self, point: FailPoint) {
        self.fail.set(Some(point));
    }

    /// Number of cursors handed out and not yet released.
    #[must_use]
    pub fn open_cursors(&self) -> usize {
        self.open_cursors.get()
    }

    /// Number of live keys, index entries included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    /// Number of committed transactions so far.
    #[must_use]
    pub const fn committed(&self) -> u64 {
        self.seq
    }

    fn trip(&self, point: FailPoint) -> Result<(), LedgerError> {
        if self.fail.get() == Some(point) {
            self.fail.set(None);
            return Err(LedgerError::Backend(format!("injected failure at {point:?}")));
        }

        Ok(())
    }

    fn take_cursor_fault(&self) -> Option<usize> {
        match self.fail.get() {
            Some(FailPoint::CursorItem { index }) => {
                self.fail.set(None);
                Some(index)
            }
            _ => None,
        }
    }

    fn cursor<'a, T: 'a>(&self, items: impl Iterator<Item = T> + 'a) -> Cursor<'a, T> {
        let fail_at = self.take_cursor_fault();
        let items = items.enumerate().map(move |(i, item)| {
            if Some(i) == fail_at {
                Err(LedgerError::Backend(format!("injected failure at cursor item {i}")))
            } else {
                Ok(item)
            }
        });

        let open = Rc::clone(&self.open_cursors);
        open.set(open.get() + 1);

        Cursor::with_release(items, move || open.set(open.get().saturating_sub(1)))
    }

    fn check_key(key: &str) -> Result<(), LedgerError> {
        if key.is_empty() {
            return Err(LedgerError::InvalidKey(key.to_string()));
        }

        Ok(())
    }

    fn next_tx(&mut self) -> (TxId, Timestamp) {
        self.seq += 1;

        let digest = Sha256::digest(self.seq.to_be_bytes());
        let mut id = String::with_capacity(64);
        for byte in digest {
            let _ = write!(id, "{byte:02x}");
        }

        let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        let timestamp = Timestamp::new(
            i64::try_from(now.as_secs()).unwrap_or(i64::MAX),
            now.subsec_nanos(),
        );

        (TxId::new(id), timestamp)
    }

    // Apply one op under an already allocated transaction.
    fn apply(&mut self, op: BatchOp, tx_id: &TxId, timestamp: Timestamp) {
        let (key, value) = match op {
            BatchOp::Put { key, value } => {
                self.state.insert(key.clone(), value.clone());
                (key, Some(value))
            }
            BatchOp::Delete { key } => {
                if self.state.remove(&key).is_none() {
                    return;
                }
                (key, None)
            }
        };

        // Index entries are not versioned records; keep the log to primary keys.
        if KeyCodec::is_composite(&key) {
            return;
        }

        self.log.entry(key).or_default().push(HistoryRecord {
            tx_id: tx_id.clone(),
            timestamp,
            is_delete: value.is_none(),
            value,
        });
    }

    fn commit(&mut self, ops: Vec<BatchOp>) {
        let (tx_id, timestamp) = self.next_tx();
        for op in ops {
            self.apply(op, &tx_id, timestamp);
        }
    }
}

impl Ledger for MemoryLedger {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        self.trip(FailPoint::Get)?;
        Self::check_key(key)?;

        Ok(self.state.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), LedgerError> {
        self.trip(FailPoint::Put)?;
        Self::check_key(key)?;

        self.commit(vec![BatchOp::Put {
            key: key.to_string(),
            value: value.to_vec(),
        }]);

        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), LedgerError> {
        self.trip(FailPoint::Delete)?;
        Self::check_key(key)?;

        self.commit(vec![BatchOp::Delete {
            key: key.to_string(),
        }]);

        Ok(())
    }

    fn scan_range(&self, start: &str, end: &str) -> Result<KvCursor<'_>, LedgerError> {
        self.trip(FailPoint::Scan)?;

        let lower = if start.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Included(start)
        };
        let upper = if end.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(end)
        };

        // an inverted range is empty rather than an error
        if !start.is_empty() && !end.is_empty() && start >= end {
            return Ok(self.cursor(std::iter::empty()));
        }

        let items = self
            .state
            .range::<str, _>((lower, upper))
            .filter(|(key, _)| !KeyCodec::is_composite(key))
            .map(|(key, value)| (key.clone(), value.clone()));

        Ok(self.cursor(items))
    }

    fn scan_prefix(&self, prefix: &str) -> Result<KvCursor<'_>, LedgerError> {
        self.trip(FailPoint::Scan)?;

        let owned = prefix.to_string();
        let items = self
            .state
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(owned.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()));

        Ok(self.cursor(items))
    }

    fn supports_predicate_query(&self) -> bool {
        self.rich_queries
    }

    fn query_predicate(&self, filter: &Filter) -> Result<KvCursor<'_>, LedgerError> {
        if !self.rich_queries {
            return Err(LedgerError::Unsupported("predicate queries"));
        }
        self.trip(FailPoint::Scan)?;

        let mut rows: Vec<(String, serde_json::Value, Vec<u8>)> = self
            .state
            .iter()
            .filter(|(key, _)| !KeyCodec::is_composite(key))
            .filter_map(|(key, value)| {
                let doc: serde_json::Value = serde_json::from_slice(value).ok()?;
                filter
                    .matches(&doc)
                    .then(|| (key.clone(), doc, value.clone()))
            })
            .collect();

        // stable sort keeps key order among ties
        if filter.has_sort() {
            rows.sort_by(|a, b| filter.compare(&a.1, &b.1));
        }
        if let Some(limit) = filter.limit() {
            rows.truncate(limit);
        }

        Ok(self.cursor(rows.into_iter().map(|(key, _, value)| (key, value))))
    }

    fn history(&self, key: &str) -> Result<HistoryCursor<'_>, LedgerError> {
        self.trip(FailPoint::History)?;
        Self::check_key(key)?;

        let entries = self.log.get(key).into_iter().flatten().cloned();

        Ok(self.cursor(entries))
    }

    fn write_batch(&mut self, batch: WriteBatch) -> Result<(), LedgerError> {
        self.trip(FailPoint::WriteBatch)?;
        for op in &batch {
            Self::check_key(op.key())?;
        }

        // validated up front, so the batch applies whole or not at all
        self.commit(batch.into_iter().collect());

        Ok(())
    }
}
