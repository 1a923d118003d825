use crate::{
    db::{
        index::{INDEX_MARKER, IndexMaintainer},
        key::{CompositeKey, KeyCodec},
        record::Record,
        write::WriteUnit,
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    ledger::Ledger,
    model::{RecordModel, WriteMode},
    obs::sink::{self, MetricsEvent, OpKind, Span},
};
use thiserror::Error as ThisError;

///
/// RecordStore
///
/// CRUD over the ledger for one record model.
/// Every operation validates and reads first, then stages the record write
/// and its index writes into one `WriteUnit` committed as a single batch.
///

pub struct RecordStore<'a, L: Ledger + ?Sized> {
    ledger: &'a mut L,
    model: &'a RecordModel,
}

impl<'a, L: Ledger + ?Sized> RecordStore<'a, L> {
    pub const fn new(ledger: &'a mut L, model: &'a RecordModel) -> Self {
        Self { ledger, model }
    }

    const fn indexes(&self) -> IndexMaintainer<'a> {
        IndexMaintainer::new(self.model)
    }

    /// Insert a new record; its key must not be live.
    pub fn create(&mut self, record: Record) -> Result<(), InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Create, &model.kind);
        self.check_kind(&record)?;
        record.check_invariants(self.model, WriteMode::Create)?;

        let key = record.primary_key(self.model)?.to_string();
        let entry = self.indexes().entry_key(&record)?;
        if self.ledger.get(&key)?.is_some() {
            sink::record(MetricsEvent::UniqueViolation {
                kind: &self.model.kind,
            });
            return Err(StoreError::AlreadyExists(key).into());
        }

        let mut unit = WriteUnit::new("create");
        unit.put(key.clone(), record.encode()?);
        if let Some(entry) = entry {
            unit.put_index(entry, INDEX_MARKER);
        }
        self.commit(unit)?;

        tracing::debug!(kind = %self.model.kind, key, "record created");
        span.succeed(1);

        Ok(())
    }

    /// Load and decode the record stored under `key`.
    pub fn read(&self, key: &str) -> Result<Record, InternalError> {
        self.read_encoded(key).map(|(record, _)| record)
    }

    /// Load a record together with its stored bytes.
    pub fn read_encoded(&self, key: &str) -> Result<(Record, Vec<u8>), InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Read, &model.kind);
        let found = self.load(key)?;
        span.succeed(1);

        Ok(found)
    }

    /// Replace every field of a live record.
    pub fn update(&mut self, record: Record) -> Result<(), InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Update, &model.kind);
        self.check_kind(&record)?;
        record.check_invariants(self.model, WriteMode::Update)?;

        let key = record.primary_key(self.model)?.to_string();
        let entry = self.indexes().entry_key(&record)?;
        let (old, _) = self.load(&key)?;

        let mut unit = WriteUnit::new("update");
        unit.put(key.clone(), record.encode()?);
        self.indexes().replace_entry(&mut unit, &old, entry)?;
        self.commit(unit)?;

        tracing::debug!(kind = %self.model.kind, key, "record updated");
        span.succeed(1);

        Ok(())
    }

    /// Remove a live record and its index entry. Returns the removed record.
    pub fn delete(&mut self, key: &str) -> Result<Record, InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Delete, &model.kind);
        let (old, _) = self.load(key)?;

        let mut unit = WriteUnit::new("delete");
        unit.delete(key);
        self.indexes().remove_entry(&mut unit, &old)?;
        self.commit(unit)?;

        tracing::debug!(kind = %self.model.kind, key, "record deleted");
        span.succeed(1);

        Ok(old)
    }

    /// Set `field` to `raw` on every record whose index entry starts with
    /// `prefix`. Returns the number of records updated.
    ///
    /// Only the ordered index scan feeds this write; the ledger's commit
    /// check revalidates it, which a predicate query would not allow.
    pub fn update_by_index(
        &mut self,
        prefix: &[String],
        field: &str,
        raw: &str,
    ) -> Result<usize, InternalError> {
        let model = self.model;
        let mut span = Span::new(OpKind::Update, &model.kind);
        let index = model
            .index
            .as_ref()
            .ok_or_else(|| StoreError::NoIndex(model.kind.clone()))?;
        if prefix.len() > index.fields.len() {
            return Err(InternalError::invalid_argument(
                ErrorOrigin::Store,
                format!("index {index} takes at most {} prefix parts", index.fields.len()),
            ));
        }

        // drain the scan before staging any write
        let parts = self.indexes().prefix_parts(prefix)?;
        let scan_prefix = KeyCodec::compose_partial(&index.name, &parts)?;
        let mut keys = Vec::new();
        for item in self.ledger.scan_prefix(&scan_prefix)? {
            let (entry, _) = item?;
            let parsed = CompositeKey::parse(&entry)?;
            let pk = parsed.parts.last().cloned().ok_or_else(|| {
                InternalError::corruption(
                    ErrorOrigin::Index,
                    format!("index entry {parsed} has no primary key"),
                )
            })?;
            keys.push(pk);
        }
        sink::record(MetricsEvent::RowsScanned {
            kind: &self.model.kind,
            rows: keys.len() as u64,
        });

        let mut unit = WriteUnit::new("update_by_index");
        for key in &keys {
            let (old, _) = self.load(key).map_err(|err| {
                if err.is_not_found() {
                    InternalError::corruption(
                        ErrorOrigin::Index,
                        format!("index entry points at missing record '{key}'"),
                    )
                } else {
                    err
                }
            })?;

            let mut new = old.clone();
            new.set(self.model, field, raw)?;
            new.check_invariants(self.model, WriteMode::Update)?;

            let entry = self.indexes().entry_key(&new)?;
            unit.put(key.clone(), new.encode()?);
            self.indexes().replace_entry(&mut unit, &old, entry)?;
        }
        self.commit(unit)?;

        tracing::debug!(
            kind = %model.kind,
            field,
            updated = keys.len(),
            "records updated through index"
        );
        span.succeed(keys.len() as u64);

        Ok(keys.len())
    }

    fn load(&self, key: &str) -> Result<(Record, Vec<u8>), InternalError> {
        KeyCodec::check_primary(key)?;
        let bytes = self
            .ledger
            .get(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let record = Record::decode(self.model, key, &bytes)?;

        Ok((record, bytes))
    }

    fn check_kind(&self, record: &Record) -> Result<(), StoreError> {
        if record.kind() != self.model.kind {
            return Err(StoreError::KindMismatch {
                expected: self.model.kind.clone(),
                found: record.kind().to_string(),
            });
        }

        Ok(())
    }

    fn commit(&mut self, unit: WriteUnit) -> Result<(), InternalError> {
        let (inserts, removes) = unit.index_delta();
        unit.commit(&mut *self.ledger)?;

        if inserts > 0 || removes > 0 {
            sink::record(MetricsEvent::IndexDelta {
                kind: &self.model.kind,
                inserts,
                removes,
            });
        }

        Ok(())
    }
}

///
/// StoreError
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    #[error("record '{0}' already exists")]
    AlreadyExists(String),

    #[error("record '{0}' does not exist")]
    NotFound(String),

    #[error("record kind '{found}' does not match model '{expected}'")]
    KindMismatch { expected: String, found: String },

    #[error("record kind '{0}' declares no index")]
    NoIndex(String),
}

impl StoreError {
    pub(crate) const fn class(&self) -> ErrorClass {
        match self {
            Self::AlreadyExists(_) => ErrorClass::AlreadyExists,
            Self::NotFound(_) => ErrorClass::NotFound,
            Self::KindMismatch { .. } | Self::NoIndex(_) => ErrorClass::InvalidArgument,
        }
    }
}

impl From<StoreError> for InternalError {
    fn from(err: StoreError) -> Self {
        Self::new(err.class(), ErrorOrigin::Store, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::index::IndexAudit,
        ledger::memory::{FailPoint, MemoryLedger},
        model::Preset,
        test_support::{args, marble, marble_ledger, sized_ledger, student_args},
        value::Value,
    };

    fn audit(ledger: &MemoryLedger, model: &RecordModel) -> IndexAudit {
        IndexMaintainer::new(model).audit(ledger).unwrap()
    }

    #[test]
    fn create_then_read_round_trips() {
        let model = Preset::Student.model();
        let mut ledger = MemoryLedger::new();
        let record = Record::from_args(&model, &student_args("51114214", 536.5)).unwrap();

        let mut store = RecordStore::new(&mut ledger, &model);
        store.create(record.clone()).unwrap();

        assert_eq!(store.read("51114214").unwrap(), record);
    }

    #[test]
    fn duplicate_create_is_rejected_and_writes_nothing() {
        let (mut ledger, model) = marble_ledger(&[("m1", "red", "tom")]);
        let before = ledger.committed();

        let err = RecordStore::new(&mut ledger, &model)
            .create(marble(&model, "m1", "blue", "jerry"))
            .unwrap_err();

        assert_eq!(err.class, ErrorClass::AlreadyExists);
        assert_eq!(ledger.committed(), before);
    }

    #[test]
    fn bad_index_part_is_rejected_before_the_existence_read() {
        let (mut ledger, model) = marble_ledger(&[("m1", "red", "tom")]);
        let before = ledger.committed();
        let bad = Record::from_args(&model, &args(&["m1", "re\u{0}d", "35", "tom"])).unwrap();

        let mut store = RecordStore::new(&mut ledger, &model);
        let created = store.create(bad.clone()).unwrap_err();
        let updated = store.update(bad).unwrap_err();

        assert_eq!(created.class, ErrorClass::InvalidKeyPart);
        assert_eq!(updated.class, ErrorClass::InvalidKeyPart);
        assert_eq!(ledger.committed(), before);
    }

    #[test]
    fn missing_records_are_not_found() {
        let model = Preset::Marble.model();
        let mut ledger = MemoryLedger::new();
        let mut store = RecordStore::new(&mut ledger, &model);

        assert!(store.read("ghost").unwrap_err().is_not_found());
        assert!(store.delete("ghost").unwrap_err().is_not_found());
        assert!(
            store
                .update(marble(&model, "ghost", "red", "tom"))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn update_moves_index_entry() {
        let (mut ledger, model) = marble_ledger(&[("m1", "red", "tom")]);

        RecordStore::new(&mut ledger, &model)
            .update(marble(&model, "m1", "blue", "tom"))
            .unwrap();

        let audit = audit(&ledger, &model);
        assert!(audit.is_clean());
        assert_eq!(audit.entries, 1);
        assert!(ledger.get("\u{0}color~name\u{0}blue\u{0}m1\u{0}").unwrap().is_some());
    }

    #[test]
    fn delete_drops_record_and_index_entry() {
        let (mut ledger, model) = marble_ledger(&[("m1", "red", "tom")]);

        let removed = RecordStore::new(&mut ledger, &model).delete("m1").unwrap();

        assert_eq!(removed.get("color"), Some(&Value::from("red")));
        assert!(ledger.is_empty());
    }

    #[test]
    fn student_update_enforces_score_total() {
        let model = Preset::Student.model();
        let mut ledger = MemoryLedger::new();
        let mut store = RecordStore::new(&mut ledger, &model);

        // create does not check the total
        store
            .create(Record::from_args(&model, &student_args("s1", 999.0)).unwrap())
            .unwrap();

        let err = store
            .update(Record::from_args(&model, &student_args("s1", 500.0)).unwrap())
            .unwrap_err();
        assert_eq!(err.class, ErrorClass::ValidationError);

        store
            .update(Record::from_args(&model, &student_args("s1", 536.5)).unwrap())
            .unwrap();
    }

    #[test]
    fn failed_commit_leaves_record_and_index_absent() {
        let model = Preset::Marble.model();
        let mut ledger = MemoryLedger::new();
        ledger.fail_next(FailPoint::WriteBatch);

        let err = RecordStore::new(&mut ledger, &model)
            .create(marble(&model, "m1", "red", "tom"))
            .unwrap_err();

        assert_eq!(err.class, ErrorClass::UpstreamFailure);
        assert!(ledger.is_empty());
    }

    #[test]
    fn update_by_index_transfers_matching_records() {
        let (mut ledger, model) = marble_ledger(&[
            ("m1", "red", "tom"),
            ("m2", "blue", "tom"),
            ("m3", "red", "ann"),
        ]);
        let before = ledger.committed();

        let updated = RecordStore::new(&mut ledger, &model)
            .update_by_index(&["red".to_string()], "owner", "jerry")
            .unwrap();

        assert_eq!(updated, 2);
        assert_eq!(ledger.committed(), before + 1);
        assert_eq!(ledger.open_cursors(), 0);

        let store = RecordStore::new(&mut ledger, &model);
        assert_eq!(store.read("m1").unwrap().get("owner"), Some(&Value::from("jerry")));
        assert_eq!(store.read("m2").unwrap().get("owner"), Some(&Value::from("tom")));
        assert_eq!(store.read("m3").unwrap().get("owner"), Some(&Value::from("jerry")));
    }

    #[test]
    fn update_by_index_can_rewrite_the_indexed_field() {
        let (mut ledger, model) = marble_ledger(&[("m1", "red", "tom"), ("m2", "red", "ann")]);

        RecordStore::new(&mut ledger, &model)
            .update_by_index(&["red".to_string()], "color", "green")
            .unwrap();

        let audit = audit(&ledger, &model);
        assert!(audit.is_clean());
        assert_eq!(audit.entries, 2);
    }

    #[test]
    fn update_by_index_parses_prefix_per_field_kind() {
        let (mut ledger, model) = sized_ledger(&[("a", "35"), ("b", "36")]);

        let updated = RecordStore::new(&mut ledger, &model)
            .update_by_index(&["035".to_string()], "owner", "jerry")
            .unwrap();

        assert_eq!(updated, 1);
        let store = RecordStore::new(&mut ledger, &model);
        assert_eq!(store.read("a").unwrap().get("owner"), Some(&Value::from("jerry")));
        assert_eq!(store.read("b").unwrap().get("owner"), Some(&Value::from("tom")));
    }

    #[test]
    fn update_by_index_needs_an_index() {
        let model = Preset::Student.model();
        let mut ledger = MemoryLedger::new();

        let err = RecordStore::new(&mut ledger, &model)
            .update_by_index(&[], "gender", "m")
            .unwrap_err();

        assert_eq!(err.class, ErrorClass::InvalidArgument);
    }

    #[test]
    fn scan_failure_releases_cursor_and_writes_nothing() {
        let (mut ledger, model) = marble_ledger(&[("m1", "red", "tom"), ("m2", "red", "ann")]);
        let before = ledger.committed();
        ledger.fail_next(FailPoint::CursorItem { index: 1 });

        let err = RecordStore::new(&mut ledger, &model)
            .update_by_index(&["red".to_string()], "owner", "jerry")
            .unwrap_err();

        assert_eq!(err.class, ErrorClass::UpstreamFailure);
        assert_eq!(ledger.open_cursors(), 0);
        assert_eq!(ledger.committed(), before);
    }
}
