use crate::{
    db::{
        key::KeyCodec,
        record::Record,
        write::WriteUnit,
    },
    error::{ErrorOrigin, InternalError},
    ledger::Ledger,
    model::{FieldKind, RecordModel},
};
use serde::Serialize;
use std::collections::BTreeSet;

/// Presence-only payload stored under every index entry.
pub const INDEX_MARKER: &[u8] = &[0x00];

///
/// IndexMaintainer
///
/// Keeps the model's secondary index in step with record writes.
/// Entries are staged into the same `WriteUnit` as the record write they
/// shadow; every method is a no-op for models without an index.
///

pub struct IndexMaintainer<'a> {
    model: &'a RecordModel,
}

impl<'a> IndexMaintainer<'a> {
    #[must_use]
    pub const fn new(model: &'a RecordModel) -> Self {
        Self { model }
    }

    /// Entry key for `record`: index name, indexed values, then primary key.
    pub fn entry_key(&self, record: &Record) -> Result<Option<String>, InternalError> {
        let Some(index) = &self.model.index else {
            return Ok(None);
        };

        let mut parts = record.index_parts(self.model).ok_or_else(|| {
            InternalError::invalid_argument(
                ErrorOrigin::Index,
                format!("record lacks a value for index {index}"),
            )
        })?;
        parts.push(record.primary_key(self.model)?.to_string());

        Ok(Some(KeyCodec::compose(&index.name, &parts)?))
    }

    /// Render raw prefix values the way entry keys render them, parsing each
    /// one with the declared kind of the index field it lines up with.
    pub fn prefix_parts<S: AsRef<str>>(&self, parts: &[S]) -> Result<Vec<String>, InternalError> {
        let Some(index) = &self.model.index else {
            return Ok(parts.iter().map(|p| p.as_ref().to_string()).collect());
        };

        parts
            .iter()
            .zip(&index.fields)
            .map(|(raw, field)| {
                let kind = self.model.field(field).map_or(FieldKind::Text, |f| f.kind);
                kind.parse(raw.as_ref())
                    .map(|value| value.to_key_part())
                    .map_err(|err| {
                        InternalError::invalid_argument(
                            ErrorOrigin::Index,
                            format!("index field '{field}': {err}"),
                        )
                    })
            })
            .collect()
    }

    pub(crate) fn remove_entry(
        &self,
        unit: &mut WriteUnit,
        record: &Record,
    ) -> Result<(), InternalError> {
        if let Some(key) = self.entry_key(record)? {
            unit.delete_index(key);
        }

        Ok(())
    }

    /// Replace the entry of `old` with `new_key` if it moved.
    /// The stale entry is removed before the new one is added.
    pub(crate) fn replace_entry(
        &self,
        unit: &mut WriteUnit,
        old: &Record,
        new_key: Option<String>,
    ) -> Result<(), InternalError> {
        let old_key = self.entry_key(old)?;

        if old_key != new_key {
            if let Some(key) = old_key {
                unit.delete_index(key);
            }
            if let Some(key) = new_key {
                unit.put_index(key, INDEX_MARKER);
            }
        }

        Ok(())
    }

    /// Compare the stored index against the live records of this kind.
    pub fn audit<L: Ledger + ?Sized>(&self, ledger: &L) -> Result<IndexAudit, InternalError> {
        let mut audit = IndexAudit::default();
        let Some(index) = &self.model.index else {
            return Ok(audit);
        };

        let prefix = KeyCodec::compose_partial::<&str>(&index.name, &[])?;
        let mut seen = BTreeSet::new();

        for item in ledger.scan_prefix(&prefix)? {
            let (key, _) = item?;
            audit.entries += 1;

            let Some(pk) = primary_key_of(&key, index.fields.len()) else {
                audit.dangling.push(key);
                continue;
            };
            let Some(bytes) = ledger.get(&pk)? else {
                audit.dangling.push(key);
                continue;
            };

            let record = Record::decode(self.model, &pk, &bytes)?;
            if self.entry_key(&record)?.as_deref() == Some(key.as_str()) {
                seen.insert(key);
            } else {
                audit.stale.push(key);
            }
        }

        for item in ledger.scan_range("", "")? {
            let (pk, bytes) = item?;
            if Record::peek_kind(&bytes).as_deref() != Some(self.model.kind.as_str()) {
                continue;
            }
            audit.records += 1;

            let record = Record::decode(self.model, &pk, &bytes)?;
            match self.entry_key(&record)? {
                Some(key) if seen.contains(&key) => {}
                _ => audit.missing.push(pk),
            }
        }

        if !audit.is_clean() {
            tracing::warn!(
                index = %index,
                dangling = audit.dangling.len(),
                stale = audit.stale.len(),
                missing = audit.missing.len(),
                "index audit found inconsistencies"
            );
        }

        Ok(audit)
    }
}

// Primary key of a well-formed entry with `width` indexed attributes.
fn primary_key_of(key: &str, width: usize) -> Option<String> {
    let (_, mut parts) = KeyCodec::split(key).ok()?;
    if parts.len() != width + 1 {
        return None;
    }

    parts.pop()
}

///
/// IndexAudit
/// Outcome of comparing index entries with live records.
///

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct IndexAudit {
    pub entries: usize,
    pub records: usize,
    /// Entries with no live record behind them.
    pub dangling: Vec<String>,
    /// Entries whose record no longer carries the indexed values.
    pub stale: Vec<String>,
    /// Primary keys of live records without an entry.
    pub missing: Vec<String>,
}

impl IndexAudit {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dangling.is_empty() && self.stale.is_empty() && self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::memory::MemoryLedger,
        model::Preset,
        test_support::{marble, marble_ledger},
    };

    #[test]
    fn entry_key_appends_primary_key() {
        let model = Preset::Marble.model();
        let key = IndexMaintainer::new(&model)
            .entry_key(&marble(&model, "m1", "red", "tom"))
            .unwrap();

        assert_eq!(key.as_deref(), Some("\u{0}color~name\u{0}red\u{0}m1\u{0}"));
    }

    #[test]
    fn unindexed_models_stage_nothing() {
        let model = Preset::Student.model();
        let record = Record::from_args(&model, &crate::test_support::student_args("s1", 536.5))
            .unwrap();
        let maintainer = IndexMaintainer::new(&model);
        let mut unit = WriteUnit::new("test");

        assert_eq!(maintainer.entry_key(&record).unwrap(), None);
        maintainer.replace_entry(&mut unit, &record, None).unwrap();
        maintainer.remove_entry(&mut unit, &record).unwrap();
        assert!(unit.batch().is_empty());
    }

    #[test]
    fn replace_entry_removes_before_adding() {
        let model = Preset::Marble.model();
        let mut unit = WriteUnit::new("test");

        let maintainer = IndexMaintainer::new(&model);
        let new_key = maintainer
            .entry_key(&marble(&model, "m1", "blue", "tom"))
            .unwrap();

        maintainer
            .replace_entry(&mut unit, &marble(&model, "m1", "red", "tom"), new_key)
            .unwrap();

        let ops = unit.batch().ops();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], crate::ledger::BatchOp::Delete { key } if key.contains("red")));
        assert!(matches!(&ops[1], crate::ledger::BatchOp::Put { key, .. } if key.contains("blue")));
    }

    #[test]
    fn audit_reports_dangling_stale_and_missing() {
        let (mut ledger, model) = marble_ledger(&[("m1", "red", "tom"), ("m2", "blue", "tom")]);
        assert!(IndexMaintainer::new(&model).audit(&ledger).unwrap().is_clean());

        // entry for a record that never existed
        ledger.put("\u{0}color~name\u{0}red\u{0}ghost\u{0}", INDEX_MARKER).unwrap();
        // m2 rewritten behind the index's back
        ledger
            .put("m2", br#"{"docType":"marble","name":"m2","color":"green","size":1,"owner":"t"}"#)
            .unwrap();

        let audit = IndexMaintainer::new(&model).audit(&ledger).unwrap();
        assert_eq!(audit.entries, 3);
        assert_eq!(audit.records, 2);
        assert_eq!(audit.dangling.len(), 1);
        assert_eq!(audit.stale.len(), 1);
        assert_eq!(audit.missing, vec!["m2".to_string()]);
        assert_eq!(ledger.open_cursors(), 0);
    }

    #[test]
    fn audit_of_empty_ledger_is_clean() {
        let model = Preset::Marble.model();

        assert!(IndexMaintainer::new(&model).audit(&MemoryLedger::new()).unwrap().is_clean());
    }
}
