//! Shared fixtures for unit tests.

use crate::{
    db::{Db, record::Record},
    ledger::memory::MemoryLedger,
    model::{FieldKind, FieldModel, IndexModel, Preset, RecordModel},
};

pub(crate) fn args(raw: &[&str]) -> Vec<String> {
    raw.iter().map(ToString::to_string).collect()
}

/// Student row whose four sub-scores always sum to 536.5.
pub(crate) fn student_args(code: &str, total: f64) -> Vec<String> {
    let total = total.to_string();

    args(&[
        code,
        "女",
        "京籍",
        "首都师范大学附属密云中学",
        "28101",
        &total,
        "106.5",
        "100",
        "97",
        "233",
    ])
}

pub(crate) fn marble(model: &RecordModel, name: &str, color: &str, owner: &str) -> Record {
    Record::from_args(model, &args(&[name, color, "35", owner])).expect("marble fixture is valid")
}

/// Item model indexed on an integer field.
pub(crate) fn sized_model() -> RecordModel {
    RecordModel::new(
        "item",
        "id",
        vec![
            FieldModel::new("id", FieldKind::Text),
            FieldModel::new("size", FieldKind::Int),
            FieldModel::new("owner", FieldKind::Text),
        ],
    )
    .with_index(IndexModel::new("size~id", &["size"]))
}

/// Item ledger seeded through the record store.
pub(crate) fn sized_ledger(rows: &[(&str, &str)]) -> (MemoryLedger, RecordModel) {
    let model = sized_model();
    let mut ledger = MemoryLedger::new();

    {
        let mut db = Db::new(&mut ledger, &model);
        for (id, size) in rows {
            let record = Record::from_args(&model, &args(&[id, size, "tom"]))
                .expect("item fixture is valid");
            db.records()
                .create(record)
                .expect("fixture create should succeed");
        }
    }

    (ledger, model)
}

/// Marble ledger seeded through the record store.
pub(crate) fn marble_ledger(rows: &[(&str, &str, &str)]) -> (MemoryLedger, RecordModel) {
    let model = Preset::Marble.model();
    let mut ledger = MemoryLedger::with_rich_queries();

    {
        let mut db = Db::new(&mut ledger, &model);
        for (name, color, owner) in rows {
            db.records()
                .create(marble(&model, name, color, owner))
                .expect("fixture create should succeed");
        }
    }

    (ledger, model)
}
