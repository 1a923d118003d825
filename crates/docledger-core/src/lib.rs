//! Core runtime for docledger: record models, the ledger boundary, the record
//! store with its secondary index, queries, history, and the operation table.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod ledger;
pub mod model;
pub mod obs;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// CONSTANTS
///

/// Maximum number of attribute fields an index may declare.
///
/// The primary key is appended to every index entry on top of these.
pub const MAX_INDEX_FIELDS: usize = 4;

/// JSON property carrying the record kind discriminator.
pub const KIND_FIELD: &str = "docType";

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, executors or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{Db, record::Record},
        ledger::{Ledger, memory::MemoryLedger},
        model::{FieldKind, FieldModel, IndexModel, RecordModel, SumInvariant, WriteMode},
        value::Value,
    };
}
