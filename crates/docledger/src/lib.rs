//! ## Crate layout
//! - `core`: record models, the ledger boundary, record store, index,
//!   queries, history, metrics and the operation table.
//! - `error`: public error type with a stable class + origin taxonomy.
//! - `logging`: `tracing` subscriber bootstrap driven by config.
//! - `service`: config-file driven entry point over the reference ledger.
//!
//! The `prelude` module mirrors the surface most embedders need.

pub use docledger_core as core;

pub mod error;
pub mod logging;
pub mod service;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use error::Error;
pub use service::Service;

///
/// Prelude
///

pub mod prelude {
    pub use crate::{
        core::{
            config::Config,
            db::{Db, query::Filter, record::Record},
            dispatch::{Alias, Dispatcher, Operation},
            ledger::{Ledger, memory::MemoryLedger},
            model::{FieldKind, FieldModel, IndexModel, Preset, RecordModel, SumInvariant},
            value::Value,
        },
        error::Error,
        service::Service,
    };
}
