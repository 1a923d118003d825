//! Record layer over a ledger: key codec, record codec, the record store
//! with its secondary index, queries and history.

pub mod history;
pub mod index;
pub mod key;
pub mod query;
pub mod record;
pub mod store;
pub(crate) mod write;

use crate::{
    db::{
        history::HistoryReader, index::IndexMaintainer, query::QueryEngine, store::RecordStore,
    },
    ledger::Ledger,
    model::RecordModel,
};

///
/// Db
///
/// Handle binding one ledger to one record model for the length of an
/// invocation. Components borrow the ledger through it; writes need the
/// mutable borrow, reads share it.
///

pub struct Db<'a, L: Ledger + ?Sized> {
    ledger: &'a mut L,
    model: &'a RecordModel,
}

impl<'a, L: Ledger + ?Sized> Db<'a, L> {
    pub const fn new(ledger: &'a mut L, model: &'a RecordModel) -> Self {
        Self { ledger, model }
    }

    #[must_use]
    pub const fn model(&self) -> &'a RecordModel {
        self.model
    }

    pub fn records(&mut self) -> RecordStore<'_, L> {
        RecordStore::new(&mut *self.ledger, self.model)
    }

    #[must_use]
    pub fn query(&self) -> QueryEngine<'_, L> {
        QueryEngine::new(&*self.ledger, self.model)
    }

    #[must_use]
    pub fn history(&self) -> HistoryReader<'_, L> {
        HistoryReader::new(&*self.ledger, self.model)
    }

    #[must_use]
    pub const fn indexes(&self) -> IndexMaintainer<'a> {
        IndexMaintainer::new(self.model)
    }

    #[must_use]
    pub fn ledger(&self) -> &L {
        &*self.ledger
    }
}
