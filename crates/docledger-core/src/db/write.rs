use crate::{
    error::InternalError,
    ledger::{Ledger, WriteBatch},
};

///
/// WriteUnit
///
/// Stages every ledger mutation of one logical operation.
/// Nothing reaches the ledger until `commit`, which hands the whole batch
/// over in one `write_batch` call. Dropping an uncommitted unit discards it.
///

pub(crate) struct WriteUnit {
    label: &'static str,
    batch: WriteBatch,
    index_inserts: u64,
    index_removes: u64,
    committed: bool,
}

impl WriteUnit {
    pub(crate) const fn new(label: &'static str) -> Self {
        Self {
            label,
            batch: WriteBatch::new(),
            index_inserts: 0,
            index_removes: 0,
            committed: false,
        }
    }

    pub(crate) fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.batch.put(key, value);
    }

    pub(crate) fn delete(&mut self, key: impl Into<String>) {
        self.batch.delete(key);
    }

    pub(crate) fn put_index(&mut self, key: String, marker: &[u8]) {
        self.index_inserts += 1;
        self.batch.put(key, marker.to_vec());
    }

    pub(crate) fn delete_index(&mut self, key: String) {
        self.index_removes += 1;
        self.batch.delete(key);
    }

    /// Index entries staged so far as `(inserts, removes)`.
    pub(crate) const fn index_delta(&self) -> (u64, u64) {
        (self.index_inserts, self.index_removes)
    }

    #[cfg(test)]
    pub(crate) fn batch(&self) -> &WriteBatch {
        &self.batch
    }

    /// Hand the staged batch to the ledger. Returns the number of ops.
    pub(crate) fn commit<L: Ledger + ?Sized>(mut self, ledger: &mut L) -> Result<usize, InternalError> {
        self.committed = true;

        let batch = std::mem::take(&mut self.batch);
        let ops = batch.len();
        if ops == 0 {
            return Ok(0);
        }

        ledger.write_batch(batch).inspect_err(|err| {
            tracing::debug!(unit = self.label, ops, error = %err, "write unit rejected by ledger");
        })?;

        Ok(ops)
    }
}

impl Drop for WriteUnit {
    fn drop(&mut self) {
        if !self.committed && !self.batch.is_empty() {
            tracing::debug!(
                unit = self.label,
                ops = self.batch.len(),
                "write unit discarded without commit"
            );
        }
    }
}
