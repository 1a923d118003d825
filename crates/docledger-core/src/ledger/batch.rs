use derive_more::IntoIterator;

///
/// BatchOp
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BatchOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl BatchOp {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

///
/// WriteBatch
///
/// Ordered ledger mutations applied as one logical operation.
/// Ops apply in insertion order; a later op on the same key wins.
///

#[derive(Clone, Debug, Default, Eq, IntoIterator, PartialEq)]
pub struct WriteBatch {
    #[into_iterator(owned, ref)]
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    #[must_use]
    pub const fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn put(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value,
        });
    }

    pub fn delete(&mut self, key: impl Into<String>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}
