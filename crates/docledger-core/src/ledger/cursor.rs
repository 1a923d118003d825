use crate::ledger::{HistoryRecord, LedgerError};
use std::fmt;

/// Key/value pair yielded by ledger scans.
pub type KvPair = (String, Vec<u8>);

pub type KvCursor<'a> = Cursor<'a, KvPair>;
pub type HistoryCursor<'a> = Cursor<'a, HistoryRecord>;

type Release<'a> = Box<dyn FnOnce() + 'a>;

///
/// Cursor
///
/// Forward-only, non-restartable ledger iterator.
///
/// The release hook runs exactly once: when the sequence is exhausted, when
/// an item fails, on `close`, or on drop. Nothing is yielded after release.
///

pub struct Cursor<'a, T> {
    inner: Box<dyn Iterator<Item = Result<T, LedgerError>> + 'a>,
    release: Option<Release<'a>>,
}

impl<'a, T> Cursor<'a, T> {
    pub fn new(inner: impl Iterator<Item = Result<T, LedgerError>> + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            release: Some(Box::new(|| {})),
        }
    }

    /// Cursor with a hook run once the ledger-side iterator is released.
    pub fn with_release(
        inner: impl Iterator<Item = Result<T, LedgerError>> + 'a,
        release: impl FnOnce() + 'a,
    ) -> Self {
        Self {
            inner: Box::new(inner),
            release: Some(Box::new(release)),
        }
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.release.is_some()
    }

    /// Release the ledger iterator without draining it.
    pub fn close(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl<T> Iterator for Cursor<'_, T> {
    type Item = Result<T, LedgerError>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.is_open() {
            return None;
        }

        match self.inner.next() {
            Some(Ok(item)) => Some(Ok(item)),
            Some(Err(err)) => {
                self.release_now();
                Some(Err(err))
            }
            None => {
                self.release_now();
                None
            }
        }
    }
}

impl<T> Drop for Cursor<'_, T> {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl<T> fmt::Debug for Cursor<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counting(released: &Cell<u32>, items: Vec<Result<u32, LedgerError>>) -> Cursor<'_, u32> {
        Cursor::with_release(items.into_iter(), move || released.set(released.get() + 1))
    }

    #[test]
    fn drained_cursor_releases_once() {
        let released = Cell::new(0);
        let mut cursor = counting(&released, vec![Ok(1), Ok(2)]);

        assert_eq!(cursor.by_ref().map(Result::unwrap).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(released.get(), 1);
        assert!(cursor.next().is_none());
        drop(cursor);
        assert_eq!(released.get(), 1);
    }

    #[test]
    fn error_releases_and_stops_iteration() {
        let released = Cell::new(0);
        let mut cursor = counting(
            &released,
            vec![Ok(1), Err(LedgerError::Backend("boom".into())), Ok(3)],
        );

        assert!(matches!(cursor.next(), Some(Ok(1))));
        assert!(matches!(cursor.next(), Some(Err(_))));
        assert_eq!(released.get(), 1);
        assert!(cursor.next().is_none());
    }

    #[test]
    fn early_drop_and_close_release() {
        let released = Cell::new(0);

        let mut cursor = counting(&released, vec![Ok(1), Ok(2)]);
        let _ = cursor.next();
        drop(cursor);
        assert_eq!(released.get(), 1);

        counting(&released, vec![Ok(1)]).close();
        assert_eq!(released.get(), 2);
    }
}
