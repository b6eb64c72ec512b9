//! A deny index that can be extended while other threads query it.

use parking_lot::RwLock;

use crate::codec::ToChunkKey;
use crate::index::{DenyIndex, IndexStats};
use crate::query::Verdict;
use crate::Result;

/// [`DenyIndex`] behind a single-writer / multi-reader lock.
///
/// Queries take the read lock and return owned strings, so no guard
/// escapes. Indexing takes the write lock for the whole batch.
#[derive(Debug, Default)]
pub struct SharedDenyIndex {
    inner: RwLock<DenyIndex>,
}

impl SharedDenyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index deny rule lines; see [`DenyIndex::index_lines`].
    pub fn index_lines<I, S>(&self, lines: I) -> IndexStats
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.write().index_lines(lines)
    }

    pub fn reset(&self) {
        self.inner.write().reset();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn blocked_exactly<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Option<String>> {
        Ok(self.inner.read().blocked_exactly(cidr)?.map(str::to_string))
    }

    pub fn blocked_in_superset<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Option<String>> {
        Ok(self
            .inner
            .read()
            .blocked_in_superset(cidr)?
            .map(str::to_string))
    }

    pub fn partially_blocked<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Option<String>> {
        self.inner.read().partially_blocked(cidr)
    }

    pub fn check<Q: ToChunkKey + ?Sized>(&self, cidr: &Q) -> Result<Verdict> {
        self.inner.read().check(cidr)
    }

    /// Take the index out, e.g. once indexing is finished.
    pub fn into_inner(self) -> DenyIndex {
        self.inner.into_inner()
    }
}

impl From<DenyIndex> for SharedDenyIndex {
    fn from(index: DenyIndex) -> Self {
        Self {
            inner: RwLock::new(index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_shared_queries() {
        let shared = SharedDenyIndex::new();
        shared.index_lines(["deny 66.249.66.160/16;"]);

        assert_eq!(
            shared.blocked_exactly("66.249.0.0/16").unwrap(),
            Some("66.249.66.160/16".to_string())
        );
        assert_eq!(
            shared.blocked_in_superset("66.249.1.2").unwrap(),
            Some("66.249.66.160/16".to_string())
        );
        assert_eq!(shared.partially_blocked("10.0.0.0/8").unwrap(), None);
        assert_eq!(shared.len(), 1);

        shared.reset();
        assert!(shared.is_empty());
        assert_eq!(shared.check("66.249.1.2").unwrap(), Verdict::Clear);
    }

    #[test]
    fn test_concurrent_index_and_query() {
        let shared = Arc::new(SharedDenyIndex::new());

        let writers: Vec<_> = (0..4u8)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    shared.index_lines([format!("deny 10.{}.0.0/16;", i)]);
                })
            })
            .collect();
        let readers: Vec<_> = (0..4u8)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let query = format!("10.{}.1.1", i);
                    shared.check(&query).unwrap();
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }

        for i in 0..4u8 {
            let query = format!("10.{}.1.1", i);
            assert!(shared.check(&query).unwrap().is_blocked());
        }
    }

    #[test]
    fn test_from_and_into_inner() {
        let mut index = DenyIndex::new();
        index.insert("10.0.0.0/8").unwrap();
        let shared = SharedDenyIndex::from(index);
        assert_eq!(shared.into_inner().len(), 1);
    }
}
