use std::sync::{Arc, PoisonError, RwLock};

use hiverag_index::IndexedCorpus;

/// Read-mostly handle to the active corpus.
///
/// Readers take an `Arc` snapshot and search it without holding the lock;
/// a rebuild swaps in a fully built corpus under the write lock, so no reader
/// can observe a partially appended batch.
#[derive(Clone)]
pub struct SharedCorpus {
    inner: Arc<RwLock<Arc<IndexedCorpus>>>,
}

impl SharedCorpus {
    pub fn new(corpus: IndexedCorpus) -> Self {
        Self { inner: Arc::new(RwLock::new(Arc::new(corpus))) }
    }

    pub fn snapshot(&self) -> Arc<IndexedCorpus> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a consistent corpus.
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&*guard)
    }

    pub fn replace(&self, corpus: IndexedCorpus) -> Arc<IndexedCorpus> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(corpus))
    }
}
