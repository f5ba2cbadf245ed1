//! A storage provider that fails on demand and counts its calls.

use parking_lot::Mutex;
use relata_core::{
    ClassId, CoreError, CoreResult, InMemoryStorage, ObjectId, ObjectRecord, PersistOutcome,
    PersistRecord, RelationQuery, StorageProvider,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps an [`InMemoryStorage`] and injects failures.
///
/// Rejected batches are never forwarded, so the wrapped store is left
/// untouched.
#[derive(Debug)]
pub struct FailingStorage {
    inner: Arc<InMemoryStorage>,
    rejected_classes: Mutex<HashSet<ClassId>>,
    fail_loads: AtomicBool,
    loads: AtomicUsize,
    related_loads: AtomicUsize,
    persists: AtomicUsize,
}

impl FailingStorage {
    /// Wraps `inner`.
    pub fn new(inner: Arc<InMemoryStorage>) -> Self {
        Self {
            inner,
            rejected_classes: Mutex::new(HashSet::new()),
            fail_loads: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
            related_loads: AtomicUsize::new(0),
            persists: AtomicUsize::new(0),
        }
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &Arc<InMemoryStorage> {
        &self.inner
    }

    /// Rejects every later batch that writes an object of `class`.
    pub fn reject_class(&self, class: impl Into<ClassId>) {
        self.rejected_classes.lock().insert(class.into());
    }

    /// Accepts every batch again.
    pub fn accept_all(&self) {
        self.rejected_classes.lock().clear();
    }

    /// Makes loads fail with a storage error.
    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Number of single-object loads so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Number of relation queries so far.
    pub fn related_load_count(&self) -> usize {
        self.related_loads.load(Ordering::SeqCst)
    }

    /// Number of persist calls so far, rejected ones included.
    pub fn persist_count(&self) -> usize {
        self.persists.load(Ordering::SeqCst)
    }

    fn check_loads(&self) -> CoreResult<()> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(CoreError::storage("injected load failure"));
        }
        Ok(())
    }
}

impl StorageProvider for FailingStorage {
    fn load_object(&self, id: &ObjectId) -> CoreResult<Option<ObjectRecord>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.check_loads()?;
        self.inner.load_object(id)
    }

    fn load_related(&self, query: &RelationQuery) -> CoreResult<Vec<ObjectId>> {
        self.related_loads.fetch_add(1, Ordering::SeqCst);
        self.check_loads()?;
        self.inner.load_related(query)
    }

    fn persist(&self, records: &[PersistRecord]) -> CoreResult<Vec<PersistOutcome>> {
        self.persists.fetch_add(1, Ordering::SeqCst);
        let rejected: Vec<PersistOutcome> = {
            let classes = self.rejected_classes.lock();
            records
                .iter()
                .filter(|r| classes.contains(r.id.class_id()))
                .map(|r| PersistOutcome::Failed {
                    id: r.id.clone(),
                    reason: format!("class {} is rejected", r.id.class_id()),
                })
                .collect()
        };
        if !rejected.is_empty() {
            tracing::debug!(rejected = rejected.len(), "injected persist failure");
            return Ok(rejected);
        }
        self.inner.persist(records)
    }
}
