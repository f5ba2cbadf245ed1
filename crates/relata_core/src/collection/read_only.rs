use super::CollectionData;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::object::{ClassId, DomainObject, ObjectId};

/// Rejects every mutation. Used for original-contents views.
#[derive(Debug)]
pub struct ReadOnlyCollectionData<D> {
    inner: D,
}

impl<D: CollectionData> ReadOnlyCollectionData<D> {
    /// Wraps `inner`.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    fn rejected<T>() -> CoreResult<T> {
        Err(CoreError::invalid_operation("collection is read-only"))
    }
}

impl<D: CollectionData> CollectionData for ReadOnlyCollectionData<D> {
    delegate_reads!();

    fn required_class(&self) -> Option<&ClassId> {
        self.inner.required_class()
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn insert(&mut self, _index: usize, _object: DomainObject) -> CoreResult<()> {
        Self::rejected()
    }

    fn remove(&mut self, _object: &DomainObject) -> CoreResult<bool> {
        Self::rejected()
    }

    fn remove_id(&mut self, _id: &ObjectId) -> CoreResult<bool> {
        Self::rejected()
    }

    fn replace(&mut self, _index: usize, _object: DomainObject) -> CoreResult<()> {
        Self::rejected()
    }

    fn clear(&mut self) -> CoreResult<()> {
        Self::rejected()
    }
}
