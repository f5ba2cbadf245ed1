use super::CollectionData;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::object::{ClassId, DomainObject, ObjectId};

/// Outermost layer: rejects out-of-range indices, duplicate IDs and objects
/// of another transaction hierarchy that share an ID with a member.
#[derive(Debug)]
pub struct ArgumentCheckingCollectionData<D> {
    inner: D,
}

impl<D: CollectionData> ArgumentCheckingCollectionData<D> {
    /// Wraps `inner`.
    pub fn new(inner: D) -> Self {
        Self { inner }
    }

    /// Returns the wrapped layer.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    fn ensure_not_member(&self, object: &DomainObject) -> CoreResult<()> {
        if self.inner.contains(object.id())? {
            return Err(CoreError::invalid_argument(format!(
                "collection already contains {}",
                object.id()
            )));
        }
        Ok(())
    }
}

impl<D: CollectionData> CollectionData for ArgumentCheckingCollectionData<D> {
    delegate_reads!();

    fn required_class(&self) -> Option<&ClassId> {
        self.inner.required_class()
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        let count = self.inner.count()?;
        if index > count {
            return Err(CoreError::invalid_argument(format!(
                "insert index {index} out of range 0..={count}"
            )));
        }
        self.ensure_not_member(&object)?;
        self.inner.insert(index, object)
    }

    fn remove(&mut self, object: &DomainObject) -> CoreResult<bool> {
        match self.inner.get_by_id(object.id())? {
            Some(member) if member != *object => Err(CoreError::ClientTransactionsDiffer {
                id: object.id().clone(),
                owner: object.hierarchy(),
                current: member.hierarchy(),
            }),
            Some(_) => self.inner.remove(object),
            None => Ok(false),
        }
    }

    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool> {
        self.inner.remove_id(id)
    }

    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        let count = self.inner.count()?;
        if index >= count {
            return Err(CoreError::invalid_argument(format!(
                "replace index {index} out of range 0..{count}"
            )));
        }
        match self.inner.index_of(object.id())? {
            Some(existing) if existing == index => Ok(()),
            Some(_) => Err(CoreError::invalid_argument(format!(
                "collection already contains {}",
                object.id()
            ))),
            None => self.inner.replace(index, object),
        }
    }

    fn clear(&mut self) -> CoreResult<()> {
        self.inner.clear()
    }
}
