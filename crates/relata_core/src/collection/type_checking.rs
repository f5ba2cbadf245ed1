use super::CollectionData;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::MappingConfiguration;
use crate::object::{ClassId, DomainObject, ObjectId};
use std::sync::Arc;

/// Rejects objects whose class is not assignable to the required class.
#[derive(Debug)]
pub struct TypeCheckingCollectionData<D> {
    inner: D,
    required: ClassId,
    mapping: Arc<MappingConfiguration>,
}

impl<D: CollectionData> TypeCheckingCollectionData<D> {
    /// Wraps `inner`, requiring elements assignable to `required`.
    pub fn new(inner: D, required: ClassId, mapping: Arc<MappingConfiguration>) -> Self {
        Self {
            inner,
            required,
            mapping,
        }
    }

    fn check(&self, object: &DomainObject) -> CoreResult<()> {
        if self.mapping.is_assignable(object.class_id(), &self.required) {
            Ok(())
        } else {
            Err(CoreError::invalid_argument(format!(
                "{} is not assignable to {}",
                object.id(),
                self.required
            )))
        }
    }
}

impl<D: CollectionData> CollectionData for TypeCheckingCollectionData<D> {
    delegate_reads!();

    fn required_class(&self) -> Option<&ClassId> {
        Some(&self.required)
    }

    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.check(&object)?;
        self.inner.insert(index, object)
    }

    fn remove(&mut self, object: &DomainObject) -> CoreResult<bool> {
        self.inner.remove(object)
    }

    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool> {
        self.inner.remove_id(id)
    }

    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.check(&object)?;
        self.inner.replace(index, object)
    }

    fn clear(&mut self) -> CoreResult<()> {
        self.inner.clear()
    }
}
