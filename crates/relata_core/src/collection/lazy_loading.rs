use super::change_caching::ChangeCachingCollectionData;
use super::CollectionData;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::RelationEndPointDefinition;
use crate::object::{ClassId, DomainObject, ObjectId};
use crate::persistence::PersistenceStrategy;
use crate::types::TransactionId;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Collection data of a collection end point, fetched on first mutation or
/// explicit load.
///
/// Reads before loading fail with `CollectionNotLoaded`; the owning end
/// point loads before it reads. Mutations load implicitly.
pub struct LazyLoadingCollectionData {
    end_point: RelationEndPointId,
    definition: Arc<RelationEndPointDefinition>,
    hierarchy: TransactionId,
    loader: Rc<dyn PersistenceStrategy>,
    loaded: Option<ChangeCachingCollectionData>,
    version_base: u64,
}

impl LazyLoadingCollectionData {
    /// Creates unloaded data that will be fetched through `loader`.
    pub fn unloaded(
        end_point: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
        hierarchy: TransactionId,
        loader: Rc<dyn PersistenceStrategy>,
    ) -> Self {
        Self {
            end_point,
            definition,
            hierarchy,
            loader,
            loaded: None,
            version_base: 0,
        }
    }

    /// Creates data known to be complete with the given contents, used for
    /// new objects.
    pub fn complete(
        end_point: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
        hierarchy: TransactionId,
        loader: Rc<dyn PersistenceStrategy>,
        items: Vec<DomainObject>,
    ) -> Self {
        let mut data = Self::unloaded(end_point, definition, hierarchy, loader);
        data.loaded = Some(ChangeCachingCollectionData::new(items));
        data
    }

    /// Returns the owning end point.
    #[must_use]
    pub fn end_point(&self) -> &RelationEndPointId {
        &self.end_point
    }

    /// Returns true once contents are available.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Fetches contents if not loaded yet.
    pub fn ensure_loaded(&mut self) -> CoreResult<&mut ChangeCachingCollectionData> {
        if self.loaded.is_none() {
            let ids = self
                .loader
                .load_related(&self.definition, self.end_point.object_id())?;
            tracing::trace!(end_point = %self.end_point, count = ids.len(), "collection loaded");
            let items = ids
                .into_iter()
                .map(|id| DomainObject::new(id, self.hierarchy))
                .collect();
            let mut data = ChangeCachingCollectionData::new(items);
            data.set_version(self.version_base);
            self.loaded = Some(data);
        }
        self.loaded_mut()
    }

    /// Returns loaded contents or `CollectionNotLoaded`.
    pub fn loaded(&self) -> CoreResult<&ChangeCachingCollectionData> {
        self.loaded
            .as_ref()
            .ok_or_else(|| CoreError::CollectionNotLoaded {
                end_point: self.end_point.clone(),
            })
    }

    /// Mutable access to loaded contents.
    pub fn loaded_mut(&mut self) -> CoreResult<&mut ChangeCachingCollectionData> {
        let end_point = &self.end_point;
        self.loaded
            .as_mut()
            .ok_or_else(|| CoreError::CollectionNotLoaded {
                end_point: end_point.clone(),
            })
    }

    /// Drops loaded contents so the next access fetches them again.
    pub fn unload(&mut self) {
        if let Some(data) = self.loaded.take() {
            self.version_base = data
                .version()
                .unwrap_or_default()
                .wrapping_add(1);
        }
    }
}

impl CollectionData for LazyLoadingCollectionData {
    fn version(&self) -> CoreResult<u64> {
        self.loaded()?.version()
    }

    fn count(&self) -> CoreResult<usize> {
        self.loaded()?.count()
    }

    fn get(&self, index: usize) -> CoreResult<Option<DomainObject>> {
        self.loaded()?.get(index)
    }

    fn index_of(&self, id: &ObjectId) -> CoreResult<Option<usize>> {
        self.loaded()?.index_of(id)
    }

    fn contains(&self, id: &ObjectId) -> CoreResult<bool> {
        self.loaded()?.contains(id)
    }

    fn get_by_id(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
        self.loaded()?.get_by_id(id)
    }

    fn to_vec(&self) -> CoreResult<Vec<DomainObject>> {
        self.loaded()?.to_vec()
    }

    fn required_class(&self) -> Option<&ClassId> {
        Some(self.definition.opposite_class())
    }

    fn associated_end_point(&self) -> Option<&RelationEndPointId> {
        Some(&self.end_point)
    }

    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.ensure_loaded()?.insert(index, object)
    }

    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool> {
        self.ensure_loaded()?.remove_id(id)
    }

    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.ensure_loaded()?.replace(index, object)
    }

    fn clear(&mut self) -> CoreResult<()> {
        self.ensure_loaded()?.clear()
    }
}

impl fmt::Debug for LazyLoadingCollectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoadingCollectionData")
            .field("end_point", &self.end_point)
            .field("loaded", &self.loaded)
            .finish_non_exhaustive()
    }
}
