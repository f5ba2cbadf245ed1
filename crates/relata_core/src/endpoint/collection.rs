use super::RelationEndPointId;
use crate::collection::{ChangeDetection, CollectionData, LazyLoadingCollectionData, ObjectCollection};
use crate::error::{CoreError, CoreResult};
use crate::mapping::RelationEndPointDefinition;
use crate::object::{DomainObject, ObjectId};
use crate::transaction::WeakTransaction;
use crate::types::TransactionId;
use std::sync::Arc;

/// An end point referring to an ordered collection of objects.
///
/// Contents live in lazily loaded, change-caching data. The user-facing
/// [`ObjectCollection`] handle is created on first request; when it is
/// replaced by another handle the previous one is kept as the original so
/// rollback can restore it.
#[derive(Debug)]
pub struct CollectionEndPoint {
    id: RelationEndPointId,
    definition: Arc<RelationEndPointDefinition>,
    data: LazyLoadingCollectionData,
    detection: ChangeDetection,
    touched: bool,
    collection: Option<ObjectCollection>,
    original_collection: Option<ObjectCollection>,
}

impl CollectionEndPoint {
    pub(crate) fn new(
        id: RelationEndPointId,
        definition: Arc<RelationEndPointDefinition>,
        data: LazyLoadingCollectionData,
        detection: ChangeDetection,
    ) -> Self {
        Self {
            id,
            definition,
            data,
            detection,
            touched: false,
            collection: None,
            original_collection: None,
        }
    }

    /// Returns the end point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        &self.id
    }

    /// Returns the definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<RelationEndPointDefinition> {
        &self.definition
    }

    /// Returns true if the contents are loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.data.is_loaded()
    }

    /// Loads contents if needed.
    pub fn ensure_loaded(&mut self) -> CoreResult<()> {
        self.data.ensure_loaded().map(|_| ())
    }

    /// Read access to the contents. Fails with `CollectionNotLoaded` before loading.
    #[must_use]
    pub fn data(&self) -> &dyn CollectionData {
        &self.data
    }

    /// Current member IDs.
    pub fn current_ids(&self) -> CoreResult<Vec<ObjectId>> {
        Ok(self.data.loaded()?.current_ids().to_vec())
    }

    /// Contents as of the last load or commit.
    pub fn original_items(&self) -> CoreResult<Vec<DomainObject>> {
        Ok(self.data.loaded()?.original_data().to_vec())
    }

    fn collection_replaced(&self) -> bool {
        match (&self.collection, &self.original_collection) {
            (Some(current), Some(original)) => !current.ptr_eq(original),
            _ => false,
        }
    }

    /// Returns true if contents or the collection handle changed.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.collection_replaced()
            || self
                .data
                .loaded()
                .map_or(false, |d| d.has_changed(self.detection))
    }

    /// Returns true if the end point was modified since the last commit.
    #[must_use]
    pub fn has_been_touched(&self) -> bool {
        self.touched
    }

    /// Returns the associated handle, creating it with `create` on first use.
    pub(crate) fn collection_handle(
        &mut self,
        create: impl FnOnce() -> ObjectCollection,
    ) -> ObjectCollection {
        if let Some(collection) = &self.collection {
            return collection.clone();
        }
        let collection = create();
        self.collection = Some(collection.clone());
        self.original_collection = Some(collection.clone());
        collection
    }

    /// Returns the associated handle if one was handed out.
    #[must_use]
    pub fn current_collection(&self) -> Option<&ObjectCollection> {
        self.collection.as_ref()
    }

    /// Installs `collection` as the associated handle.
    pub(crate) fn replace_collection(&mut self, collection: ObjectCollection) {
        if self.original_collection.is_none() {
            self.original_collection = self.collection.clone();
        }
        self.collection = Some(collection);
        self.touched = true;
    }

    pub(crate) fn insert(&mut self, index: usize, item: DomainObject) -> CoreResult<()> {
        self.data.insert(index, item)?;
        self.touched = true;
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &ObjectId) -> CoreResult<bool> {
        let removed = self.data.remove_id(id)?;
        self.touched = true;
        Ok(removed)
    }

    pub(crate) fn replace(&mut self, index: usize, item: DomainObject) -> CoreResult<()> {
        self.data.replace(index, item)?;
        self.touched = true;
        Ok(())
    }

    pub(crate) fn set_items(&mut self, items: Vec<DomainObject>) -> CoreResult<()> {
        self.data.ensure_loaded()?.replace_contents(items);
        self.touched = true;
        Ok(())
    }

    /// Copies contents committed by a sub-transaction. The end point must be loaded.
    pub(crate) fn assign_from_sub_transaction(&mut self, items: Vec<DomainObject>) {
        if let Ok(data) = self.data.loaded_mut() {
            data.replace_contents(items);
            self.touched = true;
        }
    }

    /// Returns true if rollback can swap collection handles right now.
    pub(crate) fn can_roll_back(&self) -> bool {
        !self.collection_replaced()
            || [&self.collection, &self.original_collection]
                .into_iter()
                .flatten()
                .all(ObjectCollection::can_transform)
    }

    pub(crate) fn commit(&mut self) {
        if let Ok(data) = self.data.loaded_mut() {
            data.commit();
        }
        self.original_collection = self.collection.clone();
        self.touched = false;
    }

    pub(crate) fn rollback(
        &mut self,
        transaction: &WeakTransaction,
        transaction_id: TransactionId,
    ) -> CoreResult<()> {
        if self.collection_replaced() {
            if let (Some(current), Some(original)) = (&self.collection, &self.original_collection) {
                let detached = self.data.to_vec().unwrap_or_default();
                current.transform_to_stand_alone(detached)?;
                original.transform_to_associated(
                    self.id.clone(),
                    transaction.clone(),
                    transaction_id,
                )?;
            }
            self.collection = self.original_collection.clone();
        }
        if let Ok(data) = self.data.loaded_mut() {
            data.rollback();
        }
        self.touched = false;
        Ok(())
    }

    /// Drops loaded contents. Fails if they have unsaved changes.
    pub(crate) fn unload(&mut self) -> CoreResult<()> {
        if self.has_changed() {
            return Err(CoreError::invalid_operation(format!(
                "collection end point {} has unsaved changes",
                self.id
            )));
        }
        self.data.unload();
        Ok(())
    }
}
