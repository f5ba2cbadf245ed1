//! Per-transaction registry of data containers and relation end points.

mod commit;

use crate::collection::{
    ChangeDetection, CollectionData, ElementType, LazyLoadingCollectionData, ObjectCollection,
};
use crate::command::Mutation;
use crate::data::{DataContainer, ObjectState};
use crate::endpoint::{CollectionEndPoint, ObjectEndPoint, RelationEndPoint, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::mapping::{MappingConfiguration, RelationEndPointDefinition};
use crate::object::{DomainObject, ObjectId};
use crate::persistence::PersistenceStrategy;
use crate::transaction::{EventDispatcher, WeakTransaction};
use crate::types::TransactionId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, trace};

/// Holds every object and end point a transaction has seen.
///
/// Objects are loaded through the transaction's persistence strategy on
/// first access. Objects that were discarded in this transaction are
/// remembered as invalid and never reloaded.
pub struct DataManager {
    transaction_id: TransactionId,
    hierarchy: TransactionId,
    mapping: Arc<MappingConfiguration>,
    strategy: Rc<dyn PersistenceStrategy>,
    detection: ChangeDetection,
    transaction: WeakTransaction,
    containers: HashMap<ObjectId, DataContainer>,
    order: Vec<ObjectId>,
    end_points: HashMap<RelationEndPointId, RelationEndPoint>,
    invalid: HashSet<ObjectId>,
}

impl DataManager {
    pub(crate) fn new(
        transaction_id: TransactionId,
        hierarchy: TransactionId,
        mapping: Arc<MappingConfiguration>,
        strategy: Rc<dyn PersistenceStrategy>,
        detection: ChangeDetection,
        transaction: WeakTransaction,
    ) -> Self {
        Self {
            transaction_id,
            hierarchy,
            mapping,
            strategy,
            detection,
            transaction,
            containers: HashMap::new(),
            order: Vec::new(),
            end_points: HashMap::new(),
            invalid: HashSet::new(),
        }
    }

    /// Returns the owning transaction's ID.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.transaction_id
    }

    /// Returns the root transaction ID of the hierarchy.
    #[must_use]
    pub fn hierarchy(&self) -> TransactionId {
        self.hierarchy
    }

    /// Returns the mapping.
    #[must_use]
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        &self.mapping
    }

    /// Returns the container of a registered object.
    #[must_use]
    pub fn container(&self, id: &ObjectId) -> Option<&DataContainer> {
        self.containers.get(id)
    }

    /// Returns a registered end point.
    #[must_use]
    pub fn end_point(&self, id: &RelationEndPointId) -> Option<&RelationEndPoint> {
        self.end_points.get(id)
    }

    /// Returns true if the object was discarded in this transaction.
    #[must_use]
    pub fn is_invalid(&self, id: &ObjectId) -> bool {
        self.invalid.contains(id)
    }

    /// Registered object IDs in registration order.
    #[must_use]
    pub fn loaded_ids(&self) -> &[ObjectId] {
        &self.order
    }

    /// State of a registered or invalid object.
    ///
    /// An unchanged object whose relation end points changed reports
    /// `Changed`.
    #[must_use]
    pub fn object_state(&self, id: &ObjectId) -> Option<ObjectState> {
        if self.invalid.contains(id) {
            return Some(ObjectState::Discarded);
        }
        let container = self.containers.get(id)?;
        match container.state() {
            ObjectState::Unchanged if self.has_changed_end_points(container) => Some(ObjectState::Changed),
            state => Some(state),
        }
    }

    fn has_changed_end_points(&self, container: &DataContainer) -> bool {
        container.class().end_points().iter().any(|definition| {
            let id = RelationEndPointId::new(container.id().clone(), definition.property_name());
            self.end_points
                .get(&id)
                .map_or(false, |end_point| end_point.has_changed(container))
        })
    }

    /// New, changed and deleted objects in registration order.
    #[must_use]
    pub fn changed_objects(&self) -> Vec<DomainObject> {
        self.order
            .iter()
            .filter(|id| self.object_state(id).map_or(false, ObjectState::is_pending))
            .map(|id| self.domain_object(id.clone()))
            .collect()
    }

    pub(crate) fn domain_object(&self, id: ObjectId) -> DomainObject {
        DomainObject::new(id, self.hierarchy)
    }

    /// Fails with `ClientTransactionsDiffer` unless `object` belongs to this
    /// hierarchy.
    pub(crate) fn check_hierarchy(&self, object: &DomainObject) -> CoreResult<()> {
        if object.hierarchy() != self.hierarchy {
            return Err(CoreError::ClientTransactionsDiffer {
                id: object.id().clone(),
                owner: object.hierarchy(),
                current: self.hierarchy,
            });
        }
        Ok(())
    }

    /// Returns the container of `id`, loading it first if needed.
    pub(crate) fn get_or_load(
        &mut self,
        id: &ObjectId,
        events: &mut EventDispatcher,
    ) -> CoreResult<&DataContainer> {
        if self.invalid.contains(id) {
            return Err(CoreError::ObjectDiscarded { id: id.clone() });
        }
        if !self.containers.contains_key(id) {
            self.load(id, events)?;
        }
        self.containers
            .get(id)
            .ok_or_else(|| CoreError::ObjectNotFound { id: id.clone() })
    }

    /// Like [`get_or_load`](Self::get_or_load) but fails for deleted objects.
    pub(crate) fn get_or_load_live(
        &mut self,
        id: &ObjectId,
        events: &mut EventDispatcher,
    ) -> CoreResult<&DataContainer> {
        let container = self.get_or_load(id, events)?;
        if container.is_deleted() {
            return Err(CoreError::ObjectDeleted { id: id.clone() });
        }
        Ok(container)
    }

    /// Loads and registers `id`.
    ///
    /// The container is registered only once its values are complete; a
    /// half-loaded container is never handed out. Observers that reach back
    /// into the transaction while the load runs fail with `Reentrancy`
    /// because the transaction state is borrowed for the whole load.
    fn load(&mut self, id: &ObjectId, events: &mut EventDispatcher) -> CoreResult<()> {
        let result = self.load_registered(id, events);
        if let Err(CoreError::ObjectDiscarded { .. }) = &result {
            self.invalid.insert(id.clone());
        }
        result
    }

    fn load_registered(&mut self, id: &ObjectId, events: &mut EventDispatcher) -> CoreResult<()> {
        let ids = std::slice::from_ref(id);
        events.objects_loading(self.transaction_id, ids)?;
        let class = Arc::clone(self.mapping.class(id.class_id())?);
        let loaded = self.strategy.load_object(id)?;
        let container = DataContainer::existing(id.clone(), class, loaded.timestamp, &loaded.values)?;
        self.register(container, false);
        debug!(tx = %self.transaction_id, object = %id, "object loaded");
        events.objects_loaded(self.transaction_id, ids);
        Ok(())
    }

    /// Registers the container of a newly created object.
    pub(crate) fn register_new(&mut self, container: DataContainer) {
        self.register(container, true);
    }

    fn register(&mut self, container: DataContainer, is_new: bool) {
        let id = container.id().clone();
        for definition in container.class().end_points() {
            let end_point_id = RelationEndPointId::new(id.clone(), definition.property_name());
            let end_point = self.create_end_point(end_point_id.clone(), definition, is_new);
            self.end_points.insert(end_point_id, end_point);
        }
        self.order.push(id.clone());
        self.containers.insert(id, container);
    }

    fn create_end_point(
        &self,
        id: RelationEndPointId,
        definition: &Arc<RelationEndPointDefinition>,
        is_new: bool,
    ) -> RelationEndPoint {
        let definition = Arc::clone(definition);
        if definition.is_collection() {
            let data = if is_new {
                LazyLoadingCollectionData::complete(
                    id.clone(),
                    Arc::clone(&definition),
                    self.hierarchy,
                    Rc::clone(&self.strategy),
                    Vec::new(),
                )
            } else {
                LazyLoadingCollectionData::unloaded(
                    id.clone(),
                    Arc::clone(&definition),
                    self.hierarchy,
                    Rc::clone(&self.strategy),
                )
            };
            RelationEndPoint::Collection(CollectionEndPoint::new(id, definition, data, self.detection))
        } else if !definition.is_virtual() {
            RelationEndPoint::Object(ObjectEndPoint::foreign_key(id, definition))
        } else if is_new {
            RelationEndPoint::Object(ObjectEndPoint::virtual_empty(id, definition))
        } else {
            RelationEndPoint::Object(ObjectEndPoint::virtual_unloaded(id, definition))
        }
    }

    /// Forgets an object and its end points and marks it invalid.
    fn unregister(&mut self, id: &ObjectId) {
        if let Some(container) = self.containers.remove(id) {
            for definition in container.class().end_points() {
                self.end_points
                    .remove(&RelationEndPointId::new(id.clone(), definition.property_name()));
            }
        }
        self.order.retain(|o| o != id);
        self.invalid.insert(id.clone());
        trace!(tx = %self.transaction_id, object = %id, "object unregistered");
    }

    fn end_point_ref(&self, id: &RelationEndPointId) -> CoreResult<&RelationEndPoint> {
        self.end_points.get(id).ok_or_else(|| {
            CoreError::mapping(format!(
                "class {} has no relation {}",
                id.object_id().class_id(),
                id.property()
            ))
        })
    }

    /// Returns the definition of a registered end point, loading its owner.
    pub(crate) fn end_point_definition(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<Arc<RelationEndPointDefinition>> {
        self.get_or_load(id.object_id(), events)?;
        Ok(Arc::clone(self.end_point_ref(id)?.definition()))
    }

    /// Makes sure the owner is registered and the end point's data is loaded.
    pub(crate) fn ensure_end_point_loaded(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<()> {
        self.get_or_load(id.object_id(), events)?;
        let end_point = self.end_points.get_mut(id).ok_or_else(|| {
            CoreError::mapping(format!(
                "class {} has no relation {}",
                id.object_id().class_id(),
                id.property()
            ))
        })?;
        match end_point {
            RelationEndPoint::Object(end_point) if !end_point.is_loaded() => {
                let mut related = self
                    .strategy
                    .load_related(end_point.definition(), id.object_id())?
                    .into_iter();
                let opposite = related.next();
                if related.next().is_some() {
                    return Err(CoreError::invalid_operation(format!(
                        "end point {id} is single-valued but several objects refer to it"
                    )));
                }
                end_point.mark_loaded(opposite);
                trace!(tx = %self.transaction_id, end_point = %id, "end point loaded");
            }
            RelationEndPoint::Collection(end_point) => end_point.ensure_loaded()?,
            RelationEndPoint::Object(_) => {}
        }
        Ok(())
    }

    /// Current opposite of a single-valued end point.
    pub(crate) fn related_id(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<Option<ObjectId>> {
        self.ensure_end_point_loaded(id, events)?;
        let (end_point, container) = self.object_end_point(id)?;
        end_point.opposite_id(container)
    }

    /// Opposite of a single-valued end point as of the last load or commit.
    pub(crate) fn original_related_id(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<Option<ObjectId>> {
        self.ensure_end_point_loaded(id, events)?;
        let (end_point, container) = self.object_end_point(id)?;
        end_point.original_opposite_id(container)
    }

    fn object_end_point(&self, id: &RelationEndPointId) -> CoreResult<(&ObjectEndPoint, &DataContainer)> {
        let container = self
            .containers
            .get(id.object_id())
            .ok_or_else(|| CoreError::ObjectNotFound {
                id: id.object_id().clone(),
            })?;
        match self.end_point_ref(id)? {
            RelationEndPoint::Object(end_point) => Ok((end_point, container)),
            RelationEndPoint::Collection(_) => Err(CoreError::invalid_operation(format!(
                "end point {id} is a collection"
            ))),
        }
    }

    fn collection_end_point(&self, id: &RelationEndPointId) -> CoreResult<&CollectionEndPoint> {
        match self.end_point_ref(id)? {
            RelationEndPoint::Collection(end_point) => Ok(end_point),
            RelationEndPoint::Object(_) => Err(CoreError::invalid_operation(format!(
                "end point {id} is not a collection"
            ))),
        }
    }

    pub(crate) fn collection_end_point_mut(
        &mut self,
        id: &RelationEndPointId,
    ) -> CoreResult<&mut CollectionEndPoint> {
        match self.end_points.get_mut(id) {
            Some(RelationEndPoint::Collection(end_point)) => Ok(end_point),
            Some(RelationEndPoint::Object(_)) => Err(CoreError::invalid_operation(format!(
                "end point {id} is not a collection"
            ))),
            None => Err(CoreError::mapping(format!(
                "class {} has no relation {}",
                id.object_id().class_id(),
                id.property()
            ))),
        }
    }

    /// Current members of a collection end point.
    pub(crate) fn collection_items(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<Vec<DomainObject>> {
        self.ensure_end_point_loaded(id, events)?;
        self.collection_end_point(id)?.data().to_vec()
    }

    /// Members of a collection end point as of the last load or commit.
    pub(crate) fn original_collection_items(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<Vec<DomainObject>> {
        self.ensure_end_point_loaded(id, events)?;
        self.collection_end_point(id)?.original_items()
    }

    /// Runs `f` against the loaded contents of a collection end point.
    pub(crate) fn read_collection<R>(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
        f: impl FnOnce(&dyn CollectionData) -> CoreResult<R>,
    ) -> CoreResult<R> {
        self.ensure_end_point_loaded(id, events)?;
        f(self.collection_end_point(id)?.data())
    }

    /// Returns the associated collection handle of an end point, creating it
    /// on first request. Contents are loaded lazily.
    pub(crate) fn collection_handle(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<ObjectCollection> {
        let definition = self.end_point_definition(id, events)?;
        let element_type = ElementType::new(Arc::clone(&self.mapping), definition.opposite_class().clone()).ok();
        let transaction = self.transaction.clone();
        let transaction_id = self.transaction_id;
        let end_point = self.collection_end_point_mut(id)?;
        Ok(end_point.collection_handle(|| {
            ObjectCollection::associated(id.clone(), transaction, transaction_id, element_type)
        }))
    }

    /// Returns the handle of a collection end point if one was handed out.
    pub(crate) fn existing_collection_handle(&self, id: &RelationEndPointId) -> Option<ObjectCollection> {
        self.end_points
            .get(id)
            .and_then(RelationEndPoint::as_collection)
            .and_then(CollectionEndPoint::current_collection)
            .cloned()
    }

    /// Drops the loaded contents of an unchanged collection end point.
    pub(crate) fn unload_collection(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<()> {
        self.get_or_load(id.object_id(), events)?;
        self.collection_end_point_mut(id)?.unload()?;
        debug!(tx = %self.transaction_id, end_point = %id, "collection unloaded");
        Ok(())
    }

    /// Forces `Changed` on an object.
    pub(crate) fn mark_as_changed(&mut self, id: &ObjectId, events: &mut EventDispatcher) -> CoreResult<()> {
        self.get_or_load(id, events)?;
        self.container_mut(id)?.mark_as_changed()
    }

    fn container_mut(&mut self, id: &ObjectId) -> CoreResult<&mut DataContainer> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| CoreError::ObjectNotFound { id: id.clone() })
    }

    /// Applies one planned mutation.
    pub(crate) fn apply(&mut self, mutation: &Mutation) -> CoreResult<()> {
        match mutation {
            Mutation::SetValue {
                object,
                property,
                value,
            } => self.container_mut(object)?.set_value(property, value.clone()),
            Mutation::SetRelated { end_point, value } => {
                let container = self
                    .containers
                    .get_mut(end_point.object_id())
                    .ok_or_else(|| CoreError::ObjectNotFound {
                        id: end_point.object_id().clone(),
                    })?;
                match self.end_points.get_mut(end_point) {
                    Some(RelationEndPoint::Object(e)) => e.set_opposite(container, value.clone()),
                    _ => Err(CoreError::invalid_operation(format!(
                        "end point {end_point} is not single-valued"
                    ))),
                }
            }
            Mutation::InsertItem {
                end_point,
                index,
                item,
            } => self
                .collection_end_point_mut(end_point)?
                .insert(*index, item.clone()),
            Mutation::RemoveItem { end_point, item } => self
                .collection_end_point_mut(end_point)?
                .remove(item)
                .map(|_| ()),
            Mutation::ReplaceItem {
                end_point,
                index,
                item,
            } => self
                .collection_end_point_mut(end_point)?
                .replace(*index, item.clone()),
            Mutation::SetItems { end_point, items } => self
                .collection_end_point_mut(end_point)?
                .set_items(items.clone()),
            Mutation::MarkDeleted { object } => {
                let container = self.container_mut(object)?;
                if container.is_new() {
                    container.discard();
                    self.unregister(object);
                } else {
                    container.delete()?;
                }
                Ok(())
            }
        }
    }

    /// Discards every object; used when the transaction is released.
    pub(crate) fn discard_all(&mut self) {
        for container in self.containers.values_mut() {
            container.discard();
        }
        self.invalid.extend(self.order.drain(..));
        self.containers.clear();
        self.end_points.clear();
    }
}

impl fmt::Debug for DataManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataManager")
            .field("transaction_id", &self.transaction_id)
            .field("objects", &self.containers.len())
            .field("end_points", &self.end_points.len())
            .field("invalid", &self.invalid.len())
            .finish_non_exhaustive()
    }
}
