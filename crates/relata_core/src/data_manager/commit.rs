//! Commit, rollback and sub-transaction merge.

use super::DataManager;
use crate::data::{DataContainer, ObjectState};
use crate::endpoint::{RelationEndPoint, RelationEndPointId};
use crate::error::{CoreError, CoreResult};
use crate::object::{DomainObject, ObjectId};
use crate::persistence::{
    EndPointData, EndPointSnapshot, LoadedObject, PersistBatch, PersistEntry, PersistState,
    PersistedObject,
};
use crate::transaction::EventDispatcher;
use crate::types::Timestamp;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

impl DataManager {
    /// Checks that `objects` have their mandatory relations set.
    ///
    /// Deleted objects are skipped.
    pub(crate) fn validate_mandatory_relations(
        &mut self,
        objects: &[DomainObject],
        events: &mut EventDispatcher,
    ) -> CoreResult<()> {
        for object in objects {
            let Some(container) = self.containers.get(object.id()) else {
                continue;
            };
            if container.is_deleted() {
                continue;
            }
            let class = Arc::clone(container.class());
            for definition in class.end_points().iter().filter(|d| d.is_mandatory()) {
                let end_point = RelationEndPointId::new(object.id().clone(), definition.property_name());
                let empty = if definition.is_collection() {
                    self.collection_items(&end_point, events)?.is_empty()
                } else {
                    self.related_id(&end_point, events)?.is_none()
                };
                if empty {
                    return Err(CoreError::MandatoryRelationNotSet { end_point });
                }
            }
        }
        Ok(())
    }

    fn snapshot_end_points(&self, container: &DataContainer) -> Vec<EndPointSnapshot> {
        let mut snapshots = Vec::new();
        for definition in container.class().end_points() {
            if !definition.is_virtual() {
                continue;
            }
            let id = RelationEndPointId::new(container.id().clone(), definition.property_name());
            let Some(end_point) = self.end_points.get(&id) else {
                continue;
            };
            if !end_point.is_loaded() || !end_point.has_changed(container) {
                continue;
            }
            let data = match end_point {
                RelationEndPoint::Object(e) => e.opposite_id(container).ok().map(EndPointData::Object),
                RelationEndPoint::Collection(e) => e.current_ids().ok().map(EndPointData::Collection),
            };
            if let Some(data) = data {
                snapshots.push(EndPointSnapshot { end_point: id, data });
            }
        }
        snapshots
    }

    /// Builds the commit batch for `objects`.
    pub(crate) fn persist_batch(&self, objects: &[DomainObject]) -> PersistBatch {
        let entries = objects
            .iter()
            .filter_map(|object| self.containers.get(object.id()))
            .map(|container| PersistEntry {
                id: container.id().clone(),
                state: match container.state() {
                    ObjectState::New => PersistState::New,
                    ObjectState::Deleted => PersistState::Deleted,
                    ObjectState::Changed => PersistState::Changed,
                    _ => PersistState::Unchanged,
                },
                timestamp: container.timestamp(),
                values: container.current_values(),
                marked_as_changed: container.is_marked_changed(),
                end_points: self.snapshot_end_points(container),
            })
            .collect();
        PersistBatch { entries }
    }

    /// Persists `objects` and, if that succeeds, makes every current value
    /// and relation the new original state.
    pub(crate) fn commit(&mut self, objects: &[DomainObject]) -> CoreResult<()> {
        let batch = self.persist_batch(objects);
        let persisted = self.strategy.persist(&batch)?;
        let timestamps: HashMap<ObjectId, Option<Timestamp>> =
            persisted.into_iter().map(|p| (p.id, p.timestamp)).collect();

        for end_point in self.end_points.values_mut() {
            end_point.commit();
        }
        let ids: Vec<ObjectId> = self.order.clone();
        for id in &ids {
            let Some(container) = self.containers.get_mut(id) else {
                continue;
            };
            if let Some(Some(timestamp)) = timestamps.get(id) {
                container.set_timestamp(Some(*timestamp));
            }
            container.commit()?;
            if container.is_discarded() {
                self.unregister(id);
            }
        }
        debug!(tx = %self.transaction_id, objects = batch.len(), "data manager committed");
        Ok(())
    }

    /// Restores the original state. New objects are discarded.
    pub(crate) fn rollback(&mut self) -> CoreResult<()> {
        let swappable = self.end_points.values().all(|e| match e {
            RelationEndPoint::Collection(c) => c.can_roll_back(),
            RelationEndPoint::Object(_) => true,
        });
        if !swappable {
            return Err(CoreError::reentrancy(
                "a collection is in use and cannot be rolled back",
            ));
        }
        let transaction = self.transaction.clone();
        let transaction_id = self.transaction_id;
        for end_point in self.end_points.values_mut() {
            end_point.rollback(&transaction, transaction_id)?;
        }
        let ids: Vec<ObjectId> = self.order.clone();
        for id in &ids {
            let Some(container) = self.containers.get_mut(id) else {
                continue;
            };
            container.rollback()?;
            if container.is_discarded() {
                self.unregister(id);
            }
        }
        debug!(tx = %self.transaction_id, "data manager rolled back");
        Ok(())
    }

    /// Current state of an object for a sub-transaction to load.
    pub(crate) fn load_for_sub_transaction(
        &mut self,
        id: &ObjectId,
        events: &mut EventDispatcher,
    ) -> CoreResult<LoadedObject> {
        let container = self.get_or_load(id, events)?;
        if container.is_deleted() {
            return Err(CoreError::ObjectDiscarded { id: id.clone() });
        }
        Ok(LoadedObject {
            id: id.clone(),
            timestamp: container.timestamp(),
            values: container.current_values(),
        })
    }

    /// Current opposite IDs of a virtual end point for a sub-transaction.
    pub(crate) fn related_for_sub_transaction(
        &mut self,
        id: &RelationEndPointId,
        events: &mut EventDispatcher,
    ) -> CoreResult<Vec<ObjectId>> {
        self.ensure_end_point_loaded(id, events)?;
        if matches!(self.end_point_ref(id)?, RelationEndPoint::Collection(_)) {
            self.collection_end_point(id)?.current_ids()
        } else {
            Ok(self.related_id(id, events)?.into_iter().collect())
        }
    }

    /// Takes over the state a sub-transaction commits.
    ///
    /// Every entry is validated before anything is applied, so a rejected
    /// batch leaves this data manager untouched.
    pub(crate) fn merge_from_sub_transaction(
        &mut self,
        batch: &PersistBatch,
        events: &mut EventDispatcher,
    ) -> CoreResult<Vec<PersistedObject>> {
        self.prepare_merge(batch, events)?;

        for entry in &batch.entries {
            match entry.state {
                PersistState::New => {
                    if let Ok(class) = self.mapping.class(entry.id.class_id()) {
                        let mut container = DataContainer::new_object(entry.id.clone(), Arc::clone(class));
                        container.assign_from_sub_transaction(&entry.values, false);
                        self.register(container, true);
                    }
                }
                _ => {
                    if let Some(container) = self.containers.get_mut(&entry.id) {
                        container.assign_from_sub_transaction(&entry.values, entry.marked_as_changed);
                    }
                }
            }
        }
        for entry in &batch.entries {
            for snapshot in &entry.end_points {
                self.assign_end_point(snapshot);
            }
        }
        for entry in batch.entries.iter().filter(|e| e.state == PersistState::Deleted) {
            let Some(container) = self.containers.get_mut(&entry.id) else {
                continue;
            };
            if container.is_new() {
                container.discard();
                self.unregister(&entry.id);
            } else {
                container.mark_deleted();
            }
        }

        debug!(tx = %self.transaction_id, objects = batch.len(), "sub-transaction merged");
        Ok(batch
            .entries
            .iter()
            .map(|entry| PersistedObject {
                id: entry.id.clone(),
                timestamp: self.containers.get(&entry.id).and_then(DataContainer::timestamp),
            })
            .collect())
    }

    fn prepare_merge(&mut self, batch: &PersistBatch, events: &mut EventDispatcher) -> CoreResult<()> {
        for entry in &batch.entries {
            let class = Arc::clone(self.mapping.class(entry.id.class_id())?);
            for (name, value) in &entry.values {
                class
                    .property(name)
                    .ok_or_else(|| CoreError::unknown_property(class.id(), name))?
                    .validate(value)?;
            }
            for snapshot in &entry.end_points {
                if snapshot.end_point.object_id() != &entry.id
                    || class.end_point(snapshot.end_point.property()).is_none()
                {
                    return Err(CoreError::mapping(format!(
                        "end point {} does not belong to {}",
                        snapshot.end_point, entry.id
                    )));
                }
            }
            if entry.state == PersistState::New {
                if self.containers.contains_key(&entry.id) || self.invalid.contains(&entry.id) {
                    return Err(CoreError::invalid_operation(format!(
                        "object {} is already known to transaction {}",
                        entry.id, self.transaction_id
                    )));
                }
                continue;
            }
            self.get_or_load_live(&entry.id, events)?;
            for snapshot in &entry.end_points {
                self.ensure_end_point_loaded(&snapshot.end_point, events)?;
            }
        }
        Ok(())
    }

    fn assign_end_point(&mut self, snapshot: &EndPointSnapshot) {
        let hierarchy = self.hierarchy;
        match (self.end_points.get_mut(&snapshot.end_point), &snapshot.data) {
            (Some(RelationEndPoint::Object(end_point)), EndPointData::Object(opposite)) => {
                end_point.assign_from_sub_transaction(opposite.clone());
            }
            (Some(RelationEndPoint::Collection(end_point)), EndPointData::Collection(ids)) => {
                end_point.assign_from_sub_transaction(
                    ids.iter()
                        .map(|id| DomainObject::new(id.clone(), hierarchy))
                        .collect(),
                );
            }
            _ => {}
        }
    }
}
