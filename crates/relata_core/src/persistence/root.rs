use super::{LoadedObject, PersistBatch, PersistState, PersistedObject, PersistenceStrategy};
use crate::error::{CoreError, CoreResult, PersistFailure};
use crate::mapping::{MappingConfiguration, RelationEndPointDefinition};
use crate::object::ObjectId;
use crate::storage::{PersistKind, PersistOutcome, PersistRecord, RelationQuery, StorageProvider};
use std::sync::Arc;

/// Persistence strategy of a root transaction, backed by a storage provider.
#[derive(Debug, Clone)]
pub struct RootPersistenceStrategy {
    storage: Arc<dyn StorageProvider>,
    mapping: Arc<MappingConfiguration>,
}

impl RootPersistenceStrategy {
    /// Creates a strategy reading from and writing to `storage`.
    pub fn new(storage: Arc<dyn StorageProvider>, mapping: Arc<MappingConfiguration>) -> Self {
        Self { storage, mapping }
    }

    /// Returns the storage provider.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn StorageProvider> {
        &self.storage
    }
}

fn to_record(entry: &super::PersistEntry) -> Option<PersistRecord> {
    let kind = match entry.state {
        PersistState::New => PersistKind::Insert,
        PersistState::Changed => PersistKind::Update,
        PersistState::Deleted => PersistKind::Delete,
        PersistState::Unchanged => return None,
    };
    Some(PersistRecord {
        id: entry.id.clone(),
        kind,
        expected_timestamp: entry.timestamp,
        values: match kind {
            PersistKind::Delete => Vec::new(),
            _ => entry.values.clone(),
        },
    })
}

impl PersistenceStrategy for RootPersistenceStrategy {
    fn load_object(&self, id: &ObjectId) -> CoreResult<LoadedObject> {
        let record = self
            .storage
            .load_object(id)?
            .ok_or_else(|| CoreError::ObjectNotFound { id: id.clone() })?;
        Ok(LoadedObject {
            id: record.id,
            timestamp: Some(record.timestamp),
            values: record.values,
        })
    }

    fn load_related(
        &self,
        definition: &RelationEndPointDefinition,
        owner: &ObjectId,
    ) -> CoreResult<Vec<ObjectId>> {
        let foreign_key = definition.opposite_property().ok_or_else(|| {
            CoreError::mapping(format!(
                "end point {}.{} has no opposite to query",
                definition.class_id(),
                definition.property_name()
            ))
        })?;
        let query = RelationQuery {
            classes: self.mapping.derived_classes(definition.opposite_class()),
            foreign_key: foreign_key.to_string(),
            target: owner.clone(),
        };
        self.storage.load_related(&query)
    }

    fn persist(&self, batch: &PersistBatch) -> CoreResult<Vec<PersistedObject>> {
        let records: Vec<PersistRecord> = batch.entries.iter().filter_map(to_record).collect();
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let outcomes = self.storage.persist(&records)?;
        let rejected: Vec<&PersistOutcome> = outcomes.iter().filter(|o| o.is_rejected()).collect();
        if !rejected.is_empty() {
            tracing::warn!(rejected = rejected.len(), batch = records.len(), "commit batch rejected");
            if let [PersistOutcome::Conflict { id, .. }] = rejected.as_slice() {
                return Err(CoreError::ConcurrencyViolation { id: id.clone() });
            }
            let failures = rejected
                .into_iter()
                .map(|outcome| PersistFailure {
                    object: outcome.id().clone(),
                    reason: match outcome {
                        PersistOutcome::Failed { reason, .. } => reason.clone(),
                        PersistOutcome::Conflict {
                            expected, found, ..
                        } => format!(
                            "concurrency violation: expected {}, found {found}",
                            expected.map_or_else(|| "none".to_string(), |t| t.to_string())
                        ),
                        _ => String::new(),
                    },
                })
                .collect();
            return Err(CoreError::Persist { failures });
        }

        Ok(outcomes
            .into_iter()
            .map(|outcome| match outcome {
                PersistOutcome::Saved { id, timestamp } => PersistedObject {
                    id,
                    timestamp: Some(timestamp),
                },
                other => PersistedObject {
                    id: other.id().clone(),
                    timestamp: None,
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{ClassBuilder, MappingBuilder, RelationBuilder};
    use crate::object::ClassId;
    use crate::persistence::PersistEntry;
    use crate::storage::InMemoryStorage;
    use crate::types::Timestamp;
    use crate::value::Value;

    fn fixture() -> (Arc<InMemoryStorage>, RootPersistenceStrategy, Arc<MappingConfiguration>) {
        let mapping = Arc::new(
            MappingBuilder::new()
                .class(ClassBuilder::new("Order"))
                .class(ClassBuilder::new("OrderItem"))
                .class(ClassBuilder::new("SpecialItem").inherits("OrderItem"))
                .relation(RelationBuilder::one_to_many("Order", "OrderItems", "OrderItem", "Order"))
                .build()
                .unwrap(),
        );
        let storage = Arc::new(InMemoryStorage::new());
        let strategy = RootPersistenceStrategy::new(
            Arc::clone(&storage) as Arc<dyn StorageProvider>,
            Arc::clone(&mapping),
        );
        (storage, strategy, mapping)
    }

    fn entry(id: &ObjectId, state: PersistState, timestamp: Option<Timestamp>) -> PersistEntry {
        PersistEntry {
            id: id.clone(),
            state,
            timestamp,
            values: vec![],
            marked_as_changed: false,
            end_points: vec![],
        }
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_, strategy, _) = fixture();
        let result = strategy.load_object(&ObjectId::new("Order"));
        assert!(matches!(result, Err(CoreError::ObjectNotFound { .. })));
    }

    #[test]
    fn related_query_includes_derived_classes() {
        let (storage, strategy, mapping) = fixture();
        let order = ObjectId::new("Order");
        let item = ObjectId::new("OrderItem");
        let special = ObjectId::new("SpecialItem");
        for id in [&item, &special] {
            storage
                .insert_record(id.clone(), vec![("Order".into(), Value::from(order.clone()))])
                .unwrap();
        }
        let definition = mapping
            .end_point(&ClassId::new("Order"), "OrderItems")
            .unwrap();
        let related = strategy.load_related(definition, &order).unwrap();
        assert_eq!(related, vec![item, special]);
    }

    #[test]
    fn unchanged_entries_are_not_written() {
        let (storage, strategy, _) = fixture();
        let batch = PersistBatch {
            entries: vec![entry(&ObjectId::new("Order"), PersistState::Unchanged, None)],
        };
        assert!(strategy.persist(&batch).unwrap().is_empty());
        assert!(storage.is_empty());
    }

    #[test]
    fn stale_timestamp_is_a_concurrency_violation() {
        let (storage, strategy, _) = fixture();
        let id = ObjectId::new("Order");
        storage.insert_record(id.clone(), vec![]).unwrap();
        let batch = PersistBatch {
            entries: vec![entry(&id, PersistState::Changed, Some(Timestamp::new(42)))],
        };
        let err = strategy.persist(&batch).unwrap_err();
        assert!(matches!(err, CoreError::ConcurrencyViolation { id: ref conflict } if conflict == &id));
    }

    #[test]
    fn multiple_rejections_are_reported_together() {
        let (storage, strategy, _) = fixture();
        let existing = ObjectId::new("Order");
        storage.insert_record(existing.clone(), vec![]).unwrap();
        let batch = PersistBatch {
            entries: vec![
                entry(&existing, PersistState::New, None),
                entry(&ObjectId::new("Order"), PersistState::Deleted, Some(Timestamp::new(1))),
            ],
        };
        match strategy.persist(&batch) {
            Err(CoreError::Persist { failures }) => assert_eq!(failures.len(), 2),
            other => panic!("expected persist failure, got {other:?}"),
        }
    }
}
