//! In-memory storage provider.

use super::{ObjectRecord, PersistKind, PersistOutcome, PersistRecord, RelationQuery, StorageProvider};
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::types::Timestamp;
use crate::value::Value;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const SNAPSHOT_FORMAT: u32 = 1;

/// Whole-store export of an [`InMemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Snapshot format version.
    pub format: u32,
    /// Last timestamp handed out by the store.
    pub clock: Timestamp,
    /// Records in insertion order.
    pub records: Vec<ObjectRecord>,
}

impl StoreSnapshot {
    /// Encodes the snapshot as CBOR.
    pub fn to_bytes(&self) -> CoreResult<Vec<u8>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| CoreError::storage(format!("snapshot encoding failed: {e:?}")))?;
        Ok(bytes)
    }

    /// Decodes a CBOR snapshot.
    pub fn from_bytes(bytes: &[u8]) -> CoreResult<Self> {
        let snapshot: Self = ciborium::from_reader(bytes)
            .map_err(|e| CoreError::storage(format!("snapshot decoding failed: {e:?}")))?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(CoreError::storage(format!(
                "unsupported snapshot format {}",
                snapshot.format
            )));
        }
        Ok(snapshot)
    }
}

#[derive(Debug, Default)]
struct Store {
    records: HashMap<ObjectId, Vec<u8>>,
    order: Vec<ObjectId>,
    clock: u64,
}

impl Store {
    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp::new(self.clock)
    }

    fn decode(&self, id: &ObjectId) -> CoreResult<Option<ObjectRecord>> {
        self.records.get(id).map(|bytes| decode(bytes)).transpose()
    }

    fn put(&mut self, record: &ObjectRecord) -> CoreResult<()> {
        let bytes = encode(record)?;
        if self.records.insert(record.id.clone(), bytes).is_none() {
            self.order.push(record.id.clone());
        }
        Ok(())
    }

    fn remove(&mut self, id: &ObjectId) {
        if self.records.remove(id).is_some() {
            self.order.retain(|o| o != id);
        }
    }

    fn check(&self, record: &PersistRecord) -> CoreResult<Option<PersistOutcome>> {
        let stored = self.decode(&record.id)?;
        let verdict = match (record.kind, stored) {
            (PersistKind::Insert, Some(_)) => Some(PersistOutcome::Failed {
                id: record.id.clone(),
                reason: "object already exists".into(),
            }),
            (PersistKind::Insert, None) => None,
            (PersistKind::Update | PersistKind::Delete, None) => Some(PersistOutcome::Failed {
                id: record.id.clone(),
                reason: "object does not exist".into(),
            }),
            (PersistKind::Update | PersistKind::Delete, Some(stored)) => {
                if record.expected_timestamp == Some(stored.timestamp) {
                    None
                } else {
                    Some(PersistOutcome::Conflict {
                        id: record.id.clone(),
                        expected: record.expected_timestamp,
                        found: stored.timestamp,
                    })
                }
            }
        };
        Ok(verdict)
    }
}

fn encode(record: &ObjectRecord) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(record, &mut bytes)
        .map_err(|e| CoreError::storage(format!("record encoding failed: {e:?}")))?;
    Ok(bytes)
}

fn decode(bytes: &[u8]) -> CoreResult<ObjectRecord> {
    ciborium::from_reader(bytes)
        .map_err(|e| CoreError::storage(format!("record decoding failed: {e:?}")))
}

/// A storage provider holding CBOR-encoded records in memory.
///
/// Suitable for tests, demos and ephemeral stores. The whole store can be
/// exported as a [`StoreSnapshot`] and restored later.
///
/// # Thread Safety
///
/// The provider is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use relata_core::{InMemoryStorage, ObjectId, StorageProvider, Value};
///
/// let storage = InMemoryStorage::new();
/// let id = ObjectId::new("Order");
/// storage.insert_record(id.clone(), vec![("Number".into(), Value::from(1))]).unwrap();
/// assert_eq!(storage.len(), 1);
/// assert!(storage.load_object(&id).unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    store: RwLock<Store>,
}

impl InMemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a store from a snapshot.
    pub fn from_snapshot(snapshot: &StoreSnapshot) -> CoreResult<Self> {
        let storage = Self::new();
        storage.import_snapshot(snapshot)?;
        Ok(storage)
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.read().records.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stores a record directly, bypassing transactions. Used to seed data.
    pub fn insert_record(&self, id: ObjectId, values: Vec<(String, Value)>) -> CoreResult<Timestamp> {
        let mut store = self.store.write();
        let timestamp = store.tick();
        store.put(&ObjectRecord {
            id,
            timestamp,
            values,
        })?;
        Ok(timestamp)
    }

    /// Returns every record in insertion order.
    pub fn records(&self) -> CoreResult<Vec<ObjectRecord>> {
        let store = self.store.read();
        store
            .order
            .iter()
            .filter_map(|id| store.records.get(id))
            .map(|bytes| decode(bytes))
            .collect()
    }

    /// Exports the whole store.
    pub fn export_snapshot(&self) -> CoreResult<StoreSnapshot> {
        let records = self.records()?;
        Ok(StoreSnapshot {
            format: SNAPSHOT_FORMAT,
            clock: Timestamp::new(self.store.read().clock),
            records,
        })
    }

    /// Replaces the store contents with a snapshot.
    pub fn import_snapshot(&self, snapshot: &StoreSnapshot) -> CoreResult<()> {
        let mut fresh = Store {
            clock: snapshot.clock.as_u64(),
            ..Store::default()
        };
        for record in &snapshot.records {
            fresh.put(record)?;
            fresh.clock = fresh.clock.max(record.timestamp.as_u64());
        }
        *self.store.write() = fresh;
        Ok(())
    }
}

impl StorageProvider for InMemoryStorage {
    fn load_object(&self, id: &ObjectId) -> CoreResult<Option<ObjectRecord>> {
        self.store.read().decode(id)
    }

    fn load_related(&self, query: &RelationQuery) -> CoreResult<Vec<ObjectId>> {
        let store = self.store.read();
        let mut related = Vec::new();
        for id in store
            .order
            .iter()
            .filter(|id| query.classes.contains(id.class_id()))
        {
            let Some(record) = store.decode(id)? else {
                continue;
            };
            if record.value(&query.foreign_key).and_then(Value::as_object_id) == Some(&query.target) {
                related.push(record.id);
            }
        }
        Ok(related)
    }

    fn persist(&self, records: &[PersistRecord]) -> CoreResult<Vec<PersistOutcome>> {
        let mut store = self.store.write();

        let mut rejected = Vec::new();
        for record in records {
            if let Some(outcome) = store.check(record)? {
                rejected.push(outcome);
            }
        }
        if !rejected.is_empty() {
            tracing::warn!(
                rejected = rejected.len(),
                batch = records.len(),
                "in-memory store rejected batch"
            );
            return Ok(rejected);
        }

        let mut outcomes = Vec::with_capacity(records.len());
        for record in records {
            match record.kind {
                PersistKind::Delete => {
                    store.remove(&record.id);
                    outcomes.push(PersistOutcome::Deleted {
                        id: record.id.clone(),
                    });
                }
                PersistKind::Insert | PersistKind::Update => {
                    let timestamp = store.tick();
                    store.put(&ObjectRecord {
                        id: record.id.clone(),
                        timestamp,
                        values: record.values.clone(),
                    })?;
                    outcomes.push(PersistOutcome::Saved {
                        id: record.id.clone(),
                        timestamp,
                    });
                }
            }
        }
        tracing::debug!(records = outcomes.len(), "in-memory store applied batch");
        Ok(outcomes)
    }
}
