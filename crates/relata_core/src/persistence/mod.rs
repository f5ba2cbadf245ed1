//! Where a transaction loads from and commits to.
//!
//! A root transaction is backed by a storage provider; a sub-transaction is
//! backed by its parent transaction. Both sit behind
//! [`PersistenceStrategy`], so the data manager is the same at every level.

mod root;
mod sub;

pub use root::RootPersistenceStrategy;
pub(crate) use sub::SubPersistenceStrategy;

use crate::endpoint::RelationEndPointId;
use crate::error::CoreResult;
use crate::mapping::RelationEndPointDefinition;
use crate::object::ObjectId;
use crate::types::Timestamp;
use crate::value::Value;
use std::fmt;

/// An object as delivered by a persistence strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedObject {
    /// Object identity.
    pub id: ObjectId,
    /// Storage timestamp, `None` for objects not yet stored.
    pub timestamp: Option<Timestamp>,
    /// Property values by name.
    pub values: Vec<(String, Value)>,
}

/// Commit state of one batch entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistState {
    /// Created in the committing transaction.
    New,
    /// Property values changed or the object was marked as changed.
    Changed,
    /// Only virtual relation end points changed.
    Unchanged,
    /// Marked for deletion.
    Deleted,
}

/// Committed contents of one virtual end point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndPointData {
    /// Opposite of a single-valued end point.
    Object(Option<ObjectId>),
    /// Members of a collection end point, in order.
    Collection(Vec<ObjectId>),
}

/// A changed end point of a batch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndPointSnapshot {
    /// The end point.
    pub end_point: RelationEndPointId,
    /// Its committed contents.
    pub data: EndPointData,
}

/// One object of a commit batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistEntry {
    /// Object identity.
    pub id: ObjectId,
    /// What commit does with the object.
    pub state: PersistState,
    /// Timestamp the object was loaded with.
    pub timestamp: Option<Timestamp>,
    /// Current property values, foreign keys included.
    pub values: Vec<(String, Value)>,
    /// True if the object was explicitly marked as changed.
    pub marked_as_changed: bool,
    /// Changed virtual end points owned by the object.
    pub end_points: Vec<EndPointSnapshot>,
}

/// Everything a transaction commits at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistBatch {
    /// Entries in registration order.
    pub entries: Vec<PersistEntry>,
}

impl PersistBatch {
    /// Returns true if the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Result of persisting one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedObject {
    /// Object identity.
    pub id: ObjectId,
    /// New timestamp, `None` for deleted objects or when unchanged.
    pub timestamp: Option<Timestamp>,
}

/// Source of object data and target of commits for one transaction.
pub trait PersistenceStrategy: fmt::Debug {
    /// Loads one object.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if the object does not exist; `ObjectDiscarded` if
    /// the parent transaction no longer has it.
    fn load_object(&self, id: &ObjectId) -> CoreResult<LoadedObject>;

    /// Returns the IDs of the objects related to `owner` through the virtual
    /// end point `definition`.
    fn load_related(
        &self,
        definition: &RelationEndPointDefinition,
        owner: &ObjectId,
    ) -> CoreResult<Vec<ObjectId>>;

    /// Persists a batch all-or-nothing.
    fn persist(&self, batch: &PersistBatch) -> CoreResult<Vec<PersistedObject>>;
}
