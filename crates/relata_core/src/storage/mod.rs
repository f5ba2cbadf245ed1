//! Storage provider contract.
//!
//! The engine never talks to a database directly. A root transaction hands
//! its commit batch to a [`StorageProvider`], which applies it atomically
//! and reports one [`PersistOutcome`] per record. Providers are shared
//! across transactions and threads.

mod memory;

pub use memory::{InMemoryStorage, StoreSnapshot};

use crate::error::CoreResult;
use crate::object::{ClassId, ObjectId};
use crate::types::Timestamp;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The stored form of one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Object identity.
    pub id: ObjectId,
    /// Version stamp assigned by the provider on every write.
    pub timestamp: Timestamp,
    /// Property values by name, foreign keys included.
    pub values: Vec<(String, Value)>,
}

impl ObjectRecord {
    /// Returns the stored value of `property`.
    #[must_use]
    pub fn value(&self, property: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }
}

/// Finds objects whose foreign key points at `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationQuery {
    /// Classes the referencing objects may belong to.
    pub classes: Vec<ClassId>,
    /// Foreign-key property holding the reference.
    pub foreign_key: String,
    /// The referenced object.
    pub target: ObjectId,
}

/// What to do with one record of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistKind {
    /// Store a record that must not exist yet.
    Insert,
    /// Overwrite an existing record.
    Update,
    /// Remove an existing record.
    Delete,
}

/// One write of a commit batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistRecord {
    /// Target object.
    pub id: ObjectId,
    /// Kind of write.
    pub kind: PersistKind,
    /// Timestamp the object had when it was loaded; `None` for inserts.
    pub expected_timestamp: Option<Timestamp>,
    /// Values to store. Empty for deletes.
    pub values: Vec<(String, Value)>,
}

/// Provider verdict for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The record was written with a new timestamp.
    Saved {
        /// Written object.
        id: ObjectId,
        /// New version stamp.
        timestamp: Timestamp,
    },
    /// The record was removed.
    Deleted {
        /// Removed object.
        id: ObjectId,
    },
    /// The stored timestamp differs from the expected one; the batch was
    /// not applied.
    Conflict {
        /// Conflicting object.
        id: ObjectId,
        /// Timestamp the writer loaded.
        expected: Option<Timestamp>,
        /// Timestamp currently stored.
        found: Timestamp,
    },
    /// The record was rejected; the batch was not applied.
    Failed {
        /// Rejected object.
        id: ObjectId,
        /// Why the provider rejected it.
        reason: String,
    },
}

impl PersistOutcome {
    /// Returns the object the outcome refers to.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        match self {
            Self::Saved { id, .. }
            | Self::Deleted { id }
            | Self::Conflict { id, .. }
            | Self::Failed { id, .. } => id,
        }
    }

    /// Returns true if the record was rejected.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Failed { .. })
    }
}

/// A backing store for domain objects.
///
/// # Invariants
///
/// - `persist` applies either every record of the batch or none of them
/// - a rejected batch reports at least one `Conflict` or `Failed` outcome
/// - every successful write assigns a fresh timestamp
pub trait StorageProvider: Send + Sync + fmt::Debug {
    /// Loads one object, `None` if it is not stored.
    fn load_object(&self, id: &ObjectId) -> CoreResult<Option<ObjectRecord>>;

    /// Returns the IDs of objects referencing `query.target`, in storage order.
    fn load_related(&self, query: &RelationQuery) -> CoreResult<Vec<ObjectId>>;

    /// Applies a batch atomically.
    ///
    /// # Errors
    ///
    /// Returns an error only if the provider itself failed; rejected records
    /// are reported as `Conflict` or `Failed` outcomes.
    fn persist(&self, records: &[PersistRecord]) -> CoreResult<Vec<PersistOutcome>>;
}
