//! Error types for the relata engine.

use crate::endpoint::RelationEndPointId;
use crate::object::{ClassId, ObjectId};
use crate::types::TransactionId;
use crate::value::ValueType;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// A single object the storage provider refused to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
    /// The rejected object.
    pub object: ObjectId,
    /// Reason reported by the storage provider.
    pub reason: String,
}

/// Errors raised by the change-tracking engine.
///
/// All errors are raised synchronously at the point of violation. None of
/// them leaves partially applied state behind.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The object was discarded (rolled back while new, deleted and
    /// committed, or its transaction was released).
    #[error("object {id} has been discarded")]
    ObjectDiscarded {
        /// The discarded object.
        id: ObjectId,
    },

    /// The object is marked for deletion.
    #[error("object {id} has been deleted")]
    ObjectDeleted {
        /// The deleted object.
        id: ObjectId,
    },

    /// The object does not exist in this transaction or its storage.
    #[error("object {id} could not be found")]
    ObjectNotFound {
        /// The missing object.
        id: ObjectId,
    },

    /// A collection changed while it was being enumerated.
    #[error("collection was modified during enumeration")]
    ConcurrentModification,

    /// An object from another transaction hierarchy was used.
    #[error("object {id} belongs to transaction hierarchy {owner}, not {current}")]
    ClientTransactionsDiffer {
        /// The foreign object.
        id: ObjectId,
        /// Root transaction of the hierarchy the object belongs to.
        owner: TransactionId,
        /// Root transaction of the hierarchy it was used in.
        current: TransactionId,
    },

    /// The transaction has an active sub-transaction and rejects mutations.
    #[error("transaction {id} is read-only while a sub-transaction is active")]
    TransactionReadOnly {
        /// The read-only transaction.
        id: TransactionId,
    },

    /// The transaction was discarded.
    #[error("transaction {id} has been discarded")]
    TransactionDiscarded {
        /// The discarded transaction.
        id: TransactionId,
    },

    /// A listener or event handler re-entered an object that is busy.
    #[error("re-entrant access rejected: {message}")]
    Reentrancy {
        /// What was re-entered.
        message: String,
    },

    /// Mapping metadata is inconsistent or does not know the requested item.
    #[error("mapping error: {message}")]
    Mapping {
        /// Description of the mapping problem.
        message: String,
    },

    /// A property value does not match the property's declared type.
    #[error("property {property} expects {expected:?}, got {actual}")]
    PropertyTypeMismatch {
        /// The property being assigned.
        property: String,
        /// Declared value type.
        expected: ValueType,
        /// Description of the rejected value.
        actual: String,
    },

    /// A non-nullable property was assigned null.
    #[error("property {property} does not accept null")]
    ValueRequired {
        /// The property being assigned.
        property: String,
    },

    /// A collection end point was read before its contents were loaded.
    #[error("collection end point {end_point} is not loaded")]
    CollectionNotLoaded {
        /// The unloaded end point.
        end_point: RelationEndPointId,
    },

    /// An argument violated the operation's contract.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violation.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A mandatory relation was empty at commit time.
    #[error("mandatory relation {end_point} is not set")]
    MandatoryRelationNotSet {
        /// The empty end point.
        end_point: RelationEndPointId,
    },

    /// A listener or extension aborted the operation.
    #[error("operation vetoed: {reason}")]
    Vetoed {
        /// Reason given by the observer.
        reason: String,
    },

    /// The storage provider rejected the commit batch.
    #[error("storage rejected {} object(s) of the commit batch", failures.len())]
    Persist {
        /// Per-object failures.
        failures: Vec<PersistFailure>,
    },

    /// A stored object changed since it was loaded.
    #[error("concurrency violation on object {id}")]
    ConcurrencyViolation {
        /// The conflicting object.
        id: ObjectId,
    },

    /// Stored records could not be encoded or decoded.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a re-entrancy error.
    pub fn reentrancy(message: impl Into<String>) -> Self {
        Self::Reentrancy {
            message: message.into(),
        }
    }

    /// Creates a mapping error.
    pub fn mapping(message: impl Into<String>) -> Self {
        Self::Mapping {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a veto error, for use by listeners and extensions.
    pub fn vetoed(reason: impl Into<String>) -> Self {
        Self::Vetoed {
            reason: reason.into(),
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates an unknown class error.
    pub fn unknown_class(class: &ClassId) -> Self {
        Self::mapping(format!("class {class} is not mapped"))
    }

    /// Creates an unknown property error.
    pub fn unknown_property(class: &ClassId, property: &str) -> Self {
        Self::mapping(format!("class {class} has no property {property}"))
    }

    /// Returns true for errors that leave the object permanently unusable.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::ObjectDiscarded { .. }
                | Self::ObjectDeleted { .. }
                | Self::ObjectNotFound { .. }
                | Self::TransactionDiscarded { .. }
        )
    }
}
