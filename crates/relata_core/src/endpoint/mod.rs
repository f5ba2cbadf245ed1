//! Relation end points: the per-object, per-property state of a relation.

mod collection;
mod id;
mod object;

pub use collection::CollectionEndPoint;
pub use id::RelationEndPointId;
pub use object::ObjectEndPoint;

use crate::data::DataContainer;
use crate::error::CoreResult;
use crate::mapping::RelationEndPointDefinition;
use crate::transaction::WeakTransaction;
use crate::types::TransactionId;
use std::sync::Arc;

/// One side of a relation for one object.
#[derive(Debug)]
pub enum RelationEndPoint {
    /// Refers to at most one object.
    Object(ObjectEndPoint),
    /// Refers to an ordered collection.
    Collection(CollectionEndPoint),
}

impl RelationEndPoint {
    /// Returns the end point ID.
    #[must_use]
    pub fn id(&self) -> &RelationEndPointId {
        match self {
            Self::Object(e) => e.id(),
            Self::Collection(e) => e.id(),
        }
    }

    /// Returns the definition.
    #[must_use]
    pub fn definition(&self) -> &Arc<RelationEndPointDefinition> {
        match self {
            Self::Object(e) => e.definition(),
            Self::Collection(e) => e.definition(),
        }
    }

    /// Returns true if the end point's data is available.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        match self {
            Self::Object(e) => e.is_loaded(),
            Self::Collection(e) => e.is_loaded(),
        }
    }

    /// Returns true if the end point changed. `owner` is the owning object's
    /// container.
    #[must_use]
    pub fn has_changed(&self, owner: &DataContainer) -> bool {
        match self {
            Self::Object(e) => e.has_changed(owner),
            Self::Collection(e) => e.has_changed(),
        }
    }

    /// Returns true if the end point was assigned since the last commit.
    #[must_use]
    pub fn has_been_touched(&self, owner: &DataContainer) -> bool {
        match self {
            Self::Object(e) => e.has_been_touched(owner),
            Self::Collection(e) => e.has_been_touched(),
        }
    }

    /// Returns the object end point, if this is one.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectEndPoint> {
        match self {
            Self::Object(e) => Some(e),
            Self::Collection(_) => None,
        }
    }

    /// Returns the collection end point, if this is one.
    #[must_use]
    pub fn as_collection(&self) -> Option<&CollectionEndPoint> {
        match self {
            Self::Collection(e) => Some(e),
            Self::Object(_) => None,
        }
    }

    pub(crate) fn commit(&mut self) {
        match self {
            Self::Object(e) => e.commit(),
            Self::Collection(e) => e.commit(),
        }
    }

    pub(crate) fn rollback(
        &mut self,
        transaction: &WeakTransaction,
        transaction_id: TransactionId,
    ) -> CoreResult<()> {
        match self {
            Self::Object(e) => {
                e.rollback();
                Ok(())
            }
            Self::Collection(e) => e.rollback(transaction, transaction_id),
        }
    }
}
