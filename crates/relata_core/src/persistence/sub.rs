use super::{LoadedObject, PersistBatch, PersistedObject, PersistenceStrategy};
use crate::error::CoreResult;
use crate::mapping::RelationEndPointDefinition;
use crate::object::ObjectId;
use crate::transaction::ClientTransaction;
use std::fmt;

/// Persistence strategy of a sub-transaction: loads from the parent's
/// current state and commits into the parent.
///
/// The parent is read-only while the sub-transaction is active; loading and
/// merging go around that restriction because they are the only way the
/// parent's state may change.
pub(crate) struct SubPersistenceStrategy {
    parent: ClientTransaction,
}

impl SubPersistenceStrategy {
    pub(crate) fn new(parent: ClientTransaction) -> Self {
        Self { parent }
    }
}

impl PersistenceStrategy for SubPersistenceStrategy {
    fn load_object(&self, id: &ObjectId) -> CoreResult<LoadedObject> {
        self.parent.load_for_sub_transaction(id)
    }

    fn load_related(
        &self,
        definition: &RelationEndPointDefinition,
        owner: &ObjectId,
    ) -> CoreResult<Vec<ObjectId>> {
        self.parent
            .related_for_sub_transaction(definition.property_name(), owner)
    }

    fn persist(&self, batch: &PersistBatch) -> CoreResult<Vec<PersistedObject>> {
        self.parent.merge_sub_transaction(batch)
    }
}

impl fmt::Debug for SubPersistenceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubPersistenceStrategy")
            .field("parent", &self.parent.id())
            .finish()
    }
}
