use super::CollectionData;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::object::{ClassId, DomainObject, ObjectId};
use crate::transaction::{ClientTransaction, WeakTransaction};
use crate::types::TransactionId;

/// Innermost layer of an associated collection: reads come from the owning
/// end point, mutations become bidirectional relation commands.
#[derive(Debug)]
pub struct EndPointDelegatingCollectionData {
    end_point: RelationEndPointId,
    transaction: WeakTransaction,
    transaction_id: TransactionId,
}

impl EndPointDelegatingCollectionData {
    pub(crate) fn new(
        end_point: RelationEndPointId,
        transaction: WeakTransaction,
        transaction_id: TransactionId,
    ) -> Self {
        Self {
            end_point,
            transaction,
            transaction_id,
        }
    }

    fn transaction(&self) -> CoreResult<ClientTransaction> {
        ClientTransaction::upgrade(&self.transaction).ok_or(CoreError::TransactionDiscarded {
            id: self.transaction_id,
        })
    }

    fn read<R>(&self, f: impl FnOnce(&dyn CollectionData) -> CoreResult<R>) -> CoreResult<R> {
        self.transaction()?.read_collection(&self.end_point, f)
    }
}

impl CollectionData for EndPointDelegatingCollectionData {
    fn version(&self) -> CoreResult<u64> {
        self.read(|d| d.version())
    }

    fn count(&self) -> CoreResult<usize> {
        self.read(|d| d.count())
    }

    fn get(&self, index: usize) -> CoreResult<Option<DomainObject>> {
        self.read(|d| d.get(index))
    }

    fn index_of(&self, id: &ObjectId) -> CoreResult<Option<usize>> {
        self.read(|d| d.index_of(id))
    }

    fn contains(&self, id: &ObjectId) -> CoreResult<bool> {
        self.read(|d| d.contains(id))
    }

    fn get_by_id(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
        self.read(|d| d.get_by_id(id))
    }

    fn to_vec(&self) -> CoreResult<Vec<DomainObject>> {
        self.read(|d| d.to_vec())
    }

    fn required_class(&self) -> Option<&ClassId> {
        None
    }

    fn associated_end_point(&self) -> Option<&RelationEndPointId> {
        Some(&self.end_point)
    }

    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.transaction()?
            .insert_into_collection(&self.end_point, index, &object)
    }

    fn remove(&mut self, object: &DomainObject) -> CoreResult<bool> {
        self.transaction()?
            .remove_from_collection(&self.end_point, object)
    }

    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool> {
        match self.get_by_id(id)? {
            Some(member) => self.remove(&member),
            None => Ok(false),
        }
    }

    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.transaction()?
            .replace_in_collection(&self.end_point, index, &object)
    }

    fn clear(&mut self) -> CoreResult<()> {
        for member in self.to_vec()? {
            self.remove(&member)?;
        }
        Ok(())
    }
}
