//! Transaction observers.

use crate::command::{PropertyChange, RelationChange};
use crate::data::ObjectState;
use crate::data_manager::DataManager;
use crate::endpoint::{RelationEndPoint, RelationEndPointId};
use crate::error::CoreResult;
use crate::object::{ClassId, DomainObject, ObjectId};
use crate::types::TransactionId;
use crate::value::Value;

/// Read-only access to a transaction's state during a notification.
///
/// Only data that is already loaded can be read; a view never triggers
/// loading.
#[derive(Debug, Clone, Copy)]
pub struct TransactionView<'a> {
    data: &'a DataManager,
}

impl<'a> TransactionView<'a> {
    pub(crate) fn new(data: &'a DataManager) -> Self {
        Self { data }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.data.transaction_id()
    }

    /// Returns the state of a loaded object.
    #[must_use]
    pub fn state(&self, id: &ObjectId) -> Option<ObjectState> {
        self.data.object_state(id)
    }

    /// Returns the current value of a loaded object's property.
    #[must_use]
    pub fn value(&self, id: &ObjectId, property: &str) -> Option<&'a Value> {
        self.data.container(id)?.value(property).ok()
    }

    /// Returns the original value of a loaded object's property.
    #[must_use]
    pub fn original_value(&self, id: &ObjectId, property: &str) -> Option<&'a Value> {
        self.data.container(id)?.original_value(property).ok()
    }

    /// Returns the opposite of a loaded single-valued end point.
    #[must_use]
    pub fn related_id(&self, end_point: &RelationEndPointId) -> Option<Option<ObjectId>> {
        let container = self.data.container(end_point.object_id())?;
        match self.data.end_point(end_point)? {
            RelationEndPoint::Object(e) => e.opposite_id(container).ok(),
            RelationEndPoint::Collection(_) => None,
        }
    }

    /// Returns the members of a loaded collection end point.
    #[must_use]
    pub fn collection_ids(&self, end_point: &RelationEndPointId) -> Option<Vec<ObjectId>> {
        self.data
            .end_point(end_point)?
            .as_collection()?
            .current_ids()
            .ok()
    }

    /// Loaded objects in registration order.
    #[must_use]
    pub fn loaded_objects(&self) -> &'a [ObjectId] {
        self.data.loaded_ids()
    }
}

/// Observer of a transaction's lifecycle and modifications.
///
/// Methods ending in `-ing` run before the operation and may veto it by
/// returning an error; nothing has changed at that point. Past-tense
/// methods run after the operation completed. Every method defaults to a
/// no-op.
///
/// Listeners must not call back into the transaction that notifies them;
/// such calls fail with `Reentrancy`. Use the [`TransactionView`] instead.
#[allow(unused_variables)]
pub trait TransactionListener {
    /// Objects are about to be loaded.
    fn objects_loading(&mut self, transaction: TransactionId, ids: &[ObjectId]) -> CoreResult<()> {
        Ok(())
    }

    /// Objects were loaded.
    fn objects_loaded(&mut self, transaction: TransactionId, ids: &[ObjectId]) {}

    /// A new object of `class` is about to be created.
    fn new_object_creating(&mut self, view: &TransactionView<'_>, class: &ClassId) -> CoreResult<()> {
        Ok(())
    }

    /// A new object was created.
    fn new_object_created(&mut self, view: &TransactionView<'_>, object: &DomainObject) {}

    /// An object is about to be deleted.
    fn object_deleting(&mut self, view: &TransactionView<'_>, object: &DomainObject) -> CoreResult<()> {
        Ok(())
    }

    /// An object was deleted.
    fn object_deleted(&mut self, view: &TransactionView<'_>, object: &DomainObject) {}

    /// A property value is about to change.
    fn property_value_changing(
        &mut self,
        view: &TransactionView<'_>,
        change: &PropertyChange,
    ) -> CoreResult<()> {
        Ok(())
    }

    /// A property value changed.
    fn property_value_changed(&mut self, view: &TransactionView<'_>, change: &PropertyChange) {}

    /// A relation end point is about to change.
    fn relation_changing(&mut self, view: &TransactionView<'_>, change: &RelationChange) -> CoreResult<()> {
        Ok(())
    }

    /// A relation end point changed.
    fn relation_changed(&mut self, view: &TransactionView<'_>, change: &RelationChange) {}

    /// The transaction is about to commit `objects`.
    fn committing(&mut self, view: &TransactionView<'_>, objects: &[DomainObject]) -> CoreResult<()> {
        Ok(())
    }

    /// The transaction committed `objects`.
    fn committed(&mut self, view: &TransactionView<'_>, objects: &[DomainObject]) {}

    /// The transaction is about to roll back `objects`.
    fn rolling_back(&mut self, view: &TransactionView<'_>, objects: &[DomainObject]) -> CoreResult<()> {
        Ok(())
    }

    /// The transaction rolled back `objects`.
    fn rolled_back(&mut self, view: &TransactionView<'_>, objects: &[DomainObject]) {}

    /// A sub-transaction is about to be created.
    fn sub_transaction_creating(&mut self, view: &TransactionView<'_>) -> CoreResult<()> {
        Ok(())
    }

    /// A sub-transaction was created.
    fn sub_transaction_created(&mut self, view: &TransactionView<'_>, sub_transaction: TransactionId) {}

    /// The transaction was discarded.
    fn transaction_discarded(&mut self, transaction: TransactionId) {}
}
