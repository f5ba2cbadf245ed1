//! Handles to domain objects.

use super::id::{ClassId, ObjectId};
use crate::types::TransactionId;
use std::fmt;

/// A lightweight handle to a domain object within one transaction hierarchy.
///
/// The handle carries no data of its own. Property values and relations
/// are read and written through a [`ClientTransaction`] of the hierarchy
/// the object was obtained from. Using it with a transaction from a
/// different hierarchy fails with `ClientTransactionsDiffer`.
///
/// [`ClientTransaction`]: crate::transaction::ClientTransaction
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DomainObject {
    id: ObjectId,
    hierarchy: TransactionId,
}

impl DomainObject {
    pub(crate) fn new(id: ObjectId, hierarchy: TransactionId) -> Self {
        Self { id, hierarchy }
    }

    /// Returns the object's ID.
    #[must_use]
    pub fn id(&self) -> &ObjectId {
        &self.id
    }

    /// Returns the object's class.
    #[must_use]
    pub fn class_id(&self) -> &ClassId {
        self.id.class_id()
    }

    /// Returns the root transaction ID of the owning hierarchy.
    #[must_use]
    pub fn hierarchy(&self) -> TransactionId {
        self.hierarchy
    }
}

impl fmt::Debug for DomainObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainObject({} in {})", self.id, self.hierarchy)
    }
}

impl fmt::Display for DomainObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, f)
    }
}
