//! Domain object collections.
//!
//! Collection behavior is composed from small [`CollectionData`] layers.
//! A stand-alone collection is
//! `ArgumentChecking(TypeChecking(EventRaising(store)))`; a collection
//! associated with an end point is
//! `ArgumentChecking(TypeChecking(EndPointDelegating))`. The end point
//! itself keeps its contents in `LazyLoading(ChangeCaching(store))`.
//!
//! [`ObjectCollection`] is the handle users hold. Switching a handle
//! between stand-alone and associated swaps its layer chain in place.

/// Forwards the read-only part of [`CollectionData`] to `self.inner`.
macro_rules! delegate_reads {
    () => {
        fn version(&self) -> CoreResult<u64> {
            self.inner.version()
        }

        fn count(&self) -> CoreResult<usize> {
            self.inner.count()
        }

        fn get(&self, index: usize) -> CoreResult<Option<DomainObject>> {
            self.inner.get(index)
        }

        fn index_of(&self, id: &ObjectId) -> CoreResult<Option<usize>> {
            self.inner.index_of(id)
        }

        fn contains(&self, id: &ObjectId) -> CoreResult<bool> {
            self.inner.contains(id)
        }

        fn get_by_id(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
            self.inner.get_by_id(id)
        }

        fn to_vec(&self) -> CoreResult<Vec<DomainObject>> {
            self.inner.to_vec()
        }

        fn associated_end_point(&self) -> Option<&RelationEndPointId> {
            self.inner.associated_end_point()
        }
    };
}

mod argument_checking;
mod change_caching;
mod delegating;
mod event_raising;
mod events;
mod lazy_loading;
mod object_collection;
mod read_only;
mod store;
mod type_checking;

pub use argument_checking::ArgumentCheckingCollectionData;
pub use change_caching::{ChangeCachingCollectionData, ChangeDetection};
pub use delegating::EndPointDelegatingCollectionData;
pub use event_raising::EventRaisingCollectionData;
pub use events::{CollectionEventHandler, CollectionEvents};
pub use lazy_loading::LazyLoadingCollectionData;
pub use object_collection::{CollectionIter, ElementType, ObjectCollection};
pub use read_only::ReadOnlyCollectionData;
pub use store::DomainObjectCollectionData;
pub use type_checking::TypeCheckingCollectionData;

use crate::endpoint::RelationEndPointId;
use crate::error::CoreResult;
use crate::object::{ClassId, DomainObject, ObjectId};
use std::fmt;

/// One layer of collection behavior.
///
/// Reads return owned values so that layers backed by a transaction can
/// release their borrow before returning.
pub trait CollectionData: fmt::Debug {
    /// Counter bumped by every mutation.
    fn version(&self) -> CoreResult<u64>;

    /// Number of elements.
    fn count(&self) -> CoreResult<usize>;

    /// Element at `index`, if in range.
    fn get(&self, index: usize) -> CoreResult<Option<DomainObject>>;

    /// Position of the element with `id`.
    fn index_of(&self, id: &ObjectId) -> CoreResult<Option<usize>>;

    /// Returns true if an element with `id` is present.
    fn contains(&self, id: &ObjectId) -> CoreResult<bool> {
        Ok(self.index_of(id)?.is_some())
    }

    /// Element with `id`.
    fn get_by_id(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
        match self.index_of(id)? {
            Some(index) => self.get(index),
            None => Ok(None),
        }
    }

    /// All elements in order.
    fn to_vec(&self) -> CoreResult<Vec<DomainObject>> {
        let count = self.count()?;
        let mut items = Vec::with_capacity(count);
        for index in 0..count {
            if let Some(item) = self.get(index)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Class every element must be assignable to.
    fn required_class(&self) -> Option<&ClassId> {
        None
    }

    /// End point this data belongs to, if associated.
    fn associated_end_point(&self) -> Option<&RelationEndPointId> {
        None
    }

    /// Returns true if mutations are rejected.
    fn is_read_only(&self) -> bool {
        false
    }

    /// Inserts `object` at `index`.
    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()>;

    /// Removes `object`. Returns false if it was absent.
    fn remove(&mut self, object: &DomainObject) -> CoreResult<bool> {
        self.remove_id(object.id())
    }

    /// Removes the element with `id`. Returns false if it was absent.
    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool>;

    /// Replaces the element at `index`.
    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()>;

    /// Removes every element.
    fn clear(&mut self) -> CoreResult<()>;
}
