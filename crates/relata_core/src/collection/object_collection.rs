//! The user-facing collection handle.

use super::argument_checking::ArgumentCheckingCollectionData;
use super::delegating::EndPointDelegatingCollectionData;
use super::event_raising::EventRaisingCollectionData;
use super::events::{CollectionEventHandler, CollectionEvents};
use super::read_only::ReadOnlyCollectionData;
use super::store::DomainObjectCollectionData;
use super::type_checking::TypeCheckingCollectionData;
use super::CollectionData;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::MappingConfiguration;
use crate::object::{ClassId, DomainObject, ObjectId};
use crate::transaction::WeakTransaction;
use crate::types::TransactionId;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Required element class plus the mapping used to check assignability.
#[derive(Debug, Clone)]
pub struct ElementType {
    class: ClassId,
    mapping: Arc<MappingConfiguration>,
}

impl ElementType {
    /// Creates an element type; fails if `class` is not mapped.
    pub fn new(mapping: Arc<MappingConfiguration>, class: ClassId) -> CoreResult<Self> {
        mapping.class(&class)?;
        Ok(Self { class, mapping })
    }

    /// Returns the required class.
    #[must_use]
    pub fn class(&self) -> &ClassId {
        &self.class
    }
}

type Strategy = Box<dyn CollectionData>;

/// An ordered, duplicate-free collection of domain objects.
///
/// A collection is either stand-alone (it owns its contents) or associated
/// with a collection end point (it reads and writes the end point through
/// its transaction, keeping the opposite sides consistent). Handles are
/// cheap to clone; clones share the same contents and event handlers.
#[derive(Clone)]
pub struct ObjectCollection {
    data: Rc<RefCell<Strategy>>,
    events: Rc<CollectionEvents>,
    element_type: Option<ElementType>,
}

impl ObjectCollection {
    /// Creates an empty stand-alone collection accepting any class.
    #[must_use]
    pub fn new() -> Self {
        let events = Rc::new(CollectionEvents::new());
        let data = stand_alone_chain(Vec::new(), &events, None);
        Self {
            data: Rc::new(RefCell::new(data)),
            events,
            element_type: None,
        }
    }

    /// Creates an empty stand-alone collection whose elements must be
    /// assignable to `element_type`.
    #[must_use]
    pub fn with_element_type(element_type: ElementType) -> Self {
        let events = Rc::new(CollectionEvents::new());
        let data = stand_alone_chain(Vec::new(), &events, Some(&element_type));
        Self {
            data: Rc::new(RefCell::new(data)),
            events,
            element_type: Some(element_type),
        }
    }

    /// Creates a stand-alone collection holding `items`, rejecting duplicates.
    pub fn from_objects(items: impl IntoIterator<Item = DomainObject>) -> CoreResult<Self> {
        let collection = Self::new();
        for item in items {
            collection.add(item)?;
        }
        Ok(collection)
    }

    pub(crate) fn associated(
        end_point: RelationEndPointId,
        transaction: WeakTransaction,
        transaction_id: TransactionId,
        element_type: Option<ElementType>,
    ) -> Self {
        let events = Rc::new(CollectionEvents::new());
        let data = associated_chain(end_point, transaction, transaction_id, element_type.as_ref());
        Self {
            data: Rc::new(RefCell::new(data)),
            events,
            element_type,
        }
    }

    /// Read-only snapshot of `items`, used for original-contents views.
    pub(crate) fn read_only(items: Vec<DomainObject>) -> Self {
        let data: Strategy = Box::new(ReadOnlyCollectionData::new(
            DomainObjectCollectionData::from_objects(items),
        ));
        Self {
            data: Rc::new(RefCell::new(data)),
            events: Rc::new(CollectionEvents::new()),
            element_type: None,
        }
    }

    fn borrow(&self) -> CoreResult<Ref<'_, Strategy>> {
        self.data
            .try_borrow()
            .map_err(|_| CoreError::reentrancy("collection is being modified"))
    }

    fn borrow_mut(&self) -> CoreResult<RefMut<'_, Strategy>> {
        self.data
            .try_borrow_mut()
            .map_err(|_| CoreError::reentrancy("collection is in use"))
    }

    /// Returns the number of elements.
    pub fn count(&self) -> CoreResult<usize> {
        self.borrow()?.count()
    }

    /// Returns true if the collection has no elements.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.count()? == 0)
    }

    /// Returns true if an element with `id` is present.
    pub fn contains(&self, id: &ObjectId) -> CoreResult<bool> {
        self.borrow()?.contains(id)
    }

    /// Returns the element at `index`.
    pub fn get(&self, index: usize) -> CoreResult<Option<DomainObject>> {
        self.borrow()?.get(index)
    }

    /// Returns the element with `id`.
    pub fn get_by_id(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
        self.borrow()?.get_by_id(id)
    }

    /// Returns the position of the element with `id`.
    pub fn index_of(&self, id: &ObjectId) -> CoreResult<Option<usize>> {
        self.borrow()?.index_of(id)
    }

    /// Copies the elements into a vector.
    pub fn to_vec(&self) -> CoreResult<Vec<DomainObject>> {
        self.borrow()?.to_vec()
    }

    /// Returns the mutation counter used to detect concurrent modification.
    pub fn version(&self) -> CoreResult<u64> {
        self.borrow()?.version()
    }

    /// Appends an element.
    pub fn add(&self, object: DomainObject) -> CoreResult<()> {
        let mut data = self.borrow_mut()?;
        let index = data.count()?;
        data.insert(index, object)
    }

    /// Inserts an element at `index`.
    pub fn insert(&self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.borrow_mut()?.insert(index, object)
    }

    /// Removes an element. Returns false if it was not present.
    pub fn remove(&self, object: &DomainObject) -> CoreResult<bool> {
        self.borrow_mut()?.remove(object)
    }

    /// Removes the element with `id`. Returns false if it was not present.
    pub fn remove_id(&self, id: &ObjectId) -> CoreResult<bool> {
        self.borrow_mut()?.remove_id(id)
    }

    /// Replaces the element at `index`.
    pub fn replace(&self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.borrow_mut()?.replace(index, object)
    }

    /// Removes all elements.
    pub fn clear(&self) -> CoreResult<()> {
        self.borrow_mut()?.clear()
    }

    /// Returns true if mutations are rejected.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.data.try_borrow().map_or(false, |d| d.is_read_only())
    }

    /// Returns the end point this collection is associated with.
    pub fn associated_end_point(&self) -> CoreResult<Option<RelationEndPointId>> {
        Ok(self.borrow()?.associated_end_point().cloned())
    }

    /// Returns the class elements must be assignable to.
    #[must_use]
    pub fn required_class(&self) -> Option<&ClassId> {
        self.element_type.as_ref().map(ElementType::class)
    }

    /// Registers an add/remove handler.
    pub fn add_handler(&self, handler: impl CollectionEventHandler + 'static) -> CoreResult<()> {
        self.events.add_handler(Box::new(handler))
    }

    pub(crate) fn events(&self) -> &Rc<CollectionEvents> {
        &self.events
    }

    /// Returns true if both handles share the same collection.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Iterates the elements, failing with `ConcurrentModification` if the
    /// collection changes underneath.
    #[must_use]
    pub fn iter(&self) -> CollectionIter {
        CollectionIter::new(self.clone())
    }

    /// Returns true if the strategy can be swapped right now.
    pub(crate) fn can_transform(&self) -> bool {
        self.data.try_borrow_mut().is_ok()
    }

    /// Turns this handle into the associated collection of `end_point`.
    pub(crate) fn transform_to_associated(
        &self,
        end_point: RelationEndPointId,
        transaction: WeakTransaction,
        transaction_id: TransactionId,
    ) -> CoreResult<()> {
        let chain = associated_chain(
            end_point,
            transaction,
            transaction_id,
            self.element_type.as_ref(),
        );
        *self.borrow_mut()? = chain;
        Ok(())
    }

    /// Detaches this handle from its end point, keeping `items` as its own
    /// contents.
    pub(crate) fn transform_to_stand_alone(&self, items: Vec<DomainObject>) -> CoreResult<()> {
        let chain = stand_alone_chain(items, &self.events, self.element_type.as_ref());
        *self.borrow_mut()? = chain;
        Ok(())
    }
}

impl Default for ObjectCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.try_borrow() {
            Ok(data) => f
                .debug_struct("ObjectCollection")
                .field("data", &*data)
                .finish(),
            Err(_) => f.write_str("ObjectCollection(<in use>)"),
        }
    }
}

impl<'a> IntoIterator for &'a ObjectCollection {
    type Item = CoreResult<DomainObject>;
    type IntoIter = CollectionIter;

    fn into_iter(self) -> CollectionIter {
        self.iter()
    }
}

fn stand_alone_chain(
    items: Vec<DomainObject>,
    events: &Rc<CollectionEvents>,
    element_type: Option<&ElementType>,
) -> Strategy {
    let store = EventRaisingCollectionData::new(
        DomainObjectCollectionData::from_objects(items),
        Rc::clone(events),
    );
    match element_type {
        Some(t) => Box::new(ArgumentCheckingCollectionData::new(
            TypeCheckingCollectionData::new(store, t.class.clone(), Arc::clone(&t.mapping)),
        )),
        None => Box::new(ArgumentCheckingCollectionData::new(store)),
    }
}

fn associated_chain(
    end_point: RelationEndPointId,
    transaction: WeakTransaction,
    transaction_id: TransactionId,
    element_type: Option<&ElementType>,
) -> Strategy {
    let delegating = EndPointDelegatingCollectionData::new(end_point, transaction, transaction_id);
    match element_type {
        Some(t) => Box::new(ArgumentCheckingCollectionData::new(
            TypeCheckingCollectionData::new(delegating, t.class.clone(), Arc::clone(&t.mapping)),
        )),
        None => Box::new(ArgumentCheckingCollectionData::new(delegating)),
    }
}

/// Version-checked iterator over an [`ObjectCollection`].
///
/// Yields `Err(ConcurrentModification)` once if the collection changed since
/// the iterator was created, then stops.
#[derive(Debug)]
pub struct CollectionIter {
    collection: ObjectCollection,
    index: usize,
    expected_version: Option<u64>,
    done: bool,
}

impl CollectionIter {
    fn new(collection: ObjectCollection) -> Self {
        let expected_version = collection.version().ok();
        Self {
            collection,
            index: 0,
            expected_version,
            done: false,
        }
    }

    fn step(&mut self) -> CoreResult<Option<DomainObject>> {
        let Some(expected) = self.expected_version else {
            return self
                .collection
                .version()
                .and(Err(CoreError::ConcurrentModification));
        };
        if self.collection.version()? != expected {
            return Err(CoreError::ConcurrentModification);
        }
        let item = self.collection.get(self.index)?;
        self.index += 1;
        Ok(item)
    }
}

impl Iterator for CollectionIter {
    type Item = CoreResult<DomainObject>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
