use super::events::EventDispatcher;
use super::listener::{TransactionListener, TransactionView};
use super::scope::TransactionScope;
use crate::collection::{ChangeDetection, CollectionData, ObjectCollection};
use crate::command::{execute, CommandFactory};
use crate::config::Config;
use crate::data::{DataContainer, ObjectState};
use crate::data_manager::DataManager;
use crate::endpoint::RelationEndPointId;
use crate::error::{CoreError, CoreResult};
use crate::mapping::MappingConfiguration;
use crate::object::{ClassId, DomainObject, ObjectId};
use crate::persistence::{
    LoadedObject, PersistBatch, PersistedObject, PersistenceStrategy, RootPersistenceStrategy,
    SubPersistenceStrategy,
};
use crate::storage::StorageProvider;
use crate::types::TransactionId;
use crate::value::Value;
use std::cell::{Cell, RefCell, RefMut};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::debug;

pub(crate) type WeakTransaction = Weak<TransactionInner>;

struct TransactionState {
    data: DataManager,
    events: EventDispatcher,
}

pub(crate) struct TransactionInner {
    id: TransactionId,
    hierarchy: TransactionId,
    depth: usize,
    parent: Option<ClientTransaction>,
    config: Config,
    mapping: Arc<MappingConfiguration>,
    discarded: Cell<bool>,
    child: RefCell<Option<WeakTransaction>>,
    state: RefCell<TransactionState>,
}

/// A unit of work over domain objects.
///
/// Cloning yields another handle to the same transaction.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use relata_core::{
///     ClassBuilder, ClassId, ClientTransaction, InMemoryStorage, MappingBuilder,
///     PropertyDefinition, ValueType,
/// };
///
/// let mapping = Arc::new(
///     MappingBuilder::new()
///         .class(ClassBuilder::new("Order").property(PropertyDefinition::new("Number", ValueType::Integer)))
///         .build()
///         .unwrap(),
/// );
/// let storage = Arc::new(InMemoryStorage::new());
/// let tx = ClientTransaction::new_root(mapping, storage.clone());
///
/// let order = tx.new_object(&ClassId::new("Order")).unwrap();
/// tx.set_value(&order, "Number", 7).unwrap();
/// tx.commit().unwrap();
/// assert_eq!(storage.len(), 1);
/// ```
#[derive(Clone)]
pub struct ClientTransaction {
    inner: Rc<TransactionInner>,
}

impl ClientTransaction {
    /// Creates a root transaction over `storage` with the default config.
    pub fn new_root(mapping: Arc<MappingConfiguration>, storage: Arc<dyn StorageProvider>) -> Self {
        Self::with_config(mapping, storage, Config::default())
    }

    /// Creates a root transaction over `storage`.
    pub fn with_config(
        mapping: Arc<MappingConfiguration>,
        storage: Arc<dyn StorageProvider>,
        config: Config,
    ) -> Self {
        let strategy: Rc<dyn PersistenceStrategy> =
            Rc::new(RootPersistenceStrategy::new(storage, Arc::clone(&mapping)));
        let transaction = Self::create(None, config, mapping, strategy, config.root_change_detection);
        debug!(tx = %transaction.id(), "root transaction created");
        transaction
    }

    fn create(
        parent: Option<ClientTransaction>,
        config: Config,
        mapping: Arc<MappingConfiguration>,
        strategy: Rc<dyn PersistenceStrategy>,
        detection: ChangeDetection,
    ) -> Self {
        let id = TransactionId::next();
        let (hierarchy, depth) = parent
            .as_ref()
            .map_or((id, 0), |p| (p.inner.hierarchy, p.inner.depth + 1));
        let inner = Rc::new_cyclic(|weak: &WeakTransaction| TransactionInner {
            id,
            hierarchy,
            depth,
            parent,
            config,
            mapping: Arc::clone(&mapping),
            discarded: Cell::new(false),
            child: RefCell::new(None),
            state: RefCell::new(TransactionState {
                data: DataManager::new(id, hierarchy, mapping, strategy, detection, weak.clone()),
                events: EventDispatcher::default(),
            }),
        });
        Self { inner }
    }

    pub(crate) fn upgrade(weak: &WeakTransaction) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.inner.id
    }

    /// Returns the ID of the root transaction of this hierarchy.
    #[must_use]
    pub fn hierarchy(&self) -> TransactionId {
        self.inner.hierarchy
    }

    /// Returns the nesting depth; 0 for root transactions.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Returns the parent transaction.
    #[must_use]
    pub fn parent(&self) -> Option<&ClientTransaction> {
        self.inner.parent.as_ref()
    }

    /// Returns the root transaction of this hierarchy.
    #[must_use]
    pub fn root(&self) -> ClientTransaction {
        let mut current = self;
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current.clone()
    }

    /// Returns the active sub-transaction.
    #[must_use]
    pub fn sub_transaction(&self) -> Option<ClientTransaction> {
        let slot = self.inner.child.try_borrow().ok()?;
        let inner = slot.as_ref()?.upgrade()?;
        (!inner.discarded.get()).then_some(Self { inner })
    }

    /// Returns the mapping.
    #[must_use]
    pub fn mapping(&self) -> &Arc<MappingConfiguration> {
        &self.inner.mapping
    }

    /// Returns the configuration shared by the hierarchy.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Returns true while a sub-transaction is active.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.sub_transaction().is_some()
    }

    /// Returns true once the transaction was discarded.
    #[must_use]
    pub fn is_discarded(&self) -> bool {
        self.inner.discarded.get()
    }

    /// Makes this transaction current on this thread until the returned
    /// guard is dropped.
    pub fn enter_scope(&self) -> TransactionScope {
        TransactionScope::enter(self.clone())
    }

    fn ensure_active(&self) -> CoreResult<()> {
        if self.is_discarded() {
            return Err(CoreError::TransactionDiscarded { id: self.id() });
        }
        Ok(())
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        self.ensure_active()?;
        if self.is_read_only() {
            return Err(CoreError::TransactionReadOnly { id: self.id() });
        }
        Ok(())
    }

    fn lock_state(&self) -> CoreResult<RefMut<'_, TransactionState>> {
        self.inner.state.try_borrow_mut().map_err(|_| {
            CoreError::reentrancy(format!(
                "transaction {} is busy notifying observers",
                self.inner.id
            ))
        })
    }

    fn with_state<R>(
        &self,
        f: impl FnOnce(&mut DataManager, &mut EventDispatcher) -> CoreResult<R>,
    ) -> CoreResult<R> {
        let mut state = self.lock_state()?;
        let TransactionState { data, events } = &mut *state;
        f(data, events)
    }

    /// Registers a listener.
    pub fn add_listener(&self, listener: impl TransactionListener + 'static) -> CoreResult<()> {
        self.ensure_active()?;
        self.lock_state()?.events.add_listener(Box::new(listener));
        Ok(())
    }

    /// Registers an extension under `key`. Fails if the key is taken.
    pub fn add_extension(
        &self,
        key: impl Into<String>,
        extension: impl TransactionListener + 'static,
    ) -> CoreResult<()> {
        self.ensure_active()?;
        self.lock_state()?
            .events
            .extensions_mut()
            .add(key, Box::new(extension))
    }

    /// Removes the extension registered under `key`. Returns false if none was.
    pub fn remove_extension(&self, key: &str) -> CoreResult<bool> {
        Ok(self
            .lock_state()?
            .events
            .extensions_mut()
            .remove(key)
            .is_some())
    }

    /// Registered extension keys in order.
    pub fn extension_keys(&self) -> CoreResult<Vec<String>> {
        Ok(self
            .lock_state()?
            .events
            .extensions()
            .keys()
            .map(str::to_string)
            .collect())
    }

    /// Creates an object of `class` with default values.
    pub fn new_object(&self, class: &ClassId) -> CoreResult<DomainObject> {
        self.ensure_writable()?;
        let definition = Arc::clone(self.inner.mapping.class(class)?);
        if definition.is_abstract() {
            return Err(CoreError::invalid_operation(format!(
                "class {class} is abstract"
            )));
        }
        self.with_state(|data, events| {
            let view = TransactionView::new(data);
            events.notify(|l| l.new_object_creating(&view, class))?;

            let id = ObjectId::new(class.clone());
            data.register_new(DataContainer::new_object(id.clone(), definition));
            let object = data.domain_object(id);

            let view = TransactionView::new(data);
            events.broadcast(|l| l.new_object_created(&view, &object));
            debug!(tx = %data.transaction_id(), object = %object.id(), "object created");
            Ok(object)
        })
    }

    /// Returns the object with `id`, loading it if needed.
    ///
    /// # Errors
    ///
    /// `ObjectNotFound` if it does not exist; `ObjectDiscarded` if it was
    /// discarded in this transaction.
    pub fn get_object(&self, id: &ObjectId) -> CoreResult<DomainObject> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.get_or_load(id, events)?;
            Ok(data.domain_object(id.clone()))
        })
    }

    /// Like [`get_object`](Self::get_object) but returns `None` for
    /// objects that do not exist.
    pub fn try_get_object(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
        match self.get_object(id) {
            Ok(object) => Ok(Some(object)),
            Err(CoreError::ObjectNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the state of `object` in this transaction.
    pub fn state(&self, object: &DomainObject) -> CoreResult<ObjectState> {
        if self.is_discarded() {
            return Ok(ObjectState::Discarded);
        }
        self.with_state(|data, events| {
            data.check_hierarchy(object)?;
            if data.is_invalid(object.id()) {
                return Ok(ObjectState::Discarded);
            }
            data.get_or_load(object.id(), events)?;
            Ok(data
                .object_state(object.id())
                .unwrap_or(ObjectState::Discarded))
        })
    }

    /// Returns the current value of a property.
    pub fn get_value(&self, object: &DomainObject, property: &str) -> CoreResult<Value> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.check_hierarchy(object)?;
            Ok(data
                .get_or_load_live(object.id(), events)?
                .value(property)?
                .clone())
        })
    }

    /// Returns the value a property had when it was loaded or last committed.
    pub fn get_original_value(&self, object: &DomainObject, property: &str) -> CoreResult<Value> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.check_hierarchy(object)?;
            Ok(data
                .get_or_load(object.id(), events)?
                .original_value(property)?
                .clone())
        })
    }

    /// Assigns a property value.
    pub fn set_value(&self, object: &DomainObject, property: &str, value: impl Into<Value>) -> CoreResult<()> {
        self.ensure_writable()?;
        let value = value.into();
        self.with_state(|data, events| {
            let command = CommandFactory::new(data, events).set_value(object, property, value)?;
            execute(&command, data, events)
        })
    }

    /// Returns the object a single-valued relation refers to.
    pub fn get_related(&self, owner: &DomainObject, property: &str) -> CoreResult<Option<DomainObject>> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.check_hierarchy(owner)?;
            data.get_or_load_live(owner.id(), events)?;
            let end_point = RelationEndPointId::new(owner.id().clone(), property);
            Ok(data
                .related_id(&end_point, events)?
                .map(|id| data.domain_object(id)))
        })
    }

    /// Returns the object a single-valued relation referred to when it was
    /// loaded or last committed.
    pub fn get_original_related(
        &self,
        owner: &DomainObject,
        property: &str,
    ) -> CoreResult<Option<DomainObject>> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.check_hierarchy(owner)?;
            let end_point = RelationEndPointId::new(owner.id().clone(), property);
            Ok(data
                .original_related_id(&end_point, events)?
                .map(|id| data.domain_object(id)))
        })
    }

    /// Sets a single-valued relation. Opposite end points are updated in
    /// the same operation.
    pub fn set_related(
        &self,
        owner: &DomainObject,
        property: &str,
        related: Option<&DomainObject>,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            let command = CommandFactory::new(data, events).set_related(owner, property, related)?;
            execute(&command, data, events)
        })
    }

    /// Returns the collection of a collection-valued relation.
    ///
    /// The same handle is returned on every call until it is replaced with
    /// [`set_related_objects`](Self::set_related_objects). Mutating it
    /// updates the opposite end points.
    pub fn related_objects(&self, owner: &DomainObject, property: &str) -> CoreResult<ObjectCollection> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.check_hierarchy(owner)?;
            data.get_or_load_live(owner.id(), events)?;
            data.collection_handle(&RelationEndPointId::new(owner.id().clone(), property), events)
        })
    }

    /// Returns a read-only snapshot of a collection as of the last load or
    /// commit.
    pub fn original_related_objects(&self, owner: &DomainObject, property: &str) -> CoreResult<ObjectCollection> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.check_hierarchy(owner)?;
            let end_point = RelationEndPointId::new(owner.id().clone(), property);
            Ok(ObjectCollection::read_only(
                data.original_collection_items(&end_point, events)?,
            ))
        })
    }

    /// Replaces a collection-valued relation by the stand-alone `collection`.
    ///
    /// `collection` becomes the end point's associated collection; the
    /// previous one becomes stand-alone, keeping its former contents.
    pub fn set_related_objects(
        &self,
        owner: &DomainObject,
        property: &str,
        collection: &ObjectCollection,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        let end_point = RelationEndPointId::new(owner.id().clone(), property);
        if let Some(associated) = collection.associated_end_point()? {
            if associated == end_point {
                return Ok(());
            }
            return Err(CoreError::invalid_argument(format!(
                "collection is already associated with {associated}"
            )));
        }
        let items = collection.to_vec()?;
        let weak = Rc::downgrade(&self.inner);
        let id = self.id();
        self.with_state(|data, events| {
            data.check_hierarchy(owner)?;
            let previous = data.collection_handle(&end_point, events)?;
            let previous_items = data.collection_items(&end_point, events)?;
            if !previous.can_transform() || !collection.can_transform() {
                return Err(CoreError::reentrancy("a collection is in use and cannot be replaced"));
            }

            let command = CommandFactory::new(data, events).set_items(&end_point, &items)?;
            execute(&command, data, events)?;

            previous.transform_to_stand_alone(previous_items)?;
            collection.transform_to_associated(end_point.clone(), weak, id)?;
            data.collection_end_point_mut(&end_point)?
                .replace_collection(collection.clone());
            debug!(tx = %id, end_point = %end_point, "collection replaced");
            Ok(())
        })
    }

    /// Deletes an object. Every relation it takes part in is cleared first.
    /// New objects are discarded immediately.
    pub fn delete_object(&self, object: &DomainObject) -> CoreResult<()> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            let command = CommandFactory::new(data, events).delete(object)?;
            execute(&command, data, events)?;
            debug!(tx = %data.transaction_id(), object = %object.id(), "object deleted");
            Ok(())
        })
    }

    /// Forces the `Changed` state on an unchanged object.
    pub fn mark_as_changed(&self, object: &DomainObject) -> CoreResult<()> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            data.check_hierarchy(object)?;
            data.mark_as_changed(object.id(), events)
        })
    }

    /// Drops the loaded contents of an unchanged collection so the next
    /// access reloads them.
    pub fn unload_collection(&self, owner: &DomainObject, property: &str) -> CoreResult<()> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            data.check_hierarchy(owner)?;
            data.unload_collection(&RelationEndPointId::new(owner.id().clone(), property), events)
        })
    }

    /// New, changed and deleted objects in registration order.
    pub fn changed_objects(&self) -> CoreResult<Vec<DomainObject>> {
        self.ensure_active()?;
        self.with_state(|data, _| Ok(data.changed_objects()))
    }

    /// Every object registered in this transaction.
    pub fn loaded_objects(&self) -> CoreResult<Vec<DomainObject>> {
        self.ensure_active()?;
        self.with_state(|data, _| {
            Ok(data
                .loaded_ids()
                .iter()
                .map(|id| data.domain_object(id.clone()))
                .collect())
        })
    }

    /// Returns true if commit has anything to do.
    pub fn has_changed(&self) -> CoreResult<bool> {
        Ok(!self.changed_objects()?.is_empty())
    }

    /// Creates a sub-transaction. This transaction is read-only until the
    /// sub-transaction is discarded.
    pub fn create_sub_transaction(&self) -> CoreResult<ClientTransaction> {
        self.ensure_active()?;
        if let Some(child) = self.sub_transaction() {
            return Err(CoreError::invalid_operation(format!(
                "transaction {} already has an active sub-transaction {}",
                self.id(),
                child.id()
            )));
        }
        if self.inner.depth >= self.inner.config.max_nesting_depth {
            return Err(CoreError::invalid_operation(format!(
                "sub-transactions cannot be nested deeper than {} levels",
                self.inner.config.max_nesting_depth
            )));
        }
        self.with_state(|data, events| {
            let view = TransactionView::new(data);
            events.notify(|l| l.sub_transaction_creating(&view))
        })?;

        let strategy: Rc<dyn PersistenceStrategy> = Rc::new(SubPersistenceStrategy::new(self.clone()));
        let child = Self::create(
            Some(self.clone()),
            self.inner.config,
            Arc::clone(&self.inner.mapping),
            strategy,
            ChangeDetection::OrderSensitive,
        );
        *self
            .inner
            .child
            .try_borrow_mut()
            .map_err(|_| CoreError::reentrancy("sub-transaction slot is in use"))? =
            Some(Rc::downgrade(&child.inner));

        let child_id = child.id();
        self.with_state(|data, events| {
            let view = TransactionView::new(data);
            events.broadcast(|l| l.sub_transaction_created(&view, child_id));
            Ok(())
        })?;
        debug!(tx = %self.id(), sub = %child_id, depth = child.depth(), "sub-transaction created");
        Ok(child)
    }

    /// Releases the transaction and, first, its active sub-transaction.
    ///
    /// Every object becomes unusable through this transaction. A parent
    /// becomes writable again. Discarding twice is a no-op.
    pub fn discard(&self) -> CoreResult<()> {
        if self.is_discarded() {
            return Ok(());
        }
        if let Some(child) = self.sub_transaction() {
            child.discard()?;
        }
        let id = self.id();
        self.with_state(|data, events| {
            data.discard_all();
            events.broadcast(|l| l.transaction_discarded(id));
            Ok(())
        })?;
        self.inner.discarded.set(true);
        if let Some(parent) = &self.inner.parent {
            parent.release_child(id);
        }
        debug!(tx = %id, "transaction discarded");
        Ok(())
    }

    fn release_child(&self, child: TransactionId) {
        if let Ok(mut slot) = self.inner.child.try_borrow_mut() {
            let current = slot.as_ref().and_then(Weak::upgrade);
            if current.map_or(true, |c| c.id == child) {
                *slot = None;
            }
        }
    }

    /// Commits every new, changed and deleted object.
    ///
    /// A root transaction writes to storage; a sub-transaction writes into
    /// its parent. On failure nothing is committed and the transaction is
    /// left as it was.
    pub fn commit(&self) -> CoreResult<()> {
        self.ensure_writable()?;
        let validate = self.inner.config.validate_mandatory_relations;
        self.with_state(|data, events| {
            let objects = data.changed_objects();
            let view = TransactionView::new(data);
            events.notify(|l| l.committing(&view, &objects))?;

            if validate {
                data.validate_mandatory_relations(&objects, events)?;
            }
            data.commit(&objects)?;

            let view = TransactionView::new(data);
            events.broadcast(|l| l.committed(&view, &objects));
            debug!(tx = %data.transaction_id(), objects = objects.len(), "transaction committed");
            Ok(())
        })
    }

    /// Reverts every object to its state at the last load or commit.
    pub fn rollback(&self) -> CoreResult<()> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            let objects = data.changed_objects();
            let view = TransactionView::new(data);
            events.notify(|l| l.rolling_back(&view, &objects))?;

            data.rollback()?;

            let view = TransactionView::new(data);
            events.broadcast(|l| l.rolled_back(&view, &objects));
            debug!(tx = %data.transaction_id(), objects = objects.len(), "transaction rolled back");
            Ok(())
        })
    }

    pub(crate) fn read_collection<R>(
        &self,
        end_point: &RelationEndPointId,
        f: impl FnOnce(&dyn CollectionData) -> CoreResult<R>,
    ) -> CoreResult<R> {
        self.ensure_active()?;
        self.with_state(|data, events| data.read_collection(end_point, events, f))
    }

    pub(crate) fn insert_into_collection(
        &self,
        end_point: &RelationEndPointId,
        index: usize,
        item: &DomainObject,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            let command = CommandFactory::new(data, events).insert(end_point, index, item)?;
            execute(&command, data, events)
        })
    }

    pub(crate) fn remove_from_collection(
        &self,
        end_point: &RelationEndPointId,
        item: &DomainObject,
    ) -> CoreResult<bool> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            let command = CommandFactory::new(data, events).remove(end_point, item)?;
            execute(&command, data, events)?;
            Ok(!command.is_empty())
        })
    }

    pub(crate) fn replace_in_collection(
        &self,
        end_point: &RelationEndPointId,
        index: usize,
        item: &DomainObject,
    ) -> CoreResult<()> {
        self.ensure_writable()?;
        self.with_state(|data, events| {
            let command = CommandFactory::new(data, events).replace(end_point, index, item)?;
            execute(&command, data, events)
        })
    }

    pub(crate) fn load_for_sub_transaction(&self, id: &ObjectId) -> CoreResult<LoadedObject> {
        self.ensure_active()?;
        self.with_state(|data, events| data.load_for_sub_transaction(id, events))
    }

    pub(crate) fn related_for_sub_transaction(
        &self,
        property: &str,
        owner: &ObjectId,
    ) -> CoreResult<Vec<ObjectId>> {
        self.ensure_active()?;
        self.with_state(|data, events| {
            data.related_for_sub_transaction(&RelationEndPointId::new(owner.clone(), property), events)
        })
    }

    pub(crate) fn merge_sub_transaction(&self, batch: &PersistBatch) -> CoreResult<Vec<PersistedObject>> {
        self.ensure_active()?;
        self.with_state(|data, events| data.merge_from_sub_transaction(batch, events))
    }
}

impl PartialEq for ClientTransaction {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for ClientTransaction {}

impl fmt::Debug for ClientTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientTransaction")
            .field("id", &self.inner.id)
            .field("parent", &self.inner.parent.as_ref().map(ClientTransaction::id))
            .field("depth", &self.inner.depth)
            .field("discarded", &self.inner.discarded.get())
            .finish()
    }
}
