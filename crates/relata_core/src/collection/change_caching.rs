use super::store::DomainObjectCollectionData;
use super::CollectionData;
use crate::error::CoreResult;
use crate::object::{ClassId, DomainObject, ObjectId};
use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

/// How a collection's current contents are compared to its original ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChangeDetection {
    /// Any difference in membership or order counts as a change.
    #[default]
    OrderSensitive,
    /// Only membership counts; reordering is not a change.
    SetBased,
}

impl ChangeDetection {
    /// Compares current IDs with the original snapshot.
    #[must_use]
    pub fn has_changed(self, current: &[ObjectId], original: &[DomainObject]) -> bool {
        if current.len() != original.len() {
            return true;
        }
        match self {
            Self::OrderSensitive => current
                .iter()
                .zip(original)
                .any(|(id, object)| id != object.id()),
            Self::SetBased => {
                let original: HashSet<&ObjectId> = original.iter().map(DomainObject::id).collect();
                current.iter().any(|id| !original.contains(id))
            }
        }
    }
}

/// Holds current contents next to an immutable snapshot of the original
/// ones and memoizes the change-detection result.
#[derive(Debug)]
pub struct ChangeCachingCollectionData {
    current: DomainObjectCollectionData,
    original: Rc<[DomainObject]>,
    cached: Cell<Option<(ChangeDetection, bool)>>,
}

impl ChangeCachingCollectionData {
    /// Creates data whose current and original contents are `items`.
    pub fn new(items: Vec<DomainObject>) -> Self {
        let current = DomainObjectCollectionData::from_objects(items);
        let original: Rc<[DomainObject]> = current.to_vec().unwrap_or_default().into();
        Self {
            current,
            original,
            cached: Cell::new(Some((ChangeDetection::OrderSensitive, false))),
        }
    }

    /// Contents as of the last load or commit.
    #[must_use]
    pub fn original_data(&self) -> &[DomainObject] {
        &self.original
    }

    /// IDs of the current contents.
    #[must_use]
    pub fn current_ids(&self) -> &[ObjectId] {
        self.current.ids()
    }

    /// Returns true if the current contents differ from the original ones.
    #[must_use]
    pub fn has_changed(&self, detection: ChangeDetection) -> bool {
        if let Some((cached_with, changed)) = self.cached.get() {
            if cached_with == detection {
                return changed;
            }
        }
        let changed = detection.has_changed(self.current.ids(), &self.original);
        self.cached.set(Some((detection, changed)));
        changed
    }

    /// Accepts the current contents as original.
    pub fn commit(&mut self) {
        if let Ok(items) = self.current.to_vec() {
            self.original = items.into();
        }
        self.cached.set(Some((ChangeDetection::OrderSensitive, false)));
    }

    /// Replaces the current contents without touching the original snapshot.
    pub fn replace_contents(&mut self, items: Vec<DomainObject>) {
        let version = self.current.version().unwrap_or_default();
        let mut current = DomainObjectCollectionData::from_objects(items);
        current.set_version(version.wrapping_add(1));
        self.current = current;
        self.invalidate();
    }

    /// Restores the original contents.
    pub fn rollback(&mut self) {
        let original = self.original.to_vec();
        self.replace_contents(original);
        self.cached.set(Some((ChangeDetection::OrderSensitive, false)));
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.current.set_version(version);
    }

    fn invalidate(&self) {
        self.cached.set(None);
    }
}

impl CollectionData for ChangeCachingCollectionData {
    fn version(&self) -> CoreResult<u64> {
        self.current.version()
    }

    fn count(&self) -> CoreResult<usize> {
        self.current.count()
    }

    fn get(&self, index: usize) -> CoreResult<Option<DomainObject>> {
        self.current.get(index)
    }

    fn index_of(&self, id: &ObjectId) -> CoreResult<Option<usize>> {
        self.current.index_of(id)
    }

    fn contains(&self, id: &ObjectId) -> CoreResult<bool> {
        self.current.contains(id)
    }

    fn get_by_id(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
        self.current.get_by_id(id)
    }

    fn to_vec(&self) -> CoreResult<Vec<DomainObject>> {
        self.current.to_vec()
    }

    fn required_class(&self) -> Option<&ClassId> {
        None
    }

    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.invalidate();
        self.current.insert(index, object)
    }

    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool> {
        self.invalidate();
        self.current.remove_id(id)
    }

    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.invalidate();
        self.current.replace(index, object)
    }

    fn clear(&mut self) -> CoreResult<()> {
        self.invalidate();
        self.current.clear()
    }
}
