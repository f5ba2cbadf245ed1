use super::CollectionData;
use crate::error::{CoreError, CoreResult};
use crate::object::{DomainObject, ObjectId};
use std::collections::HashMap;

/// Innermost collection storage: an ordered list of IDs plus an ID lookup.
///
/// Performs no argument checks beyond index bounds. Every mutation bumps
/// the version.
#[derive(Debug, Clone, Default)]
pub struct DomainObjectCollectionData {
    order: Vec<ObjectId>,
    objects: HashMap<ObjectId, DomainObject>,
    version: u64,
}

impl DomainObjectCollectionData {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `items`. Later duplicates are dropped.
    pub fn from_objects(items: impl IntoIterator<Item = DomainObject>) -> Self {
        let mut store = Self::new();
        for item in items {
            if !store.objects.contains_key(item.id()) {
                store.order.push(item.id().clone());
                store.objects.insert(item.id().clone(), item);
            }
        }
        store
    }

    /// Returns the IDs in collection order.
    #[must_use]
    pub fn ids(&self) -> &[ObjectId] {
        &self.order
    }

    pub(crate) fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}

impl CollectionData for DomainObjectCollectionData {
    fn version(&self) -> CoreResult<u64> {
        Ok(self.version)
    }

    fn count(&self) -> CoreResult<usize> {
        Ok(self.order.len())
    }

    fn get(&self, index: usize) -> CoreResult<Option<DomainObject>> {
        Ok(self
            .order
            .get(index)
            .and_then(|id| self.objects.get(id))
            .cloned())
    }

    fn index_of(&self, id: &ObjectId) -> CoreResult<Option<usize>> {
        if !self.objects.contains_key(id) {
            return Ok(None);
        }
        Ok(self.order.iter().position(|candidate| candidate == id))
    }

    fn contains(&self, id: &ObjectId) -> CoreResult<bool> {
        Ok(self.objects.contains_key(id))
    }

    fn get_by_id(&self, id: &ObjectId) -> CoreResult<Option<DomainObject>> {
        Ok(self.objects.get(id).cloned())
    }

    fn to_vec(&self) -> CoreResult<Vec<DomainObject>> {
        Ok(self
            .order
            .iter()
            .filter_map(|id| self.objects.get(id).cloned())
            .collect())
    }

    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        if index > self.order.len() {
            return Err(CoreError::invalid_argument(format!(
                "insert index {index} out of range 0..={}",
                self.order.len()
            )));
        }
        self.order.insert(index, object.id().clone());
        self.objects.insert(object.id().clone(), object);
        self.bump();
        Ok(())
    }

    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool> {
        if self.objects.remove(id).is_none() {
            return Ok(false);
        }
        self.order.retain(|candidate| candidate != id);
        self.bump();
        Ok(true)
    }

    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        let Some(old) = self.order.get(index).cloned() else {
            return Err(CoreError::invalid_argument(format!(
                "replace index {index} out of range 0..{}",
                self.order.len()
            )));
        };
        if old == *object.id() {
            return Ok(());
        }
        self.objects.remove(&old);
        self.order[index] = object.id().clone();
        self.objects.insert(object.id().clone(), object);
        self.bump();
        Ok(())
    }

    fn clear(&mut self) -> CoreResult<()> {
        if !self.order.is_empty() {
            self.order.clear();
            self.objects.clear();
            self.bump();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::test_support::objects;

    #[test]
    fn insert_and_lookup() {
        let items = objects("OrderItem", 3);
        let mut store = DomainObjectCollectionData::new();
        for (i, item) in items.iter().enumerate() {
            store.insert(i, item.clone()).unwrap();
        }
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.index_of(items[1].id()).unwrap(), Some(1));
        assert_eq!(store.get(2).unwrap().as_ref(), Some(&items[2]));
        assert_eq!(store.version().unwrap(), 3);
    }

    #[test]
    fn removing_absent_is_noop() {
        let items = objects("OrderItem", 2);
        let mut store = DomainObjectCollectionData::from_objects(items[..1].to_vec());
        let version = store.version().unwrap();
        assert!(!store.remove_id(items[1].id()).unwrap());
        assert_eq!(store.version().unwrap(), version);
    }

    #[test]
    fn replace_with_self_keeps_version() {
        let items = objects("OrderItem", 1);
        let mut store = DomainObjectCollectionData::from_objects(items.clone());
        store.replace(0, items[0].clone()).unwrap();
        assert_eq!(store.version().unwrap(), 0);
    }

    #[test]
    fn clear_empty_keeps_version() {
        let mut store = DomainObjectCollectionData::new();
        store.clear().unwrap();
        assert_eq!(store.version().unwrap(), 0);
    }

    #[test]
    fn insert_out_of_range() {
        let mut store = DomainObjectCollectionData::new();
        let item = objects("OrderItem", 1).remove(0);
        assert!(store.insert(1, item).is_err());
    }
}
