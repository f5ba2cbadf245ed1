use super::events::CollectionEvents;
use super::CollectionData;
use crate::endpoint::RelationEndPointId;
use crate::error::CoreResult;
use crate::object::{ClassId, DomainObject, ObjectId};
use std::rc::Rc;

/// Brackets every mutation of a stand-alone collection with its
/// adding/added or removing/removed notifications.
#[derive(Debug)]
pub struct EventRaisingCollectionData<D> {
    inner: D,
    events: Rc<CollectionEvents>,
}

impl<D: CollectionData> EventRaisingCollectionData<D> {
    /// Wraps `inner`, notifying the handlers in `events`.
    pub fn new(inner: D, events: Rc<CollectionEvents>) -> Self {
        Self { inner, events }
    }
}

impl<D: CollectionData> CollectionData for EventRaisingCollectionData<D> {
    delegate_reads!();

    fn required_class(&self) -> Option<&ClassId> {
        self.inner.required_class()
    }

    fn insert(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        self.events.begin_add(&object)?;
        self.inner.insert(index, object.clone())?;
        self.events.end_add(&object);
        Ok(())
    }

    fn remove(&mut self, object: &DomainObject) -> CoreResult<bool> {
        self.remove_id(object.id())
    }

    fn remove_id(&mut self, id: &ObjectId) -> CoreResult<bool> {
        let Some(member) = self.inner.get_by_id(id)? else {
            return Ok(false);
        };
        self.events.begin_remove(&member)?;
        let removed = self.inner.remove_id(id)?;
        self.events.end_remove(&member);
        Ok(removed)
    }

    fn replace(&mut self, index: usize, object: DomainObject) -> CoreResult<()> {
        let old = match self.inner.get(index)? {
            Some(old) if old.id() == object.id() => return Ok(()),
            Some(old) => old,
            None => return self.inner.replace(index, object),
        };
        self.events.begin_remove(&old)?;
        self.events.begin_add(&object)?;
        self.inner.replace(index, object.clone())?;
        self.events.end_remove(&old);
        self.events.end_add(&object);
        Ok(())
    }

    fn clear(&mut self) -> CoreResult<()> {
        let members = self.inner.to_vec()?;
        for member in &members {
            self.events.begin_remove(member)?;
        }
        self.inner.clear()?;
        for member in &members {
            self.events.end_remove(member);
        }
        Ok(())
    }
}
