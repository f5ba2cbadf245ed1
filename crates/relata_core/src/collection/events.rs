//! Per-collection add/remove notifications.

use crate::error::{CoreError, CoreResult};
use crate::object::DomainObject;
use std::cell::RefCell;
use std::fmt;

/// Observer of one collection's membership changes.
///
/// `adding` and `removing` run before the change and may veto it by
/// returning an error. `added` and `removed` run after it.
pub trait CollectionEventHandler {
    /// An object is about to be added.
    fn adding(&mut self, object: &DomainObject) -> CoreResult<()> {
        let _ = object;
        Ok(())
    }

    /// An object was added.
    fn added(&mut self, object: &DomainObject) {
        let _ = object;
    }

    /// An object is about to be removed.
    fn removing(&mut self, object: &DomainObject) -> CoreResult<()> {
        let _ = object;
        Ok(())
    }

    /// An object was removed.
    fn removed(&mut self, object: &DomainObject) {
        let _ = object;
    }
}

/// Handlers registered on one collection handle.
#[derive(Default)]
pub struct CollectionEvents {
    handlers: RefCell<Vec<Box<dyn CollectionEventHandler>>>,
}

impl CollectionEvents {
    /// Creates an empty handler list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler.
    pub fn add_handler(&self, handler: Box<dyn CollectionEventHandler>) -> CoreResult<()> {
        self.handlers
            .try_borrow_mut()
            .map_err(|_| CoreError::reentrancy("collection handlers are being notified"))?
            .push(handler);
        Ok(())
    }

    /// Returns the number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.try_borrow().map_or(0, |h| h.len())
    }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn before(
        &self,
        f: impl Fn(&mut dyn CollectionEventHandler) -> CoreResult<()>,
    ) -> CoreResult<()> {
        let mut handlers = self
            .handlers
            .try_borrow_mut()
            .map_err(|_| CoreError::reentrancy("collection modified from its own event handler"))?;
        for handler in handlers.iter_mut() {
            f(handler.as_mut())?;
        }
        Ok(())
    }

    fn after(&self, f: impl Fn(&mut dyn CollectionEventHandler)) {
        match self.handlers.try_borrow_mut() {
            Ok(mut handlers) => handlers.iter_mut().for_each(|h| f(h.as_mut())),
            Err(_) => tracing::warn!("skipping nested collection notification"),
        }
    }

    pub(crate) fn begin_add(&self, object: &DomainObject) -> CoreResult<()> {
        self.before(|h| h.adding(object))
    }

    pub(crate) fn end_add(&self, object: &DomainObject) {
        self.after(|h| h.added(object));
    }

    pub(crate) fn begin_remove(&self, object: &DomainObject) -> CoreResult<()> {
        self.before(|h| h.removing(object))
    }

    pub(crate) fn end_remove(&self, object: &DomainObject) {
        self.after(|h| h.removed(object));
    }
}

impl fmt::Debug for CollectionEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionEvents")
            .field("handlers", &self.len())
            .finish()
    }
}
