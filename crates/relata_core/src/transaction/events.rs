//! Listener and extension dispatch.

use super::listener::TransactionListener;
use crate::error::{CoreError, CoreResult};
use crate::object::ObjectId;
use crate::types::TransactionId;
use std::fmt;
use tracing::warn;

/// Extensions registered on a transaction, keyed by name.
///
/// Extensions receive the same notifications as listeners, after all
/// listeners, in registration order.
#[derive(Default)]
pub struct ExtensionCollection {
    entries: Vec<(String, Box<dyn TransactionListener>)>,
}

impl ExtensionCollection {
    /// Registers an extension under `key`. Fails if the key is taken.
    pub fn add(&mut self, key: impl Into<String>, extension: Box<dyn TransactionListener>) -> CoreResult<()> {
        let key = key.into();
        if self.contains(&key) {
            return Err(CoreError::invalid_argument(format!(
                "an extension with key '{key}' is already registered"
            )));
        }
        self.entries.push((key, extension));
        Ok(())
    }

    /// Removes the extension registered under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Box<dyn TransactionListener>> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Returns true if `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Registered keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Returns the number of extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no extension is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn TransactionListener>> {
        self.entries.iter_mut().map(|(_, e)| e)
    }
}

impl fmt::Debug for ExtensionCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.keys()).finish()
    }
}

/// Listeners followed by extensions.
#[derive(Default)]
pub(crate) struct EventDispatcher {
    listeners: Vec<Box<dyn TransactionListener>>,
    extensions: ExtensionCollection,
}

impl EventDispatcher {
    pub(crate) fn add_listener(&mut self, listener: Box<dyn TransactionListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn extensions(&self) -> &ExtensionCollection {
        &self.extensions
    }

    pub(crate) fn extensions_mut(&mut self) -> &mut ExtensionCollection {
        &mut self.extensions
    }

    /// Sends a vetoable notification. The first error stops delivery.
    pub(crate) fn notify(
        &mut self,
        mut f: impl FnMut(&mut dyn TransactionListener) -> CoreResult<()>,
    ) -> CoreResult<()> {
        for listener in self.listeners.iter_mut().chain(self.extensions.iter_mut()) {
            if let Err(e) = f(listener.as_mut()) {
                warn!(error = %e, "operation vetoed by observer");
                return Err(e);
            }
        }
        Ok(())
    }

    /// Sends a notification to everyone.
    pub(crate) fn broadcast(&mut self, mut f: impl FnMut(&mut dyn TransactionListener)) {
        for listener in self.listeners.iter_mut().chain(self.extensions.iter_mut()) {
            f(listener.as_mut());
        }
    }

    pub(crate) fn objects_loading(&mut self, transaction: TransactionId, ids: &[ObjectId]) -> CoreResult<()> {
        self.notify(|l| l.objects_loading(transaction, ids))
    }

    pub(crate) fn objects_loaded(&mut self, transaction: TransactionId, ids: &[ObjectId]) {
        self.broadcast(|l| l.objects_loaded(transaction, ids));
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .field("extensions", &self.extensions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Named(&'static str, Rc<RefCell<Vec<&'static str>>>, bool);

    impl TransactionListener for Named {
        fn objects_loading(&mut self, _tx: TransactionId, _ids: &[ObjectId]) -> CoreResult<()> {
            self.1.borrow_mut().push(self.0);
            if self.2 {
                return Err(CoreError::vetoed(self.0));
            }
            Ok(())
        }
    }

    #[test]
    fn extensions_run_after_listeners() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut events = EventDispatcher::default();
        events
            .extensions_mut()
            .add("ext", Box::new(Named("ext", Rc::clone(&log), false)))
            .unwrap();
        events.add_listener(Box::new(Named("listener", Rc::clone(&log), false)));
        events.objects_loading(TransactionId::new(1), &[]).unwrap();
        assert_eq!(*log.borrow(), ["listener", "ext"]);
    }

    #[test]
    fn veto_stops_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut events = EventDispatcher::default();
        events.add_listener(Box::new(Named("first", Rc::clone(&log), true)));
        events.add_listener(Box::new(Named("second", Rc::clone(&log), false)));
        let result = events.objects_loading(TransactionId::new(1), &[]);
        assert!(matches!(result, Err(CoreError::Vetoed { .. })));
        assert_eq!(*log.borrow(), ["first"]);
    }

    #[test]
    fn duplicate_extension_key_is_rejected() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut extensions = ExtensionCollection::default();
        extensions
            .add("audit", Box::new(Named("a", Rc::clone(&log), false)))
            .unwrap();
        assert!(extensions
            .add("audit", Box::new(Named("b", Rc::clone(&log), false)))
            .is_err());
        assert!(extensions.remove("audit").is_some());
        assert!(extensions.is_empty());
    }
}
