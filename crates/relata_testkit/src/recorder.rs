//! A transaction listener that records what it is told.

use relata_core::{
    ClassId, CollectionEventHandler, CoreError, CoreResult, DomainObject, ObjectId,
    PropertyChange, RelationChange, TransactionId, TransactionListener, TransactionView,
};
use std::cell::RefCell;
use std::rc::Rc;

/// Records transaction and collection events as short strings.
///
/// Clones share the same log, so a clone can be registered while the
/// original is kept for assertions. Events are formatted as
/// `"<event> <subject>"`, for example `"property_value_changed OrderNumber"`.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    log: Rc<RefCell<Vec<String>>>,
    veto: Rc<RefCell<Option<String>>>,
}

impl EventRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every recorded event in order.
    pub fn events(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    /// Returns the recorded events whose name is `event`.
    pub fn events_named(&self, event: &str) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|e| e.split(' ').next() == Some(event))
            .cloned()
            .collect()
    }

    /// Returns just the event names in order.
    pub fn names(&self) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .map(|e| e.split(' ').next().unwrap_or_default().to_string())
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        self.log.borrow_mut().clear();
    }

    /// Makes every later `<event>` notification fail with `Vetoed`.
    pub fn veto(&self, event: &str) {
        *self.veto.borrow_mut() = Some(event.to_string());
    }

    /// Stops vetoing.
    pub fn allow_all(&self) {
        *self.veto.borrow_mut() = None;
    }

    fn record(&self, event: &str, subject: impl std::fmt::Display) {
        self.log.borrow_mut().push(format!("{event} {subject}"));
    }

    fn check(&self, event: &str, subject: impl std::fmt::Display) -> CoreResult<()> {
        if self.veto.borrow().as_deref() == Some(event) {
            return Err(CoreError::vetoed(format!("{event} of {subject} vetoed")));
        }
        self.record(event, subject);
        Ok(())
    }
}

fn ids(ids: &[ObjectId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

fn objects(objects: &[DomainObject]) -> String {
    objects.len().to_string()
}

impl TransactionListener for EventRecorder {
    fn objects_loading(&mut self, _transaction: TransactionId, loading: &[ObjectId]) -> CoreResult<()> {
        self.check("objects_loading", ids(loading))
    }

    fn objects_loaded(&mut self, _transaction: TransactionId, loaded: &[ObjectId]) {
        self.record("objects_loaded", ids(loaded));
    }

    fn new_object_creating(&mut self, _view: &TransactionView<'_>, class: &ClassId) -> CoreResult<()> {
        self.check("new_object_creating", class)
    }

    fn new_object_created(&mut self, _view: &TransactionView<'_>, object: &DomainObject) {
        self.record("new_object_created", object.id());
    }

    fn object_deleting(&mut self, _view: &TransactionView<'_>, object: &DomainObject) -> CoreResult<()> {
        self.check("object_deleting", object.id())
    }

    fn object_deleted(&mut self, _view: &TransactionView<'_>, object: &DomainObject) {
        self.record("object_deleted", object.id());
    }

    fn property_value_changing(&mut self, _view: &TransactionView<'_>, change: &PropertyChange) -> CoreResult<()> {
        self.check("property_value_changing", &change.property)
    }

    fn property_value_changed(&mut self, _view: &TransactionView<'_>, change: &PropertyChange) {
        self.record("property_value_changed", &change.property);
    }

    fn relation_changing(&mut self, _view: &TransactionView<'_>, change: &RelationChange) -> CoreResult<()> {
        self.check("relation_changing", &change.end_point)
    }

    fn relation_changed(&mut self, _view: &TransactionView<'_>, change: &RelationChange) {
        self.record("relation_changed", &change.end_point);
    }

    fn committing(&mut self, _view: &TransactionView<'_>, committed: &[DomainObject]) -> CoreResult<()> {
        self.check("committing", objects(committed))
    }

    fn committed(&mut self, _view: &TransactionView<'_>, committed: &[DomainObject]) {
        self.record("committed", objects(committed));
    }

    fn rolling_back(&mut self, _view: &TransactionView<'_>, reverted: &[DomainObject]) -> CoreResult<()> {
        self.check("rolling_back", objects(reverted))
    }

    fn rolled_back(&mut self, _view: &TransactionView<'_>, reverted: &[DomainObject]) {
        self.record("rolled_back", objects(reverted));
    }

    fn sub_transaction_creating(&mut self, view: &TransactionView<'_>) -> CoreResult<()> {
        self.check("sub_transaction_creating", view.transaction_id())
    }

    fn sub_transaction_created(&mut self, _view: &TransactionView<'_>, sub_transaction: TransactionId) {
        self.record("sub_transaction_created", sub_transaction);
    }

    fn transaction_discarded(&mut self, transaction: TransactionId) {
        self.record("transaction_discarded", transaction);
    }
}

impl CollectionEventHandler for EventRecorder {
    fn adding(&mut self, object: &DomainObject) -> CoreResult<()> {
        self.check("adding", object.id())
    }

    fn added(&mut self, object: &DomainObject) {
        self.record("added", object.id());
    }

    fn removing(&mut self, object: &DomainObject) -> CoreResult<()> {
        self.check("removing", object.id())
    }

    fn removed(&mut self, object: &DomainObject) {
        self.record("removed", object.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_log() {
        let recorder = EventRecorder::new();
        let mut clone = recorder.clone();
        clone.transaction_discarded(TransactionId(3));
        assert_eq!(recorder.events(), vec!["transaction_discarded tx:3".to_string()]);
    }

    #[test]
    fn veto_rejects_named_event_only() {
        let recorder = EventRecorder::new();
        recorder.veto("adding");
        let mut handler = recorder.clone();
        let object = ObjectId::new("Order");
        assert!(handler.objects_loading(TransactionId(1), &[object]).is_ok());
        assert_eq!(recorder.names(), vec!["objects_loading".to_string()]);
        recorder.allow_all();
        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
