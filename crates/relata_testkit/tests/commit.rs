//! Root commit and rollback against storage.

use relata_core::{ClassId, ClientTransaction, Config, CoreError, ObjectState, StorageProvider, Value};
use relata_testkit::prelude::*;
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("relata_core=debug")
        .with_test_writer()
        .try_init();
}

fn failing(env: &TestEnvironment, config: Config) -> (Arc<FailingStorage>, ClientTransaction) {
    let storage = Arc::new(FailingStorage::new(Arc::clone(&env.storage)));
    let provider: Arc<dyn StorageProvider> = storage.clone();
    let tx = ClientTransaction::with_config(Arc::clone(&env.mapping), provider, config);
    (storage, tx)
}

#[test]
fn commit_writes_inserts_updates_and_deletes() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let tx = env.transaction();

    let order = tx.get_object(&seeded.order).unwrap();
    tx.set_value(&order, "DeliveryDate", "2026-11-01").unwrap();
    let doomed = tx.get_object(&seeded.items[0]).unwrap();
    tx.delete_object(&doomed).unwrap();
    let added = tx.new_object(&ClassId::new(classes::ORDER_ITEM)).unwrap();
    tx.set_value(&added, "Product", "Gadget").unwrap();
    tx.set_related(&added, "Order", Some(&order)).unwrap();

    tx.commit().unwrap();

    assert!(env.stored(&seeded.items[0]).is_none());
    let stored_order = env.stored(&seeded.order).unwrap();
    assert_eq!(stored_order.value("DeliveryDate"), Some(&Value::from("2026-11-01")));
    let stored_item = env.stored(added.id()).unwrap();
    assert_eq!(stored_item.value("Product"), Some(&Value::from("Gadget")));
    assert_eq!(stored_item.value("Order"), Some(&Value::Object(seeded.order.clone())));

    assert_eq!(tx.state(&order).unwrap(), ObjectState::Unchanged);
    assert_eq!(tx.state(&added).unwrap(), ObjectState::Unchanged);
    assert_eq!(tx.state(&doomed).unwrap(), ObjectState::Discarded);
    assert!(!tx.has_changed().unwrap());
}

#[test]
fn committed_state_is_visible_to_new_transactions() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.new_object(&ClassId::new(classes::ORDER_ITEM)).unwrap();
    tx.related_objects(&order, "OrderItems").unwrap().add(item.clone()).unwrap();
    tx.commit().unwrap();

    let reader = env.transaction();
    let order = reader.get_object(&seeded.order).unwrap();
    let items = reader.related_objects(&order, "OrderItems").unwrap();
    assert_eq!(items.count().unwrap(), 2);
    assert!(items.contains(item.id()).unwrap());
}

#[test]
fn repeated_commits_track_new_timestamps() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();

    tx.set_value(&order, "OrderNumber", 2).unwrap();
    tx.commit().unwrap();
    tx.set_value(&order, "OrderNumber", 3).unwrap();
    tx.commit().unwrap();

    assert_eq!(env.stored(&seeded.order).unwrap().value("OrderNumber"), Some(&Value::Integer(3)));
}

#[test]
fn stale_update_is_a_concurrency_violation() {
    init_tracing();
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let first = env.transaction();
    let second = env.transaction();
    let order_in_first = first.get_object(&seeded.order).unwrap();
    let order_in_second = second.get_object(&seeded.order).unwrap();

    first.set_value(&order_in_first, "OrderNumber", 10).unwrap();
    first.commit().unwrap();
    second.set_value(&order_in_second, "OrderNumber", 20).unwrap();

    let result = second.commit();
    assert!(matches!(result, Err(CoreError::ConcurrencyViolation { id }) if id == seeded.order));
    assert_eq!(env.stored(&seeded.order).unwrap().value("OrderNumber"), Some(&Value::Integer(10)));
    assert_eq!(second.state(&order_in_second).unwrap(), ObjectState::Changed);
}

#[test]
fn rejected_batch_keeps_changes_pending() {
    init_tracing();
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let (storage, tx) = failing(&env, Config::default());
    storage.reject_class(classes::ORDER_ITEM);

    let order = tx.get_object(&seeded.order).unwrap();
    tx.set_value(&order, "OrderNumber", 9).unwrap();
    let item = tx.new_object(&ClassId::new(classes::ORDER_ITEM)).unwrap();
    tx.set_related(&item, "Order", Some(&order)).unwrap();

    let result = tx.commit();
    let Err(CoreError::Persist { failures }) = result else {
        panic!("expected a persist error, got {result:?}");
    };
    assert_eq!(failures.len(), 1);
    assert_eq!(&failures[0].object, item.id());
    assert_eq!(env.stored(&seeded.order).unwrap().value("OrderNumber"), Some(&Value::Integer(1)));
    assert!(env.stored(item.id()).is_none());
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Changed);
    assert_eq!(tx.state(&item).unwrap(), ObjectState::New);

    storage.accept_all();
    tx.commit().unwrap();
    assert_eq!(storage.persist_count(), 2);
    assert!(env.stored(item.id()).is_some());
}

#[test]
fn mandatory_relation_must_be_set() {
    let env = TestEnvironment::new();
    let tx = env.transaction();
    let ticket = tx.new_object(&ClassId::new(classes::ORDER_TICKET)).unwrap();

    let result = tx.commit();
    assert!(matches!(
        result,
        Err(CoreError::MandatoryRelationNotSet { end_point })
            if end_point.object_id() == ticket.id() && end_point.property() == "Order"
    ));
    assert!(env.storage.is_empty());

    let order = tx.new_object(&ClassId::new(classes::ORDER)).unwrap();
    tx.set_related(&ticket, "Order", Some(&order)).unwrap();
    tx.commit().unwrap();
    assert_eq!(env.storage.len(), 2);
}

#[test]
fn validation_can_be_turned_off() {
    let env = TestEnvironment::with_config(Config::new().validate_mandatory_relations(false));
    let tx = env.transaction();
    let ticket = tx.new_object(&ClassId::new(classes::ORDER_TICKET)).unwrap();

    tx.commit().unwrap();
    assert!(env.stored(ticket.id()).is_some());
}

#[test]
fn committing_fires_events_and_can_be_vetoed() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();
    let order = tx.get_object(&seeded.order).unwrap();
    tx.set_value(&order, "OrderNumber", 2).unwrap();

    recorder.veto("committing");
    assert!(matches!(tx.commit(), Err(CoreError::Vetoed { .. })));
    assert_eq!(env.stored(&seeded.order).unwrap().value("OrderNumber"), Some(&Value::Integer(1)));

    recorder.allow_all();
    recorder.clear();
    tx.commit().unwrap();
    assert_eq!(recorder.events(), vec!["committing 1", "committed 1"]);
}

#[test]
fn marked_object_is_written_without_changes() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let (storage, tx) = failing(&env, Config::default());
    let order = tx.get_object(&seeded.order).unwrap();
    let before = env.stored(&seeded.order).unwrap().timestamp;

    tx.mark_as_changed(&order).unwrap();
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Changed);
    tx.commit().unwrap();

    assert_eq!(storage.persist_count(), 1);
    assert!(env.stored(&seeded.order).unwrap().timestamp > before);
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Unchanged);
}

#[test]
fn commit_without_changes_skips_storage() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let (storage, tx) = failing(&env, Config::default());
    let order = tx.get_object(&seeded.order).unwrap();
    tx.related_objects(&order, "OrderItems").unwrap().count().unwrap();

    tx.commit().unwrap();
    assert_eq!(storage.persist_count(), 0);
}

#[test]
fn rollback_revives_deleted_objects() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.get_object(&seeded.items[1]).unwrap();

    tx.delete_object(&item).unwrap();
    recorder.clear();
    tx.rollback().unwrap();

    assert_eq!(tx.state(&item).unwrap(), ObjectState::Unchanged);
    assert_eq!(tx.get_related(&item, "Order").unwrap(), Some(order.clone()));
    let items = tx.related_objects(&order, "OrderItems").unwrap();
    assert_eq!(items.get(1).unwrap(), Some(item));
    assert_eq!(recorder.names(), vec!["rolling_back", "rolled_back"]);
}

#[test]
fn load_failures_surface_as_storage_errors() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let (storage, tx) = failing(&env, Config::default());
    storage.fail_loads(true);

    assert!(matches!(
        tx.get_object(&seeded.order),
        Err(CoreError::Storage { .. })
    ));
    storage.fail_loads(false);
    tx.get_object(&seeded.order).unwrap();
}
