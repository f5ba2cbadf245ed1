//! Associated and stand-alone object collections.

use relata_core::{
    ChangeDetection, ClassId, Config, CoreError, ElementType, ObjectCollection, ObjectState,
};
use relata_testkit::prelude::*;
use std::sync::Arc;

#[test]
fn same_handle_is_returned_until_replaced() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();

    let first = tx.related_objects(&order, "OrderItems").unwrap();
    let second = tx.related_objects(&order, "OrderItems").unwrap();

    assert!(first.ptr_eq(&second));
    assert_eq!(
        first.associated_end_point().unwrap().map(|e| e.property().to_string()),
        Some("OrderItems".to_string())
    );
}

#[test]
fn adding_through_collection_sets_foreign_key() {
    let env = TestEnvironment::new();
    let first = env.seed_order(1, 1);
    let second = env.seed_order(2, 0);
    let tx = env.transaction();

    let item = tx.get_object(&first.items[0]).unwrap();
    let target = tx.get_object(&second.order).unwrap();
    tx.related_objects(&target, "OrderItems").unwrap().add(item.clone()).unwrap();

    assert_eq!(tx.get_related(&item, "Order").unwrap(), Some(target));
    let source = tx.get_object(&first.order).unwrap();
    assert!(tx.related_objects(&source, "OrderItems").unwrap().is_empty().unwrap());
}

#[test]
fn duplicates_and_wrong_classes_are_rejected() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.get_object(&seeded.items[0]).unwrap();
    let customer = tx.get_object(&seeded.customer).unwrap();
    let items = tx.related_objects(&order, "OrderItems").unwrap();

    assert!(items.add(item).is_err());
    assert!(items.add(customer).is_err());
    assert_eq!(items.count().unwrap(), 1);
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Unchanged);
}

#[test]
fn collection_handlers_see_changes_from_the_other_side() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.get_object(&seeded.items[0]).unwrap();

    let recorder = EventRecorder::new();
    let items = tx.related_objects(&order, "OrderItems").unwrap();
    items.add_handler(recorder.clone()).unwrap();

    tx.set_related(&item, "Order", None).unwrap();

    assert_eq!(recorder.names(), vec!["removing", "removed"]);
    assert!(items.is_empty().unwrap());
}

#[test]
fn collection_handler_veto_aborts_the_command() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.get_object(&seeded.items[0]).unwrap();

    let recorder = EventRecorder::new();
    recorder.veto("removing");
    tx.related_objects(&order, "OrderItems").unwrap().add_handler(recorder).unwrap();

    assert!(matches!(
        tx.set_related(&item, "Order", None),
        Err(CoreError::Vetoed { .. })
    ));
    assert_eq!(tx.get_related(&item, "Order").unwrap(), Some(order));
}

#[test]
fn stand_alone_collection_checks_element_type() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let item = tx.get_object(&seeded.items[0]).unwrap();
    let customer = tx.get_object(&seeded.customer).unwrap();

    let element = ElementType::new(Arc::clone(&env.mapping), ClassId::new(classes::ORDER_ITEM)).unwrap();
    let collection = ObjectCollection::with_element_type(element);
    let recorder = EventRecorder::new();
    collection.add_handler(recorder.clone()).unwrap();

    collection.add(item.clone()).unwrap();
    assert!(collection.add(customer).is_err());
    assert_eq!(collection.to_vec().unwrap(), vec![item]);
    assert_eq!(recorder.names(), vec!["adding", "added"]);
}

#[test]
fn replacing_collection_swaps_association() {
    let env = TestEnvironment::new();
    let first = env.seed_order(1, 2);
    let second = env.seed_order(2, 1);
    let tx = env.transaction();

    let order = tx.get_object(&first.order).unwrap();
    let old_items: Vec<_> = first.items.iter().map(|id| tx.get_object(id).unwrap()).collect();
    let moved = tx.get_object(&second.items[0]).unwrap();
    let previous = tx.related_objects(&order, "OrderItems").unwrap();

    let replacement = ObjectCollection::from_objects(vec![old_items[1].clone(), moved.clone()]).unwrap();
    tx.set_related_objects(&order, "OrderItems", &replacement).unwrap();

    assert!(tx.related_objects(&order, "OrderItems").unwrap().ptr_eq(&replacement));
    assert!(replacement.associated_end_point().unwrap().is_some());
    assert!(previous.associated_end_point().unwrap().is_none());
    assert_eq!(previous.to_vec().unwrap(), old_items);

    assert_eq!(tx.get_related(&old_items[0], "Order").unwrap(), None);
    assert_eq!(tx.get_related(&moved, "Order").unwrap(), Some(order.clone()));
    let second_order = tx.get_object(&second.order).unwrap();
    assert!(tx.related_objects(&second_order, "OrderItems").unwrap().is_empty().unwrap());

    // The detached handle no longer affects the relation.
    previous.clear().unwrap();
    assert_eq!(replacement.count().unwrap(), 2);
}

#[test]
fn collection_associated_elsewhere_cannot_be_assigned() {
    let env = TestEnvironment::new();
    let first = env.seed_order(1, 1);
    let second = env.seed_order(2, 1);
    let tx = env.transaction();
    let order = tx.get_object(&first.order).unwrap();
    let other = tx.get_object(&second.order).unwrap();

    let foreign = tx.related_objects(&other, "OrderItems").unwrap();
    assert!(matches!(
        tx.set_related_objects(&order, "OrderItems", &foreign),
        Err(CoreError::InvalidArgument { .. })
    ));
}

#[test]
fn original_collection_is_read_only_snapshot() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.get_object(&seeded.items[0]).unwrap();

    tx.related_objects(&order, "OrderItems").unwrap().remove(&item).unwrap();

    let original = tx.original_related_objects(&order, "OrderItems").unwrap();
    assert!(original.is_read_only());
    assert_eq!(original.count().unwrap(), 2);
    assert!(original.add(item).is_err());
}

#[test]
fn modifying_during_iteration_is_detected() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let items = tx.related_objects(&order, "OrderItems").unwrap();

    let mut iter = items.iter();
    let first = iter.next().unwrap().unwrap();
    items.remove(&first).unwrap();

    assert!(matches!(iter.next(), Some(Err(CoreError::ConcurrentModification))));
    assert!(iter.next().is_none());
}

#[test]
fn collections_load_lazily() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 3);
    let storage = Arc::new(FailingStorage::new(Arc::clone(&env.storage)));
    let tx = relata_core::ClientTransaction::new_root(Arc::clone(&env.mapping), storage.clone());

    let order = tx.get_object(&seeded.order).unwrap();
    let items = tx.related_objects(&order, "OrderItems").unwrap();
    assert_eq!(storage.related_load_count(), 0);

    assert_eq!(items.count().unwrap(), 3);
    assert_eq!(storage.related_load_count(), 1);
    assert_eq!(items.count().unwrap(), 3);
    assert_eq!(storage.related_load_count(), 1);
}

#[test]
fn unloading_reloads_unchanged_collections_only() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let storage = Arc::new(FailingStorage::new(Arc::clone(&env.storage)));
    let tx = relata_core::ClientTransaction::new_root(Arc::clone(&env.mapping), storage.clone());
    let order = tx.get_object(&seeded.order).unwrap();
    let items = tx.related_objects(&order, "OrderItems").unwrap();
    assert_eq!(items.count().unwrap(), 2);

    env.seed(
        classes::ORDER_ITEM,
        vec![
            ("Position", 3.into()),
            ("Product", "Late".into()),
            ("Order", seeded.order.clone().into()),
        ],
    );
    tx.unload_collection(&order, "OrderItems").unwrap();
    assert_eq!(items.count().unwrap(), 3);
    assert_eq!(storage.related_load_count(), 2);

    let first = items.get(0).unwrap().unwrap();
    items.remove(&first).unwrap();
    assert!(matches!(
        tx.unload_collection(&order, "OrderItems"),
        Err(CoreError::InvalidOperation { .. })
    ));
}

#[test]
fn reordering_is_a_change_only_when_order_sensitive() {
    for (detection, expected) in [
        (ChangeDetection::SetBased, ObjectState::Unchanged),
        (ChangeDetection::OrderSensitive, ObjectState::Changed),
    ] {
        let env = TestEnvironment::with_config(Config::new().root_change_detection(detection));
        let seeded = env.seed_order(1, 2);
        let tx = env.transaction();
        let order = tx.get_object(&seeded.order).unwrap();
        let items = tx.related_objects(&order, "OrderItems").unwrap();

        let first = items.get(0).unwrap().unwrap();
        items.remove(&first).unwrap();
        items.add(first.clone()).unwrap();

        assert_eq!(tx.state(&order).unwrap(), expected, "{detection:?}");
        // The item left and rejoined the same order.
        assert_eq!(tx.state(&first).unwrap(), ObjectState::Unchanged);
    }
}

#[test]
fn rollback_restores_contents_and_order() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 3);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let items = tx.related_objects(&order, "OrderItems").unwrap();
    let before = items.to_vec().unwrap();

    let last = items.get(2).unwrap().unwrap();
    items.remove(&last).unwrap();
    items.insert(0, last).unwrap();
    let extra = tx.new_object(&ClassId::new(classes::ORDER_ITEM)).unwrap();
    items.add(extra.clone()).unwrap();

    tx.rollback().unwrap();

    let items = tx.related_objects(&order, "OrderItems").unwrap();
    assert_eq!(items.to_vec().unwrap(), before);
    assert_eq!(tx.state(&extra).unwrap(), ObjectState::Discarded);
    assert!(!tx.has_changed().unwrap());
}
