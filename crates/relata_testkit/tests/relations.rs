//! Bidirectional relation consistency.

use relata_core::{ClassId, CoreError, ObjectState, Value};
use relata_testkit::prelude::*;

#[test]
fn moving_item_updates_both_collections() {
    let env = TestEnvironment::new();
    let first = env.seed_order(1, 2);
    let second = env.seed_order(2, 1);
    let tx = env.transaction();

    let item = tx.get_object(&first.items[0]).unwrap();
    let target = tx.get_object(&second.order).unwrap();
    tx.set_related(&item, "Order", Some(&target)).unwrap();

    let source = tx.get_object(&first.order).unwrap();
    let source_items = tx.related_objects(&source, "OrderItems").unwrap();
    let target_items = tx.related_objects(&target, "OrderItems").unwrap();
    assert_eq!(source_items.count().unwrap(), 1);
    assert!(!source_items.contains(item.id()).unwrap());
    assert_eq!(target_items.count().unwrap(), 2);
    assert_eq!(target_items.get(1).unwrap(), Some(item.clone()));
    assert_eq!(tx.get_related(&item, "Order").unwrap(), Some(target.clone()));

    assert_eq!(tx.state(&item).unwrap(), ObjectState::Changed);
    assert_eq!(tx.state(&source).unwrap(), ObjectState::Changed);
    assert_eq!(tx.state(&target).unwrap(), ObjectState::Changed);
    assert_eq!(
        tx.get_original_related(&item, "Order").unwrap().map(|o| o.id().clone()),
        Some(first.order.clone())
    );
}

#[test]
fn one_to_one_reassignment_touches_four_end_points() {
    let env = TestEnvironment::new();
    let first = env.seed_order(1, 0);
    let second = env.seed_order(2, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();

    let order = tx.get_object(&first.order).unwrap();
    let other_order = tx.get_object(&second.order).unwrap();
    let old_ticket = tx.get_object(&first.ticket).unwrap();
    let new_ticket = tx.get_object(&second.ticket).unwrap();
    recorder.clear();

    tx.set_related(&order, "OrderTicket", Some(&new_ticket)).unwrap();

    assert_eq!(tx.get_related(&order, "OrderTicket").unwrap(), Some(new_ticket.clone()));
    assert_eq!(tx.get_related(&new_ticket, "Order").unwrap(), Some(order.clone()));
    assert_eq!(tx.get_related(&old_ticket, "Order").unwrap(), None);
    assert_eq!(tx.get_related(&other_order, "OrderTicket").unwrap(), None);

    assert_eq!(recorder.events_named("relation_changing").len(), 4);
    assert_eq!(recorder.events_named("relation_changed").len(), 4);
    let names = recorder.names();
    let last_changing = names.iter().rposition(|n| n == "relation_changing").unwrap();
    let first_changed = names.iter().position(|n| n == "relation_changed").unwrap();
    assert!(last_changing < first_changed);
}

#[test]
fn setting_same_partner_is_a_no_op() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();

    let item = tx.get_object(&seeded.items[0]).unwrap();
    let order = tx.get_object(&seeded.order).unwrap();
    recorder.clear();
    tx.set_related(&item, "Order", Some(&order)).unwrap();

    assert!(recorder.events_named("relation_changing").is_empty());
    assert_eq!(tx.state(&item).unwrap(), ObjectState::Unchanged);
}

#[test]
fn wrong_class_is_rejected() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();

    let item = tx.get_object(&seeded.items[0]).unwrap();
    let customer = tx.get_object(&seeded.customer).unwrap();

    let result = tx.set_related(&item, "Order", Some(&customer));
    assert!(matches!(result, Err(CoreError::InvalidArgument { .. })));
    assert_eq!(
        tx.get_related(&item, "Order").unwrap().map(|o| o.id().clone()),
        Some(seeded.order.clone())
    );
}

#[test]
fn new_objects_relate_in_both_directions() {
    let env = TestEnvironment::new();
    let tx = env.transaction();
    let order = tx.new_object(&ClassId::new(classes::ORDER)).unwrap();
    let customer = tx.new_object(&ClassId::new(classes::CUSTOMER)).unwrap();

    tx.set_related(&order, "Customer", Some(&customer)).unwrap();

    let orders = tx.related_objects(&customer, "Orders").unwrap();
    assert_eq!(orders.to_vec().unwrap(), vec![order]);
}

#[test]
fn collection_end_point_cannot_be_assigned_directly() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.get_object(&seeded.items[0]).unwrap();

    let result = tx.set_related(&order, "OrderItems", Some(&item));
    assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
}

#[test]
fn foreign_key_cannot_be_set_as_value() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let tx = env.transaction();
    let item = tx.get_object(&seeded.items[0]).unwrap();

    let result = tx.set_value(&item, "Order", Value::Null);
    assert!(matches!(result, Err(CoreError::InvalidOperation { .. })));
}

#[test]
fn veto_leaves_every_end_point_unchanged() {
    let env = TestEnvironment::new();
    let first = env.seed_order(1, 0);
    let second = env.seed_order(2, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();

    let order = tx.get_object(&first.order).unwrap();
    let new_ticket = tx.get_object(&second.ticket).unwrap();
    recorder.veto("relation_changing");

    let result = tx.set_related(&order, "OrderTicket", Some(&new_ticket));
    assert!(matches!(result, Err(CoreError::Vetoed { .. })));

    recorder.allow_all();
    assert_eq!(
        tx.get_related(&order, "OrderTicket").unwrap().map(|o| o.id().clone()),
        Some(first.ticket.clone())
    );
    assert_eq!(
        tx.get_related(&new_ticket, "Order").unwrap().map(|o| o.id().clone()),
        Some(second.order.clone())
    );
    assert!(!tx.has_changed().unwrap());
}

#[test]
fn delete_clears_every_relation() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let tx = env.transaction();

    let order = tx.get_object(&seeded.order).unwrap();
    let customer = tx.get_object(&seeded.customer).unwrap();
    let ticket = tx.get_object(&seeded.ticket).unwrap();
    let items: Vec<_> = seeded.items.iter().map(|id| tx.get_object(id).unwrap()).collect();

    tx.delete_object(&order).unwrap();

    assert_eq!(tx.state(&order).unwrap(), ObjectState::Deleted);
    for item in &items {
        assert_eq!(tx.get_related(item, "Order").unwrap(), None);
    }
    assert_eq!(tx.get_related(&ticket, "Order").unwrap(), None);
    assert!(tx.related_objects(&customer, "Orders").unwrap().is_empty().unwrap());
    assert!(matches!(
        tx.get_value(&order, "OrderNumber"),
        Err(CoreError::ObjectDeleted { .. })
    ));
    assert_eq!(tx.get_original_value(&order, "OrderNumber").unwrap(), Value::Integer(1));
}

#[test]
fn deleting_new_object_discards_it() {
    let env = TestEnvironment::new();
    let tx = env.transaction();
    let order = tx.new_object(&ClassId::new(classes::ORDER)).unwrap();
    let item = tx.new_object(&ClassId::new(classes::ORDER_ITEM)).unwrap();
    tx.set_related(&item, "Order", Some(&order)).unwrap();

    tx.delete_object(&order).unwrap();

    assert_eq!(tx.state(&order).unwrap(), ObjectState::Discarded);
    assert_eq!(tx.get_related(&item, "Order").unwrap(), None);
    assert!(matches!(
        tx.get_object(order.id()),
        Err(CoreError::ObjectDiscarded { .. })
    ));
    assert_eq!(tx.changed_objects().unwrap(), vec![item]);
}

#[test]
fn unidirectional_reference_has_no_opposite() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();

    let ticket = tx.get_object(&seeded.ticket).unwrap();
    let official = tx.get_object(&seeded.official).unwrap();
    tx.set_related(&ticket, "PrintedBy", Some(&official)).unwrap();

    assert_eq!(tx.get_related(&ticket, "PrintedBy").unwrap(), Some(official.clone()));
    assert_eq!(tx.state(&ticket).unwrap(), ObjectState::Changed);
    assert_eq!(tx.state(&official).unwrap(), ObjectState::Unchanged);
}

#[test]
fn objects_from_other_hierarchies_are_rejected() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 1);
    let first = env.transaction();
    let second = env.transaction();

    let item = first.get_object(&seeded.items[0]).unwrap();
    let order = second.get_object(&seeded.order).unwrap();

    assert!(matches!(
        second.set_related(&item, "Order", Some(&order)),
        Err(CoreError::ClientTransactionsDiffer { .. })
    ));
}

#[test]
fn removing_object_of_other_hierarchy_is_rejected() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let first = env.transaction();
    let second = env.transaction();

    let order = first.get_object(&seeded.order).unwrap();
    let items = first.related_objects(&order, "OrderItems").unwrap();
    let foreign = second.get_object(&seeded.items[0]).unwrap();

    assert!(matches!(
        items.remove(&foreign),
        Err(CoreError::ClientTransactionsDiffer { .. })
    ));
    assert_eq!(items.count().unwrap(), 2);
    assert_eq!(first.state(&order).unwrap(), ObjectState::Unchanged);
}

#[test]
fn clearing_one_to_one_touches_two_end_points() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();
    let order = tx.get_object(&seeded.order).unwrap();
    let ticket = tx.get_object(&seeded.ticket).unwrap();
    recorder.clear();

    tx.set_related(&order, "OrderTicket", None).unwrap();

    assert_eq!(tx.get_related(&order, "OrderTicket").unwrap(), None);
    assert_eq!(tx.get_related(&ticket, "Order").unwrap(), None);
    assert_eq!(recorder.events_named("relation_changing").len(), 2);
    assert_eq!(recorder.events_named("relation_changed").len(), 2);
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Changed);
    assert_eq!(tx.state(&ticket).unwrap(), ObjectState::Changed);
}

#[test]
fn moving_ticket_to_another_order_touches_four_end_points() {
    let env = TestEnvironment::new();
    let first = env.seed_order(1, 0);
    let second = env.seed_order(2, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();

    let first_order = tx.get_object(&first.order).unwrap();
    let second_order = tx.get_object(&second.order).unwrap();
    let moved_ticket = tx.get_object(&first.ticket).unwrap();
    let replaced_ticket = tx.get_object(&second.ticket).unwrap();
    recorder.clear();

    tx.set_related(&moved_ticket, "Order", Some(&second_order)).unwrap();

    assert_eq!(tx.get_related(&moved_ticket, "Order").unwrap(), Some(second_order.clone()));
    assert_eq!(tx.get_related(&second_order, "OrderTicket").unwrap(), Some(moved_ticket.clone()));
    assert_eq!(tx.get_related(&first_order, "OrderTicket").unwrap(), None);
    assert_eq!(tx.get_related(&replaced_ticket, "Order").unwrap(), None);
    assert_eq!(recorder.events_named("relation_changing").len(), 4);
    assert_eq!(recorder.events_named("relation_changed").len(), 4);
    for object in [&first_order, &second_order, &moved_ticket, &replaced_ticket] {
        assert_eq!(tx.state(object).unwrap(), ObjectState::Changed);
    }
}

#[test]
fn removing_from_collection_clears_foreign_key() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 2);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();
    let item = tx.get_object(&seeded.items[0]).unwrap();
    let items = tx.related_objects(&order, "OrderItems").unwrap();

    assert!(items.remove(&item).unwrap());

    assert_eq!(items.count().unwrap(), 1);
    assert_eq!(tx.get_related(&item, "Order").unwrap(), None);
    assert_eq!(tx.state(&item).unwrap(), ObjectState::Changed);
    assert!(!items.remove(&item).unwrap());
}
