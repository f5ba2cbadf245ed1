//! Property values, listeners and extensions.

use proptest::prelude::*;
use relata_core::{
    ClassId, CoreError, ObjectState, PropertyChange, TransactionListener, TransactionView, Value,
};
use relata_testkit::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

/// Appends `<tag>:<event>:<value seen through the view>` to a shared log.
struct Tagged {
    tag: &'static str,
    log: Rc<RefCell<Vec<String>>>,
}

impl Tagged {
    fn seen(view: &TransactionView<'_>, change: &PropertyChange) -> String {
        view.value(change.object.id(), &change.property)
            .map_or_else(|| "?".to_string(), |v| format!("{v:?}"))
    }
}

impl TransactionListener for Tagged {
    fn property_value_changing(
        &mut self,
        view: &TransactionView<'_>,
        change: &PropertyChange,
    ) -> relata_core::CoreResult<()> {
        let seen = Self::seen(view, change);
        self.log.borrow_mut().push(format!("{}:changing:{seen}", self.tag));
        Ok(())
    }

    fn property_value_changed(&mut self, view: &TransactionView<'_>, change: &PropertyChange) {
        let seen = Self::seen(view, change);
        self.log.borrow_mut().push(format!("{}:changed:{seen}", self.tag));
    }
}

#[test]
fn values_track_original_and_current() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();

    tx.set_value(&order, "OrderNumber", 2).unwrap();
    assert_eq!(tx.get_value(&order, "OrderNumber").unwrap(), Value::Integer(2));
    assert_eq!(tx.get_original_value(&order, "OrderNumber").unwrap(), Value::Integer(1));
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Changed);

    tx.set_value(&order, "OrderNumber", 1).unwrap();
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Unchanged);
}

#[test]
fn new_objects_start_with_defaults() {
    let env = TestEnvironment::new();
    let tx = env.transaction();
    let order = tx.new_object(&ClassId::new(classes::ORDER)).unwrap();

    assert_eq!(tx.get_value(&order, "OrderNumber").unwrap(), Value::Integer(0));
    assert_eq!(tx.get_value(&order, "DeliveryDate").unwrap(), Value::Null);
    assert_eq!(tx.state(&order).unwrap(), ObjectState::New);
}

#[test]
fn invalid_values_are_rejected() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let order = tx.get_object(&seeded.order).unwrap();

    assert!(matches!(
        tx.set_value(&order, "OrderNumber", "seven"),
        Err(CoreError::PropertyTypeMismatch { .. })
    ));
    assert!(matches!(
        tx.set_value(&order, "OrderNumber", Value::Null),
        Err(CoreError::ValueRequired { .. })
    ));
    assert!(tx.set_value(&order, "Missing", 1).is_err());
    tx.set_value(&order, "DeliveryDate", Value::Null).unwrap();
    assert_eq!(tx.state(&order).unwrap(), ObjectState::Unchanged);
}

#[test]
fn derived_class_inherits_properties() {
    let env = TestEnvironment::new();
    let tx = env.transaction();
    let customer = tx.new_object(&ClassId::new(classes::CUSTOMER)).unwrap();

    tx.set_value(&customer, "Name", "Acme").unwrap();
    tx.set_value(&customer, "CustomerSince", 2001).unwrap();
    assert_eq!(tx.get_value(&customer, "Name").unwrap(), Value::from("Acme"));
}

#[test]
fn abstract_and_unknown_classes_cannot_be_instantiated() {
    let env = TestEnvironment::new();
    let tx = env.transaction();
    assert!(matches!(
        tx.new_object(&ClassId::new(classes::COMPANY)),
        Err(CoreError::InvalidOperation { .. })
    ));
    assert!(matches!(
        tx.new_object(&ClassId::new("Unknown")),
        Err(CoreError::Mapping { .. })
    ));
}

#[test]
fn assigning_the_current_value_fires_nothing() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();
    let order = tx.get_object(&seeded.order).unwrap();
    recorder.clear();

    tx.set_value(&order, "OrderNumber", 1).unwrap();
    assert!(recorder.events().is_empty());

    tx.set_value(&order, "OrderNumber", 2).unwrap();
    assert_eq!(
        recorder.events(),
        vec!["property_value_changing OrderNumber", "property_value_changed OrderNumber"]
    );
}

#[test]
fn vetoed_value_change_is_not_applied() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();
    let order = tx.get_object(&seeded.order).unwrap();

    recorder.veto("property_value_changing");
    assert!(matches!(
        tx.set_value(&order, "OrderNumber", 2),
        Err(CoreError::Vetoed { .. })
    ));
    assert_eq!(tx.get_value(&order, "OrderNumber").unwrap(), Value::Integer(1));
}

#[test]
fn listeners_run_before_extensions_and_see_both_states() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let log = Rc::new(RefCell::new(Vec::new()));
    tx.add_extension(
        "audit",
        Tagged {
            tag: "extension",
            log: Rc::clone(&log),
        },
    )
    .unwrap();
    tx.add_listener(Tagged {
        tag: "listener",
        log: Rc::clone(&log),
    })
    .unwrap();
    let order = tx.get_object(&seeded.order).unwrap();

    tx.set_value(&order, "OrderNumber", 2).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "listener:changing:Integer(1)",
            "extension:changing:Integer(1)",
            "listener:changed:Integer(2)",
            "extension:changed:Integer(2)",
        ]
    );
}

#[test]
fn extension_keys_are_unique() {
    let env = TestEnvironment::new();
    let tx = env.transaction();
    tx.add_extension("audit", EventRecorder::new()).unwrap();
    tx.add_extension("cache", EventRecorder::new()).unwrap();

    assert!(matches!(
        tx.add_extension("audit", EventRecorder::new()),
        Err(CoreError::InvalidArgument { .. })
    ));
    assert_eq!(tx.extension_keys().unwrap(), vec!["audit", "cache"]);

    assert!(tx.remove_extension("audit").unwrap());
    assert!(!tx.remove_extension("audit").unwrap());
    assert_eq!(tx.extension_keys().unwrap(), vec!["cache"]);
}

#[test]
fn loads_are_announced() {
    let env = TestEnvironment::new();
    let seeded = env.seed_order(1, 0);
    let tx = env.transaction();
    let recorder = EventRecorder::new();
    tx.add_listener(recorder.clone()).unwrap();

    tx.get_object(&seeded.order).unwrap();
    tx.get_object(&seeded.order).unwrap();

    assert_eq!(recorder.names(), vec!["objects_loading", "objects_loaded"]);

    recorder.veto("objects_loading");
    assert!(matches!(
        tx.get_object(&seeded.customer),
        Err(CoreError::Vetoed { .. })
    ));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn assigned_order_numbers_read_back(numbers in prop::collection::vec(order_number_strategy(), 1..8)) {
        let env = TestEnvironment::new();
        let seeded = env.seed_order(1, 0);
        let tx = env.transaction();
        let order = tx.get_object(&seeded.order).unwrap();

        for number in &numbers {
            tx.set_value(&order, "OrderNumber", *number).unwrap();
            prop_assert_eq!(tx.get_value(&order, "OrderNumber").unwrap(), Value::Integer(*number));
            prop_assert_eq!(tx.get_original_value(&order, "OrderNumber").unwrap(), Value::Integer(1));
        }

        let last = *numbers.last().unwrap();
        let expected = if last == 1 { ObjectState::Unchanged } else { ObjectState::Changed };
        prop_assert_eq!(tx.state(&order).unwrap(), expected);

        tx.commit().unwrap();
        let stored = env.stored(&seeded.order).unwrap();
        prop_assert_eq!(
            stored.value("OrderNumber"),
            Some(&Value::Integer(last))
        );
    }
}
