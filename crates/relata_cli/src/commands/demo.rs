//! Demo command implementation.
//!
//! Builds a small order domain, fills an in-memory store through a root
//! transaction, then moves an item between orders inside a sub-transaction
//! and commits both levels.

use relata_core::{
    ClassBuilder, ClassId, ClientTransaction, CoreResult, DomainObject, InMemoryStorage,
    MappingBuilder, MappingConfiguration, PropertyDefinition, RelationBuilder, StorageProvider,
    ValueType,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// What the demo did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoReport {
    /// Orders created.
    pub orders: usize,
    /// Items created.
    pub items: usize,
    /// Items moved to another order in the sub-transaction.
    pub moved: usize,
    /// Objects in the store at the end.
    pub stored: usize,
    /// Item count per order, read back by a fresh transaction.
    pub items_per_order: Vec<usize>,
}

/// Mapping used by the demo: customers place orders made of items.
pub fn sample_mapping() -> CoreResult<Arc<MappingConfiguration>> {
    let mapping = MappingBuilder::new()
        .class(ClassBuilder::new("Customer").property(PropertyDefinition::new("Name", ValueType::Text).not_null()))
        .class(
            ClassBuilder::new("Order")
                .property(PropertyDefinition::new("OrderNumber", ValueType::Integer).not_null())
                .property(PropertyDefinition::new("DeliveryDate", ValueType::Text)),
        )
        .class(
            ClassBuilder::new("OrderItem")
                .property(PropertyDefinition::new("Position", ValueType::Integer).not_null())
                .property(PropertyDefinition::new("Product", ValueType::Text).not_null()),
        )
        .relation(RelationBuilder::one_to_many("Order", "OrderItems", "OrderItem", "Order"))
        .relation(RelationBuilder::one_to_many("Customer", "Orders", "Order", "Customer"))
        .build()?;
    Ok(Arc::new(mapping))
}

/// Runs the scenario against a fresh store and returns the store.
pub fn run_scenario(orders: usize, items_each: usize) -> CoreResult<(Arc<InMemoryStorage>, DemoReport)> {
    let mapping = sample_mapping()?;
    let storage = Arc::new(InMemoryStorage::new());
    let provider: Arc<dyn StorageProvider> = storage.clone();

    let tx = ClientTransaction::new_root(Arc::clone(&mapping), Arc::clone(&provider));
    let customer = tx.new_object(&ClassId::new("Customer"))?;
    tx.set_value(&customer, "Name", "Demo Customer")?;
    let mut created = Vec::with_capacity(orders);
    for number in 0..orders {
        let order = tx.new_object(&ClassId::new("Order"))?;
        tx.set_value(&order, "OrderNumber", number as i64 + 1)?;
        tx.related_objects(&customer, "Orders")?.add(order.clone())?;
        let items = tx.related_objects(&order, "OrderItems")?;
        for position in 0..items_each {
            let item = tx.new_object(&ClassId::new("OrderItem"))?;
            tx.set_value(&item, "Position", position as i64 + 1)?;
            tx.set_value(&item, "Product", format!("Product {}-{}", number + 1, position + 1))?;
            items.add(item)?;
        }
        created.push(order);
    }
    tx.commit()?;
    info!(orders, items = orders * items_each, "orders committed");

    let moved = move_last_item(&tx, &created)?;
    tx.commit()?;
    info!(moved, "sub-transaction changes committed");

    let reader = ClientTransaction::new_root(mapping, provider);
    let items_per_order = created
        .iter()
        .map(|order| {
            let order = reader.get_object(order.id())?;
            reader.related_objects(&order, "OrderItems")?.count()
        })
        .collect::<CoreResult<Vec<_>>>()?;

    let report = DemoReport {
        orders,
        items: orders * items_each,
        moved,
        stored: storage.len(),
        items_per_order,
    };
    Ok((storage, report))
}

/// Moves the last item of the first order to the second one inside a
/// sub-transaction. Returns the number of moved items.
fn move_last_item(tx: &ClientTransaction, orders: &[DomainObject]) -> CoreResult<usize> {
    let [first, second, ..] = orders else {
        return Ok(0);
    };
    let sub = tx.create_sub_transaction()?;
    let source = sub.related_objects(first, "OrderItems")?;
    let moved = match source.count()?.checked_sub(1) {
        Some(last) => match source.get(last)? {
            Some(item) => {
                sub.set_related(&item, "Order", Some(second))?;
                sub.set_value(first, "DeliveryDate", "rescheduled")?;
                1
            }
            None => 0,
        },
        None => 0,
    };
    sub.commit()?;
    sub.discard()?;
    Ok(moved)
}

/// Runs the demo command.
pub fn run(orders: usize, items: usize, save: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let (storage, report) = run_scenario(orders, items)?;

    println!("Relata Demo");
    println!("===========");
    println!();
    println!("Orders created:  {}", report.orders);
    println!("Items created:   {}", report.items);
    println!("Items moved:     {}", report.moved);
    println!("Objects stored:  {}", report.stored);
    println!();
    println!("Items per order:");
    for (index, count) in report.items_per_order.iter().enumerate() {
        println!("  Order {}: {}", index + 1, count);
    }

    if let Some(path) = save {
        let bytes = storage.export_snapshot()?.to_bytes()?;
        std::fs::write(path, &bytes)?;
        info!(path = %path.display(), bytes = bytes.len(), "snapshot saved");
        println!();
        println!("Snapshot saved to {}", path.display());
    }

    Ok(())
}
