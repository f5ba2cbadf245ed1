//! Benchmark utilities.

use relata_core::{ClientTransaction, DomainObject};
use relata_testkit::{SeededOrder, TestEnvironment};

/// Seeds `orders` orders with `items` items each.
pub fn seeded_environment(orders: usize, items: usize) -> (TestEnvironment, Vec<SeededOrder>) {
    let env = TestEnvironment::new();
    let seeded = (0..orders)
        .map(|n| env.seed_order(n as i64 + 1, items))
        .collect();
    (env, seeded)
}

/// Loads the seeded orders into `tx`.
pub fn load_orders(tx: &ClientTransaction, seeded: &[SeededOrder]) -> Vec<DomainObject> {
    seeded
        .iter()
        .map(|s| tx.get_object(&s.order).expect("seeded order loads"))
        .collect()
}

/// Loads every seeded item into `tx`, order by order.
pub fn load_items(tx: &ClientTransaction, seeded: &[SeededOrder]) -> Vec<DomainObject> {
    seeded
        .iter()
        .flat_map(|s| s.items.iter())
        .map(|id| tx.get_object(id).expect("seeded item loads"))
        .collect()
}
