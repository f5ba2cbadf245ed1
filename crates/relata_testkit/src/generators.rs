//! Property-based test generators using proptest.
//!
//! Strategies produce indices into pools of objects created by the test,
//! so the same operation sequence can be replayed against any transaction.

use proptest::prelude::*;
use relata_core::{ClientTransaction, CoreResult, DomainObject, Value, ValueType};

/// A relation operation over pools of orders, items and tickets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationOp {
    /// `item.Order = order` (or null).
    SetOrder {
        /// Index into the item pool.
        item: usize,
        /// Index into the order pool; `None` clears the relation.
        order: Option<usize>,
    },
    /// `order.OrderItems.insert(index, item)`.
    Insert {
        /// Index into the order pool.
        order: usize,
        /// Insert position, clamped to the collection length.
        index: usize,
        /// Index into the item pool.
        item: usize,
    },
    /// `order.OrderItems.remove(item)`.
    Remove {
        /// Index into the order pool.
        order: usize,
        /// Index into the item pool.
        item: usize,
    },
    /// `ticket.Order = order` (or null).
    SetTicketOrder {
        /// Index into the ticket pool.
        ticket: usize,
        /// Index into the order pool; `None` clears the relation.
        order: Option<usize>,
    },
    /// `order.OrderTicket = ticket` (or null).
    SetOrderTicket {
        /// Index into the order pool.
        order: usize,
        /// Index into the ticket pool; `None` clears the relation.
        ticket: Option<usize>,
    },
}

/// Object pools the operations refer to.
#[derive(Debug, Clone)]
pub struct Pools {
    /// Orders.
    pub orders: Vec<DomainObject>,
    /// Order items.
    pub items: Vec<DomainObject>,
    /// Order tickets.
    pub tickets: Vec<DomainObject>,
}

impl RelationOp {
    /// Applies the operation to `tx`.
    ///
    /// Indices wrap around the pool sizes, so every generated operation
    /// names existing objects.
    pub fn apply(&self, tx: &ClientTransaction, pools: &Pools) -> CoreResult<()> {
        let order = |i: usize| &pools.orders[i % pools.orders.len()];
        let item = |i: usize| &pools.items[i % pools.items.len()];
        let ticket = |i: usize| &pools.tickets[i % pools.tickets.len()];
        match self {
            Self::SetOrder { item: i, order: o } => tx.set_related(item(*i), "Order", o.map(order)),
            Self::Insert {
                order: o,
                index,
                item: i,
            } => {
                let items = tx.related_objects(order(*o), "OrderItems")?;
                if items.contains(item(*i).id())? {
                    return Ok(());
                }
                let index = (*index).min(items.count()?);
                items.insert(index, item(*i).clone())
            }
            Self::Remove { order: o, item: i } => tx
                .related_objects(order(*o), "OrderItems")?
                .remove(item(*i))
                .map(|_| ()),
            Self::SetTicketOrder { ticket: t, order: o } => {
                tx.set_related(ticket(*t), "Order", o.map(order))
            }
            Self::SetOrderTicket { order: o, ticket: t } => {
                tx.set_related(order(*o), "OrderTicket", t.map(ticket))
            }
        }
    }
}

/// Strategy for a single relation operation.
pub fn relation_op_strategy() -> impl Strategy<Value = RelationOp> {
    prop_oneof![
        (0..8usize, prop::option::of(0..4usize))
            .prop_map(|(item, order)| RelationOp::SetOrder { item, order }),
        (0..4usize, 0..8usize, 0..8usize)
            .prop_map(|(order, index, item)| RelationOp::Insert { order, index, item }),
        (0..4usize, 0..8usize).prop_map(|(order, item)| RelationOp::Remove { order, item }),
        (0..4usize, prop::option::of(0..4usize))
            .prop_map(|(ticket, order)| RelationOp::SetTicketOrder { ticket, order }),
        (0..4usize, prop::option::of(0..4usize))
            .prop_map(|(order, ticket)| RelationOp::SetOrderTicket { order, ticket }),
    ]
}

/// Strategy for a sequence of relation operations.
pub fn relation_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<RelationOp>> {
    prop::collection::vec(relation_op_strategy(), 0..max_len)
}

/// Strategy for a non-null value of `value_type`.
///
/// `ObjectRef` values are not generated; use relation operations instead.
pub fn value_strategy(value_type: ValueType) -> BoxedStrategy<Value> {
    match value_type {
        ValueType::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        ValueType::Integer => any::<i64>().prop_map(Value::Integer).boxed(),
        ValueType::Text => prop::string::string_regex("[a-zA-Z0-9 ]{0,24}")
            .expect("Invalid regex")
            .prop_map(Value::Text)
            .boxed(),
        ValueType::Bytes => prop::collection::vec(any::<u8>(), 0..32)
            .prop_map(Value::Bytes)
            .boxed(),
        ValueType::ObjectRef => Just(Value::Null).boxed(),
    }
}

/// Strategy for order numbers.
pub fn order_number_strategy() -> impl Strategy<Value = i64> {
    1..100_000i64
}
