//! Test fixtures and seeded environments.
//!
//! The order domain used throughout the tests:
//!
//! - `Order` 1:n `OrderItem` through `Order.OrderItems` / `OrderItem.Order`
//! - `Order` 1:1 `OrderTicket` through `Order.OrderTicket` / `OrderTicket.Order`
//!   (mandatory on the ticket side)
//! - `Customer` 1:n `Order` through `Customer.Orders` / `Order.Customer`
//! - `Official` 1:n `Order` through `Official.Orders` / `Order.Official`
//! - `OrderTicket.PrintedBy` is a unidirectional reference to an `Official`
//! - `Customer` derives from the abstract `Company`

use relata_core::{
    ClassBuilder, ClassId, ClientTransaction, Config, InMemoryStorage, MappingBuilder,
    MappingConfiguration, ObjectId, ObjectRecord, PropertyDefinition, RelationBuilder,
    StorageProvider, Value, ValueType,
};
use std::sync::Arc;

/// Class names of the order domain.
pub mod classes {
    /// `Company`, abstract base class of `Customer`.
    pub const COMPANY: &str = "Company";
    /// `Customer`.
    pub const CUSTOMER: &str = "Customer";
    /// `Official`.
    pub const OFFICIAL: &str = "Official";
    /// `Order`.
    pub const ORDER: &str = "Order";
    /// `OrderItem`.
    pub const ORDER_ITEM: &str = "OrderItem";
    /// `OrderTicket`.
    pub const ORDER_TICKET: &str = "OrderTicket";
}

/// Builds the order domain mapping.
pub fn order_mapping() -> Arc<MappingConfiguration> {
    let mapping = MappingBuilder::new()
        .class(
            ClassBuilder::new(classes::COMPANY)
                .abstract_class()
                .property(PropertyDefinition::new("Name", ValueType::Text).not_null()),
        )
        .class(
            ClassBuilder::new(classes::CUSTOMER)
                .inherits(classes::COMPANY)
                .property(PropertyDefinition::new("CustomerSince", ValueType::Integer)),
        )
        .class(ClassBuilder::new(classes::OFFICIAL).property(PropertyDefinition::new("Name", ValueType::Text).not_null()))
        .class(
            ClassBuilder::new(classes::ORDER)
                .property(PropertyDefinition::new("OrderNumber", ValueType::Integer).not_null())
                .property(PropertyDefinition::new("DeliveryDate", ValueType::Text)),
        )
        .class(
            ClassBuilder::new(classes::ORDER_ITEM)
                .property(PropertyDefinition::new("Position", ValueType::Integer).not_null())
                .property(PropertyDefinition::new("Product", ValueType::Text).not_null()),
        )
        .class(
            ClassBuilder::new(classes::ORDER_TICKET)
                .property(PropertyDefinition::new("FileName", ValueType::Text).not_null()),
        )
        .relation(RelationBuilder::one_to_many(
            classes::ORDER,
            "OrderItems",
            classes::ORDER_ITEM,
            "Order",
        ))
        .relation(
            RelationBuilder::one_to_one(classes::ORDER, "OrderTicket", classes::ORDER_TICKET, "Order")
                .mandatory_foreign_key(),
        )
        .relation(RelationBuilder::one_to_many(
            classes::CUSTOMER,
            "Orders",
            classes::ORDER,
            "Customer",
        ))
        .relation(RelationBuilder::one_to_many(
            classes::OFFICIAL,
            "Orders",
            classes::ORDER,
            "Official",
        ))
        .relation(RelationBuilder::unidirectional(
            classes::ORDER_TICKET,
            "PrintedBy",
            classes::OFFICIAL,
        ))
        .build()
        .expect("order mapping is valid");
    Arc::new(mapping)
}

/// IDs of an order seeded with [`TestEnvironment::seed_order`].
#[derive(Debug, Clone)]
pub struct SeededOrder {
    /// The order.
    pub order: ObjectId,
    /// Its items in storage order.
    pub items: Vec<ObjectId>,
    /// Its ticket.
    pub ticket: ObjectId,
    /// The customer that placed it.
    pub customer: ObjectId,
    /// The official handling it.
    pub official: ObjectId,
}

/// An in-memory store plus the order mapping.
#[derive(Debug, Clone)]
pub struct TestEnvironment {
    /// The order domain mapping.
    pub mapping: Arc<MappingConfiguration>,
    /// The backing store.
    pub storage: Arc<InMemoryStorage>,
    config: Config,
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnvironment {
    /// Creates an empty environment with the default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates an empty environment whose transactions use `config`.
    pub fn with_config(config: Config) -> Self {
        Self {
            mapping: order_mapping(),
            storage: Arc::new(InMemoryStorage::new()),
            config,
        }
    }

    /// Opens a root transaction over the store.
    pub fn transaction(&self) -> ClientTransaction {
        let storage: Arc<dyn StorageProvider> = self.storage.clone();
        ClientTransaction::with_config(Arc::clone(&self.mapping), storage, self.config)
    }

    /// Returns the stored record of `id`.
    pub fn stored(&self, id: &ObjectId) -> Option<ObjectRecord> {
        self.storage.load_object(id).expect("in-memory load")
    }

    /// Stores an object directly and returns its ID.
    pub fn seed(&self, class: &str, values: Vec<(&str, Value)>) -> ObjectId {
        let id = ObjectId::new(ClassId::new(class));
        let values = values
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.storage
            .insert_record(id.clone(), values)
            .expect("in-memory insert");
        id
    }

    /// Stores a customer.
    pub fn seed_customer(&self, name: &str) -> ObjectId {
        self.seed(classes::CUSTOMER, vec![("Name", name.into())])
    }

    /// Stores an official.
    pub fn seed_official(&self, name: &str) -> ObjectId {
        self.seed(classes::OFFICIAL, vec![("Name", name.into())])
    }

    /// Stores an order with `item_count` items, a ticket, a customer and an
    /// official.
    pub fn seed_order(&self, number: i64, item_count: usize) -> SeededOrder {
        let customer = self.seed_customer(&format!("Customer {number}"));
        let official = self.seed_official(&format!("Official {number}"));
        let order = self.seed(
            classes::ORDER,
            vec![
                ("OrderNumber", Value::Integer(number)),
                ("Customer", customer.clone().into()),
                ("Official", official.clone().into()),
            ],
        );
        let items = (0..item_count)
            .map(|position| {
                self.seed(
                    classes::ORDER_ITEM,
                    vec![
                        ("Position", Value::Integer(position as i64 + 1)),
                        ("Product", format!("Product {}", position + 1).into()),
                        ("Order", order.clone().into()),
                    ],
                )
            })
            .collect();
        let ticket = self.seed(
            classes::ORDER_TICKET,
            vec![
                ("FileName", format!("ticket-{number}.txt").into()),
                ("Order", order.clone().into()),
            ],
        );
        SeededOrder {
            order,
            items,
            ticket,
            customer,
            official,
        }
    }
}
