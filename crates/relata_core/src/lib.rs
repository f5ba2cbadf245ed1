//! # Relata Core
//!
//! Transactional change tracking for domain objects.
//!
//! This crate provides:
//! - Mapping metadata for classes, properties and relations
//! - Data containers with original/current values per object
//! - Relation end points kept consistent in both directions
//! - Object collections built from a chain of decorators
//! - Client transactions with nested sub-transactions
//! - A storage provider trait and an in-memory implementation
//!
//! ## Architecture
//!
//! Every mutation runs as a command with three phases: changing
//! notifications (which may veto), the mutation itself, and changed
//! notifications. A relation change touches up to four end points and is
//! applied as one command so either all of them change or none does.
//!
//! A root transaction loads from and commits to a [`StorageProvider`]. A
//! sub-transaction loads from and commits to its parent, which stays
//! read-only while the sub-transaction is active.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use relata_core::{
//!     ClassBuilder, ClassId, ClientTransaction, InMemoryStorage, MappingBuilder,
//!     PropertyDefinition, RelationBuilder, ValueType,
//! };
//!
//! let mapping = Arc::new(
//!     MappingBuilder::new()
//!         .class(ClassBuilder::new("Order").property(PropertyDefinition::new("Number", ValueType::Integer)))
//!         .class(ClassBuilder::new("OrderItem"))
//!         .relation(RelationBuilder::one_to_many("Order", "OrderItems", "OrderItem", "Order"))
//!         .build()
//!         .unwrap(),
//! );
//! let tx = ClientTransaction::new_root(mapping, Arc::new(InMemoryStorage::new()));
//!
//! let order = tx.new_object(&ClassId::new("Order")).unwrap();
//! let item = tx.new_object(&ClassId::new("OrderItem")).unwrap();
//! tx.related_objects(&order, "OrderItems").unwrap().add(item.clone()).unwrap();
//!
//! assert_eq!(tx.get_related(&item, "Order").unwrap(), Some(order.clone()));
//!
//! let sub = tx.create_sub_transaction().unwrap();
//! sub.set_related(&item, "Order", None).unwrap();
//! sub.commit().unwrap();
//! sub.discard().unwrap();
//!
//! assert!(tx.related_objects(&order, "OrderItems").unwrap().is_empty().unwrap());
//! tx.commit().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod collection;
pub mod command;
mod config;
pub mod data;
mod data_manager;
pub mod endpoint;
mod error;
pub mod mapping;
mod object;
pub mod persistence;
pub mod storage;
pub mod transaction;
mod types;
mod value;

pub use collection::{ChangeDetection, CollectionData, CollectionEventHandler, ElementType, ObjectCollection};
pub use command::{Command, CommandStep, Mutation, Notification, PropertyChange, RelationChange};
pub use config::Config;
pub use data::{DataContainer, ObjectState, PropertyValue};
pub use endpoint::{CollectionEndPoint, ObjectEndPoint, RelationEndPoint, RelationEndPointId};
pub use error::{CoreError, CoreResult, PersistFailure};
pub use mapping::{
    Cardinality, ClassBuilder, ClassDefinition, MappingBuilder, MappingConfiguration, PropertyDefinition,
    RelationBuilder, RelationEndPointDefinition,
};
pub use object::{ClassId, DomainObject, ObjectId};
pub use persistence::{
    EndPointData, EndPointSnapshot, LoadedObject, PersistBatch, PersistEntry, PersistState, PersistedObject,
    PersistenceStrategy, RootPersistenceStrategy,
};
pub use storage::{
    InMemoryStorage, ObjectRecord, PersistKind, PersistOutcome, PersistRecord, RelationQuery, StorageProvider,
    StoreSnapshot,
};
pub use transaction::{ClientTransaction, ExtensionCollection, TransactionListener, TransactionScope, TransactionView};
pub use types::{Timestamp, TransactionId};
pub use value::{Value, ValueType};
