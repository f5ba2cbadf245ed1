//! # Relata Testkit
//!
//! Test utilities for Relata.
//!
//! This crate provides:
//! - The order domain mapping and seeded test environments
//! - A listener that records every transaction event
//! - A storage provider that fails on demand
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust
//! use relata_testkit::prelude::*;
//!
//! let env = TestEnvironment::new();
//! let seeded = env.seed_order(1, 2);
//! let tx = env.transaction();
//! let order = tx.get_object(&seeded.order).unwrap();
//! assert_eq!(tx.related_objects(&order, "OrderItems").unwrap().count().unwrap(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recorder;
pub mod storage;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::recorder::*;
    pub use crate::storage::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recorder::*;
pub use storage::*;
