//! Client transactions.
//!
//! A [`ClientTransaction`] tracks the objects loaded, created, modified and
//! deleted through it and commits them as one unit. Transactions form
//! hierarchies: a sub-transaction reads its parent's current state and
//! commits into the parent rather than into storage. While a
//! sub-transaction is active its parent is read-only.
//!
//! Transactions are single-threaded; handles are reference counted and
//! cannot be sent across threads.

mod client;
mod events;
mod listener;
mod scope;

pub use client::ClientTransaction;
pub use events::ExtensionCollection;
pub use listener::{TransactionListener, TransactionView};
pub use scope::TransactionScope;

pub(crate) use client::WeakTransaction;
pub(crate) use events::EventDispatcher;
