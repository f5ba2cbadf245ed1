//! Ambient current transaction per thread.

use super::ClientTransaction;
use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static SCOPES: RefCell<Vec<ClientTransaction>> = const { RefCell::new(Vec::new()) };
}

/// Guard making a transaction the current one on this thread.
///
/// Scopes nest; dropping a guard restores the previously current
/// transaction. Guards must be dropped in reverse order of creation.
#[derive(Debug)]
#[must_use = "the transaction is only current while the scope is alive"]
pub struct TransactionScope {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl TransactionScope {
    pub(crate) fn enter(transaction: ClientTransaction) -> Self {
        let depth = SCOPES.with(|s| {
            let mut scopes = s.borrow_mut();
            scopes.push(transaction);
            scopes.len()
        });
        Self {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Returns the innermost current transaction on this thread.
    #[must_use]
    pub fn current() -> Option<ClientTransaction> {
        SCOPES.with(|s| s.borrow().last().cloned())
    }

    /// Returns true if a transaction is current on this thread.
    #[must_use]
    pub fn has_current() -> bool {
        SCOPES.with(|s| !s.borrow().is_empty())
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        SCOPES.with(|s| {
            let mut scopes = s.borrow_mut();
            if scopes.len() != self.depth {
                tracing::warn!(
                    expected = self.depth,
                    actual = scopes.len(),
                    "transaction scopes dropped out of order"
                );
            }
            scopes.truncate(self.depth.saturating_sub(1));
        });
    }
}
