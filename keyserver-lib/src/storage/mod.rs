//! Minimal transactional key-value capability.
//!
//! The store only ever needs `get` and `put` on single keys, plus a way to
//! run a read-check-write sequence atomically. Everything engine-specific
//! stays behind these two traits so the embedded engine is swappable without
//! touching the gating logic. Traits are synchronous: the engines here
//! commit in-process and the surrounding request handler owns any wall-clock
//! budget.

mod memory;
mod sled;

pub use self::memory::MemoryEngine;
pub use self::sled::SledEngine;

use crate::errors::Result;

/// Operations available inside a transaction.
pub trait Transaction {
    /// Read a key as of the transaction's view.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stage a write. Visible to later reads in the same transaction and
    /// durable only if the transaction commits.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()>;
}

/// An ordered byte-keyed store offering atomic single-key reads and
/// serialized read-check-write transactions.
pub trait KeyValue: Send + Sync {
    /// Run `f` inside one atomic transaction. If `f` errors nothing is
    /// persisted. The closure may be re-run by engines that retry on
    /// conflict, so it must not carry side effects of its own.
    fn with_transaction(&self, f: &dyn Fn(&mut dyn Transaction) -> Result<()>) -> Result<()>;

    /// Atomic single-key read outside any transaction. Never observes a
    /// partially committed value.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Flush buffered writes to durable storage.
    fn flush(&self) -> Result<()>;
}
