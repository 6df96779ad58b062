//! sled-backed engine.

use std::path::Path;

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Tree;

use crate::errors::{KeyserverError, Result};

use super::{KeyValue, Transaction};

/// Tree namespace holding address metadata.
const ADDRESS_METADATA_TREE: &[u8] = b"addressMetadata";

/// Embedded storage engine over a sled database.
///
/// sled re-runs the transaction closure on commit conflicts, which is what
/// serializes two concurrent writers racing the same address.
pub struct SledEngine {
    db: sled::Db,
    tree: Tree,
}

impl SledEngine {
    /// Open (or create) the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path.as_ref())
            .map_err(|e| KeyserverError::StorageUnavailable(e.to_string()))?;
        let tree = db
            .open_tree(ADDRESS_METADATA_TREE)
            .map_err(|e| KeyserverError::StorageUnavailable(e.to_string()))?;
        Ok(Self { db, tree })
    }
}

impl KeyValue for SledEngine {
    fn with_transaction(&self, f: &dyn Fn(&mut dyn Transaction) -> Result<()>) -> Result<()> {
        let outcome = self.tree.transaction(|tx| {
            let mut tx = SledTransaction { inner: tx };
            f(&mut tx).map_err(ConflictableTransactionError::Abort)
        });
        match outcome {
            Ok(()) => Ok(()),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => {
                Err(KeyserverError::StorageUnavailable(e.to_string()))
            }
        }
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.tree
            .get(key)
            .map(|value| value.map(|v| v.to_vec()))
            .map_err(|e| KeyserverError::StorageUnavailable(e.to_string()))
    }

    fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| KeyserverError::StorageUnavailable(e.to_string()))
    }
}

struct SledTransaction<'a> {
    inner: &'a sled::transaction::TransactionalTree,
}

impl Transaction for SledTransaction<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner
            .get(key)
            .map(|value| value.map(|v| v.to_vec()))
            .map_err(|e| KeyserverError::StorageUnavailable(e.to_string()))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.inner
            .insert(key, value)
            .map(|_| ())
            .map_err(|e| KeyserverError::StorageUnavailable(e.to_string()))
    }
}
