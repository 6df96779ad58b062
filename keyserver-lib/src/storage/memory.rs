//! In-memory engine for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::errors::{KeyserverError, Result};

use super::{KeyValue, Transaction};

/// A `BTreeMap` behind a mutex. Transactions stage writes and merge them on
/// commit, so a failed closure leaves the map untouched.
#[derive(Default)]
pub struct MemoryEngine {
    map: Mutex<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValue for MemoryEngine {
    fn with_transaction(&self, f: &dyn Fn(&mut dyn Transaction) -> Result<()>) -> Result<()> {
        let mut map = self
            .map
            .lock()
            .map_err(|_| KeyserverError::StorageUnavailable("engine poisoned".into()))?;
        let mut tx = MemoryTransaction {
            base: &*map,
            staged: BTreeMap::new(),
        };
        f(&mut tx)?;
        let staged = tx.staged;
        for (key, value) in staged {
            map.insert(key, value);
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let map = self
            .map
            .lock()
            .map_err(|_| KeyserverError::StorageUnavailable("engine poisoned".into()))?;
        Ok(map.get(key).cloned())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryTransaction<'a> {
    base: &'a BTreeMap<Vec<u8>, Vec<u8>>,
    staged: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Transaction for MemoryTransaction<'_> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(Some(staged.clone()));
        }
        Ok(self.base.get(key).cloned())
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.staged.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}
