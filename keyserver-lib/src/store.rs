//! The cryptographically gated address metadata store.
//!
//! `set` is where every write-time invariant lives: the address must decode,
//! the pubkey must hash to the address's script hash, the payload timestamp
//! must strictly advance the stored one, a TTL'd record must not arrive
//! already expired, and the payload signature must verify under the declared
//! scheme. The read-check-write sequence runs inside one engine transaction
//! so two concurrent writers racing the same address cannot both pass the
//! ordering check against a stale read.
//!
//! `get` trusts what `set` admitted (no signature re-verification on read)
//! but applies TTL expiry lazily: an expired record is reported as gone even
//! though its bytes stay on disk until a newer record overwrites them.

use std::sync::atomic::{AtomicBool, Ordering};

use sha2::{Digest, Sha256};

use crate::address;
use crate::errors::{KeyserverError, Result};
use crate::models::AddressRecord;
use crate::signature;
use crate::storage::KeyValue;

/// Permissioned key-value store over an embedded engine.
pub struct AddressStore<E: KeyValue> {
    engine: E,
    closed: AtomicBool,
}

impl<E: KeyValue> AddressStore<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            closed: AtomicBool::new(false),
        }
    }

    /// Validate `record` against `address` and persist it.
    ///
    /// Failure modes, in check order: `InvalidAddress`, `PubkeyMismatch`,
    /// `OutdatedUpdate`, `ExpiredTtl`, `InvalidSignature`, and
    /// `StorageUnavailable` for engine trouble.
    pub fn set(&self, addr: &str, record: &AddressRecord) -> Result<()> {
        self.ensure_open()?;

        let script_hash = address::decode_address(addr)?;
        if address::hash160(&record.pubkey) != script_hash {
            return Err(KeyserverError::PubkeyMismatch);
        }

        let digest: [u8; 32] = Sha256::digest(record.payload.canonical_bytes()?).into();
        let value = record.to_bytes()?;
        let now = chrono::Utc::now().timestamp();

        self.engine.with_transaction(&|tx| {
            // Ordering check against the record as of this transaction, not
            // an earlier read. A stale read here is exactly the replay
            // window this transaction exists to close.
            if let Some(existing) = tx.get(addr.as_bytes())? {
                let existing = decode_stored(&existing)?;
                if existing.payload.timestamp >= record.payload.timestamp {
                    return Err(KeyserverError::OutdatedUpdate);
                }
            }

            // A record may not be submitted already expired, judged by the
            // server clock.
            if record.payload.ttl > 0 && now > record.payload.timestamp + record.payload.ttl {
                return Err(KeyserverError::ExpiredTtl);
            }

            signature::verify_digest(record.scheme, &record.pubkey, &digest, &record.signature)?;

            tx.put(addr.as_bytes(), &value)
        })?;

        tracing::debug!(address = addr, timestamp = record.payload.timestamp, "stored record");
        Ok(())
    }

    /// Fetch the record stored under `addr`.
    ///
    /// Integrity was established when the record was admitted; reads only
    /// re-check TTL expiry. Callers treat `ExpiredTtl` the same as
    /// `NotFound`.
    pub fn get(&self, addr: &str) -> Result<AddressRecord> {
        self.ensure_open()?;

        let bytes = self
            .engine
            .get(addr.as_bytes())?
            .ok_or(KeyserverError::NotFound)?;
        let record = decode_stored(&bytes)?;

        if let Some(expires_at) = record.payload.expires_at() {
            if chrono::Utc::now().timestamp() > expires_at {
                return Err(KeyserverError::ExpiredTtl);
            }
        }
        Ok(record)
    }

    /// Flush and retire the store. Idempotent; subsequent operations fail
    /// with `StorageUnavailable`.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.engine.flush() {
                tracing::warn!(error = %e, "flush on close failed");
            }
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(KeyserverError::StorageUnavailable("store is closed".into()));
        }
        Ok(())
    }
}

/// Stored bytes were produced by us; failing to decode them is an engine
/// integrity problem, not client input.
fn decode_stored(bytes: &[u8]) -> Result<AddressRecord> {
    AddressRecord::from_bytes(bytes)
        .map_err(|e| KeyserverError::StorageUnavailable(format!("corrupt record: {e}")))
}
