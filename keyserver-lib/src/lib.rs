//! Keyserver core library.
//!
//! A permissioned, payment-gated metadata store keyed by cryptocurrency
//! addresses. Wallets publish signed capability and contact metadata under an
//! address; anyone can read it back, but only the holder of the key that the
//! address names may write, and only after presenting a proof-of-payment
//! token.
//!
//! The crate is split along the two halves of that contract:
//!
//! - [`store::AddressStore`]: the cryptographically gated key-value store.
//!   Every write re-checks the address/pubkey binding, monotonic timestamp
//!   ordering, TTL validity, and the payload signature before anything is
//!   persisted.
//! - [`payments::PaymentEnforcer`]: the challenge/response protocol that
//!   issues a payment request on first contact and mints the HMAC bearer
//!   token a client uses to retry the gated call.
//!
//! Storage sits behind the minimal [`storage::KeyValue`] capability so the
//! embedded engine is swappable without touching the gating logic. No HTTP
//! framework types appear in this crate; the daemon adapts the enforcer to
//! its router.

pub mod address;
pub mod errors;
pub mod models;
pub mod payments;
pub mod signature;
pub mod storage;
pub mod store;
pub mod token;

pub use errors::{KeyserverError, Result};
pub use models::{AddressRecord, Entry, Payload, Payment, PaymentAck, PaymentDetails, PaymentRequest};
pub use payments::{PaymentEnforcer, ProofOfPayment};
pub use signature::SignatureScheme;
pub use store::AddressStore;
