//! Error types for keyserver operations.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KeyserverError>;

/// Failure modes of the store and the payment protocol.
///
/// Every variant is recovered at the request boundary and mapped to a status
/// code there; nothing in this crate panics on bad input. Token validation is
/// deliberately not represented here with any detail; it collapses to a
/// single boolean so a caller can never learn whether the message or the
/// token was wrong.
#[derive(Debug, thiserror::Error)]
pub enum KeyserverError {
    /// The address string could not be decoded.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The submitted pubkey does not hash to the address's script hash.
    #[error("public key does not match address")]
    PubkeyMismatch,

    /// An update carried a timestamp at or behind the stored record.
    #[error("outdated value attempting to be used as an update")]
    OutdatedUpdate,

    /// The record is expired relative to its own timestamp and TTL.
    #[error("record expired by its ttl")]
    ExpiredTtl,

    /// Signature parse failure or verification mismatch.
    #[error("signature did not verify")]
    InvalidSignature,

    /// A body or stored value failed to (de)serialize.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// No record stored under the requested address.
    #[error("address metadata not found")]
    NotFound,

    /// The storage engine failed or the store has been closed.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Payment submission with the wrong `Content-Type`.
    #[error("unsupported content type: {0}")]
    ContentTypeMismatch(String),

    /// Payment submission with the wrong `Accept` header.
    #[error("not acceptable: {0}")]
    AcceptMismatch(String),

    /// A proof-of-payment token failed validation.
    #[error("proof-of-payment token invalid")]
    TokenInvalid,
}
