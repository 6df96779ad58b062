//! Wire and storage models.
//!
//! Address records are the stored unit of the keyserver; the payment messages
//! follow the BIP70 shape (details/request/payment/ack) carried by the
//! enforcer. Both travel and persist as bincode. The payload's headers live
//! in a `BTreeMap` so its canonical serialization is stable no matter what
//! order a client inserted them in, which is what makes signing the payload
//! bytes sound.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{KeyserverError, Result};
use crate::signature::SignatureScheme;

/// A single metadata row published under an address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Free-form entry kind, e.g. `"telegram"` or `"vcard"`.
    pub kind: String,
    /// Entry headers. Insertion order is irrelevant; the map keeps the
    /// serialized form canonical.
    pub headers: BTreeMap<String, String>,
    /// Opaque entry body.
    pub data: Vec<u8>,
}

/// The signed portion of an address record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    /// Unix seconds chosen by the writer. Updates must strictly advance this.
    pub timestamp: i64,
    /// Seconds after `timestamp` during which the record is readable.
    /// Zero means no expiry.
    pub ttl: i64,
    /// Published metadata rows.
    pub entries: Vec<Entry>,
}

impl Payload {
    /// Canonical bytes of the payload: the exact message that is hashed and
    /// signed.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }

    /// Absolute expiry time, if the payload carries a TTL.
    pub fn expires_at(&self) -> Option<i64> {
        (self.ttl > 0).then(|| self.timestamp + self.ttl)
    }
}

/// The stored unit, keyed externally by its address.
///
/// The address itself travels in the URL path and is not part of the
/// serialized record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// SEC1-encoded secp256k1 public key whose hash160 must equal the
    /// address's script hash.
    pub pubkey: Vec<u8>,
    /// The signed payload.
    pub payload: Payload,
    /// Which signature scheme `signature` uses.
    pub scheme: SignatureScheme,
    /// Signature over `SHA-256(payload.canonical_bytes())`.
    pub signature: Vec<u8>,
}

impl AddressRecord {
    /// Serialize for storage or the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }

    /// Deserialize a record received from a client.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }
}

/// One requested output of a payment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    /// Amount in satoshis.
    pub amount: u64,
    /// Locking script the payment should fund.
    pub script: Vec<u8>,
}

/// The details half of a payment challenge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Network identifier, `"main"` for this server.
    pub network: String,
    /// Unix seconds the challenge was issued.
    pub time: u64,
    /// Unix seconds after which the challenge is stale.
    pub expires: u64,
    /// Where the payment should be POSTed.
    pub payment_url: String,
    /// Canonical URL of the gated request, echoed back in the payment.
    pub merchant_data: Vec<u8>,
    /// Requested outputs. Output inspection is out of scope for this server,
    /// so these stay empty.
    pub outputs: Vec<Output>,
    /// Human-readable note shown by wallets.
    pub memo: Option<String>,
}

/// The payment challenge sent with a 402 response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Version of the details format. Always 1.
    pub payment_details_version: u32,
    /// PKI type of the request. This server issues unsigned requests,
    /// `"none"`.
    pub pki_type: String,
    /// Serialized [`PaymentDetails`].
    pub serialized_payment_details: Vec<u8>,
}

impl PaymentRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }

    /// Decode the nested details.
    pub fn details(&self) -> Result<PaymentDetails> {
        bincode::deserialize(&self.serialized_payment_details)
            .map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }
}

/// The payment artifact a client POSTs to the payment endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// `merchant_data` copied from the challenge's details.
    pub merchant_data: Vec<u8>,
    /// Raw signed transactions. Not inspected by this server.
    pub transactions: Vec<Vec<u8>>,
    /// Refund outputs. Not inspected by this server.
    pub refund_to: Vec<Output>,
    /// Optional note from the payer.
    pub memo: Option<String>,
}

impl Payment {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }
}

/// The acknowledgement returned after a payment is accepted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentAck {
    /// The payment being acknowledged, echoed back.
    pub payment: Payment,
    /// Optional note from the server.
    pub memo: Option<String>,
}

impl PaymentAck {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        bincode::deserialize(bytes).map_err(|e| KeyserverError::MalformedPayload(e.to_string()))
    }
}
