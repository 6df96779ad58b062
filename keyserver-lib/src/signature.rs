//! Payload signature verification (secp256k1).
//!
//! Records declare one of two closed schemes. Schnorr is the BIP340-style
//! 64-byte form; Ecdsa is DER-encoded. Both verify against the 32-byte
//! SHA-256 digest of the payload's canonical bytes. Any parse failure, of
//! the signature or of a pubkey unusable under the declared scheme, comes
//! back as `InvalidSignature`, one undifferentiated surface for callers.

use k256::ecdsa;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::schnorr;
use serde::{Deserialize, Serialize};

use crate::errors::{KeyserverError, Result};

/// SEC1 tag for a compressed point with even y.
const TAG_COMPRESSED_EVEN: u8 = 0x02;

/// The signature scheme a record declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureScheme {
    /// BIP340-style Schnorr over secp256k1, 64-byte signatures.
    Schnorr,
    /// ECDSA over secp256k1, DER-encoded signatures.
    Ecdsa,
}

/// Verify `signature` over a 32-byte digest under `pubkey` with the declared
/// scheme.
pub fn verify_digest(
    scheme: SignatureScheme,
    pubkey: &[u8],
    digest: &[u8; 32],
    signature: &[u8],
) -> Result<()> {
    match scheme {
        SignatureScheme::Schnorr => {
            let key = schnorr_verifying_key(pubkey)?;
            let sig = schnorr::Signature::try_from(signature)
                .map_err(|_| KeyserverError::InvalidSignature)?;
            key.verify_prehash(digest, &sig)
                .map_err(|_| KeyserverError::InvalidSignature)
        }
        SignatureScheme::Ecdsa => {
            let key = ecdsa::VerifyingKey::from_sec1_bytes(pubkey)
                .map_err(|_| KeyserverError::InvalidSignature)?;
            let sig = ecdsa::Signature::from_der(signature)
                .map_err(|_| KeyserverError::InvalidSignature)?;
            key.verify_prehash(digest, &sig)
                .map_err(|_| KeyserverError::InvalidSignature)
        }
    }
}

/// Interpret a SEC1 public key as a BIP340 verifying key.
///
/// BIP340 keys are x-only and implicitly even-y; a key whose point has odd
/// parity cannot verify under the Schnorr scheme.
fn schnorr_verifying_key(pubkey: &[u8]) -> Result<schnorr::VerifyingKey> {
    let key =
        k256::PublicKey::from_sec1_bytes(pubkey).map_err(|_| KeyserverError::InvalidSignature)?;
    let compressed = key.to_encoded_point(true);
    let bytes = compressed.as_bytes();
    if bytes[0] != TAG_COMPRESSED_EVEN {
        return Err(KeyserverError::InvalidSignature);
    }
    schnorr::VerifyingKey::from_bytes(&bytes[1..]).map_err(|_| KeyserverError::InvalidSignature)
}
