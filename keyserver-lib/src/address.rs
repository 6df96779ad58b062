//! Address decoding and the pubkey/address binding.
//!
//! An address is the Base58Check form of `version byte || hash160(pubkey)`.
//! The store never trusts the version byte for authorization. What gates a
//! write is that the submitted pubkey's hash160 equals the script hash the
//! address decodes to.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::errors::{KeyserverError, Result};

/// The 20-byte script hash an address names.
pub type ScriptHash = [u8; 20];

/// Version byte for pay-to-pubkey-hash addresses on the main network.
pub const PUBKEY_HASH_VERSION: u8 = 0x00;

/// `RIPEMD-160(SHA-256(data))`.
pub fn hash160(data: &[u8]) -> ScriptHash {
    let sha = Sha256::digest(data);
    Ripemd160::digest(sha).into()
}

/// Decode a Base58Check address into its script hash.
pub fn decode_address(address: &str) -> Result<ScriptHash> {
    let raw = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| KeyserverError::InvalidAddress(e.to_string()))?;
    // One version byte followed by the 20-byte script hash.
    if raw.len() != 21 {
        return Err(KeyserverError::InvalidAddress(format!(
            "unexpected decoded length {}",
            raw.len()
        )));
    }
    let mut hash = ScriptHash::default();
    hash.copy_from_slice(&raw[1..]);
    Ok(hash)
}

/// Encode a script hash as a Base58Check address.
pub fn encode_address(version: u8, hash: &ScriptHash) -> String {
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(hash);
    bs58::encode(payload).with_check().into_string()
}

/// The canonical address for a public key.
pub fn address_for_pubkey(pubkey: &[u8]) -> String {
    encode_address(PUBKEY_HASH_VERSION, &hash160(pubkey))
}
