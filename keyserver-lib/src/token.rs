//! Proof-of-payment token codec.
//!
//! A token is `base64url(HMAC-SHA256(secret, message))` where the message is
//! the canonical URL of the gated request. Tokens are never stored: the
//! server recomputes the MAC on every validation and compares in constant
//! time. Validation answers with a bare boolean; it never says which of the
//! message, token, or secret was wrong.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate a token for `message` under `secret`.
pub fn generate(message: &str, secret: &str) -> String {
    URL_SAFE.encode(mac_bytes(message, secret))
}

/// Check a token against `message` and `secret`.
///
/// Any decode failure is just `false`.
pub fn validate(message: &str, token: &str, secret: &str) -> bool {
    let decoded = match URL_SAFE.decode(token) {
        Ok(decoded) => decoded,
        Err(_) => return false,
    };
    let mut mac = keyed_mac(secret);
    mac.update(message.as_bytes());
    // verify_slice is constant-time.
    mac.verify_slice(&decoded).is_ok()
}

/// A random alphanumeric secret, for processes started without one
/// configured. Rotating the secret invalidates outstanding challenges.
pub fn random_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn keyed_mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length.
    HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key length")
}

fn mac_bytes(message: &str, secret: &str) -> Vec<u8> {
    let mut mac = keyed_mac(secret);
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_then_validate() {
        let secret = random_secret(64);
        let message = random_secret(64);

        let token = generate(&message, &secret);
        assert!(validate(&message, &token, &secret));
        assert!(!validate("not the message", &token, &secret));
        assert!(!validate(&message, &token, "not the secret"));
    }

    #[test]
    fn mutating_any_byte_invalidates() {
        let secret = "s3cret";
        let message = "/keys/qMZnSzB7y3HTK2ZyM1PbYyPBBYBP9DDE4A";
        let token = generate(message, secret);

        let mut altered_message = message.to_string();
        altered_message.replace_range(0..1, "k");
        assert!(!validate(&altered_message, &token, secret));

        // Flip one character of the token itself.
        let mut altered_token = token.clone();
        let head = if altered_token.starts_with('A') { "B" } else { "A" };
        altered_token.replace_range(0..1, head);
        assert!(!validate(message, &altered_token, secret));

        let mut altered_secret = secret.to_string();
        altered_secret.replace_range(0..1, "z");
        assert!(!validate(message, &token, &altered_secret));
    }

    #[test]
    fn undecodable_token_is_false() {
        assert!(!validate("/keys/foo", "!!!not base64url!!!", "secret"));
        assert!(!validate("/keys/foo", "", "secret"));
    }

    #[test]
    fn random_secret_length_and_charset() {
        let secret = random_secret(64);
        assert_eq!(secret.len(), 64);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
