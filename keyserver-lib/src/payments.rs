//! Pay-for-put enforcement.
//!
//! A two-state gate computed per request: a mutating call either carries a
//! valid proof-of-payment token and proceeds, or it is answered with a
//! payment challenge telling the client where to pay. Submitting a payment
//! artifact to the payment endpoint mints the token for one retry of the
//! original call. The enforcer holds no per-client state; the HMAC secret
//! is the only thing shared between challenge and redemption.
//!
//! This module is transport-agnostic; the daemon adapts it to HTTP. The
//! pieces of a request it cares about are the request URL, the
//! `Authorization` header value, and (for the payment endpoint) the
//! `Content-Type`/`Accept` pair.

use crate::errors::{KeyserverError, Result};
use crate::models::{Payment, PaymentAck, PaymentDetails, PaymentRequest};
use crate::token;

/// Content type a posted payment must carry.
pub const PAYMENT_CONTENT_TYPE: &str = "application/bitcoincash-payment";
/// Content type the payment acknowledgement is served as, and the `Accept`
/// value a payment submission must declare.
pub const PAYMENT_ACK_CONTENT_TYPE: &str = "application/bitcoincash-paymentack";
/// Content type of the serialized challenge in a 402 response.
pub const PAYMENT_REQUEST_CONTENT_TYPE: &str = "application/bitcoincash-paymentrequest";

/// Authorization scheme for proof-of-payment tokens.
pub const POP_SCHEME: &str = "POP";

/// Seconds a payment challenge stays fresh. Fixed by protocol, not
/// configuration.
const CHALLENGE_WINDOW_SECS: u64 = 10;

/// Length of a generated fallback secret.
const GENERATED_SECRET_LEN: usize = 64;

/// Memo returned with every payment acknowledgement.
const ACK_MEMO: &str = "Thank you for your payment";

/// Outcome of redeeming a payment: the minted token, where to send the
/// client, and the acknowledgement to return.
#[derive(Clone, Debug)]
pub struct ProofOfPayment {
    /// The bearer token, also embedded in `redirect`.
    pub token: String,
    /// The original gated URL with `code=<token>` applied.
    pub redirect: String,
    /// Acknowledgement echoing the payment back.
    pub ack: PaymentAck,
}

/// Stateless challenge/redemption handler for payment-gated routes.
pub struct PaymentEnforcer {
    payment_url: String,
    secret: String,
}

impl PaymentEnforcer {
    /// Build an enforcer redirecting payments to `payment_url`. When
    /// `secret` is `None` an ephemeral one is generated; tokens then die
    /// with the process.
    pub fn new(payment_url: impl Into<String>, secret: Option<String>) -> Self {
        Self {
            payment_url: payment_url.into(),
            secret: secret.unwrap_or_else(|| token::random_secret(GENERATED_SECRET_LEN)),
        }
    }

    /// Where payment submissions should be POSTed.
    pub fn payment_url(&self) -> &str {
        &self.payment_url
    }

    /// Decide whether `request_url` carries a valid proof of payment.
    ///
    /// The token is taken from an `Authorization: POP <token>` header in
    /// priority over a `code` query parameter, and validated against the
    /// canonical URL (query stripped), the same message the token was
    /// minted over.
    pub fn validate(&self, request_url: &str, authorization: Option<&str>) -> bool {
        let header_token = authorization
            .and_then(|value| value.strip_prefix(POP_SCHEME))
            .and_then(|rest| rest.strip_prefix(' '));
        let candidate = match header_token.or_else(|| query_param(request_url, "code")) {
            Some(token) => token,
            None => return false,
        };
        token::validate(canonical_url(request_url), candidate, &self.secret)
    }

    /// Build the challenge for an unpaid request to `request_url`.
    pub fn challenge(&self, request_url: &str) -> Result<PaymentRequest> {
        let now = chrono::Utc::now().timestamp() as u64;
        let details = PaymentDetails {
            network: "main".to_string(),
            time: now,
            expires: now + CHALLENGE_WINDOW_SECS,
            payment_url: self.payment_url.clone(),
            merchant_data: canonical_url(request_url).as_bytes().to_vec(),
            outputs: Vec::new(),
            memo: None,
        };
        Ok(PaymentRequest {
            payment_details_version: 1,
            pki_type: "none".to_string(),
            serialized_payment_details: bincode::serialize(&details)
                .map_err(|e| KeyserverError::MalformedPayload(e.to_string()))?,
        })
    }

    /// Accept a payment artifact and mint the proof of payment.
    ///
    /// The artifact's monetary contents are not inspected; presence of a
    /// well-formed payment is the whole proof.
    pub fn redeem(&self, payment: &Payment) -> Result<ProofOfPayment> {
        let merchant_data = std::str::from_utf8(&payment.merchant_data)
            .map_err(|_| KeyserverError::MalformedPayload("merchant data is not utf-8".into()))?;

        let minted = token::generate(canonical_url(merchant_data), &self.secret);
        let redirect = with_code_param(merchant_data, &minted);
        let ack = PaymentAck {
            payment: payment.clone(),
            memo: Some(ACK_MEMO.to_string()),
        };
        Ok(ProofOfPayment {
            token: minted,
            redirect,
            ack,
        })
    }

    /// Check the header pair a payment submission must carry.
    pub fn check_payment_headers(
        &self,
        content_type: Option<&str>,
        accept: Option<&str>,
    ) -> Result<()> {
        match content_type {
            Some(PAYMENT_CONTENT_TYPE) => {}
            other => {
                return Err(KeyserverError::ContentTypeMismatch(
                    other.unwrap_or("<missing>").to_string(),
                ))
            }
        }
        match accept {
            Some(PAYMENT_ACK_CONTENT_TYPE) => Ok(()),
            other => Err(KeyserverError::AcceptMismatch(
                other.unwrap_or("<missing>").to_string(),
            )),
        }
    }
}

/// Strip the query string. Tokens are minted and validated over this form so
/// the `code` parameter itself never disturbs the MAC.
pub fn canonical_url(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}

/// Extract a raw query parameter value.
fn query_param<'a>(url: &'a str, name: &str) -> Option<&'a str> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Apply `code=<token>` to a URL, keeping any other query parameters.
fn with_code_param(url: &str, token: &str) -> String {
    let base = canonical_url(url);
    let mut params: Vec<String> = url
        .split_once('?')
        .map(|(_, query)| {
            query
                .split('&')
                .filter(|pair| !pair.starts_with("code=") && !pair.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    params.push(format!("code={token}"));
    format!("{base}?{}", params.join("&"))
}
