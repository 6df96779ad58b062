//! End-to-end tests over a real listener.
//!
//! Each test boots the full router against a scratch database on an
//! ephemeral port and drives it with a plain HTTP client. Redirects are
//! disabled so the payment endpoint's 302 is observable.

use std::collections::BTreeMap;
use std::sync::Arc;

use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::schnorr;
use rand::rngs::OsRng;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION};
use sha2::{Digest, Sha256};

use keyserver_lib::payments::{PAYMENT_ACK_CONTENT_TYPE, PAYMENT_CONTENT_TYPE};
use keyserver_lib::storage::SledEngine;
use keyserver_lib::{
    address, token, AddressRecord, AddressStore, Entry, Payload, Payment, PaymentAck,
    PaymentEnforcer, PaymentRequest, SignatureScheme,
};
use keyserverd::config::PAYMENT_URL;
use keyserverd::server::{build_router, AppState};

const TEST_SECRET: &str = "notasecret";

/// Boot the server on an ephemeral port. Returns the base URL; the tempdir
/// keeps the database alive for the test's duration.
async fn start_server() -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = SledEngine::open(dir.path()).expect("open engine");
    let state = AppState {
        store: Arc::new(AddressStore::new(engine)),
        enforcer: Arc::new(PaymentEnforcer::new(
            PAYMENT_URL,
            Some(TEST_SECRET.to_string()),
        )),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    (format!("http://{addr}"), dir)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .expect("client")
}

struct TestIdentity {
    signing: schnorr::SigningKey,
    pubkey: Vec<u8>,
    address: String,
}

fn test_identity() -> TestIdentity {
    let signing = schnorr::SigningKey::random(&mut OsRng);
    let mut pubkey = vec![0x02];
    pubkey.extend_from_slice(&signing.verifying_key().to_bytes());
    let address = address::address_for_pubkey(&pubkey);
    TestIdentity {
        signing,
        pubkey,
        address,
    }
}

fn signed_record(identity: &TestIdentity, timestamp: i64) -> AddressRecord {
    let mut headers = BTreeMap::new();
    headers.insert("type".to_string(), "contact".to_string());
    let payload = Payload {
        timestamp,
        ttl: 0,
        entries: vec![Entry {
            kind: "telegram".to_string(),
            headers,
            data: b"@keyholder".to_vec(),
        }],
    };
    let digest: [u8; 32] = Sha256::digest(payload.canonical_bytes().unwrap()).into();
    let sig: schnorr::Signature = identity.signing.sign_prehash(&digest).unwrap();
    AddressRecord {
        pubkey: identity.pubkey.clone(),
        payload,
        scheme: SignatureScheme::Schnorr,
        signature: sig.to_bytes().to_vec(),
    }
}

#[tokio::test]
async fn full_payment_flow() {
    let (base, _dir) = start_server().await;
    let client = client();

    let identity = test_identity();
    let record = signed_record(&identity, chrono::Utc::now().timestamp());
    let record_bytes = record.to_bytes().unwrap();
    let key_path = format!("/keys/{}", identity.address);
    let key_url = format!("{base}{key_path}");

    // A naked PUT is challenged.
    let response = client
        .put(&key_url)
        .body(record_bytes.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 402);
    let challenge = PaymentRequest::from_bytes(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(challenge.pki_type, "none");
    assert_eq!(challenge.payment_details_version, 1);
    let details = challenge.details().unwrap();
    assert_eq!(details.network, "main");
    assert!(details.expires > details.time);
    assert_eq!(details.payment_url, PAYMENT_URL);
    assert_eq!(details.merchant_data, key_path.clone().into_bytes());

    // Pay: correct headers give a 302 with the token in both places.
    let payment = Payment {
        merchant_data: details.merchant_data.clone(),
        memo: Some("here you go".to_string()),
        ..Payment::default()
    };
    let response = client
        .post(format!("{base}{PAYMENT_URL}"))
        .header(CONTENT_TYPE, PAYMENT_CONTENT_TYPE)
        .header(ACCEPT, PAYMENT_ACK_CONTENT_TYPE)
        .body(payment.to_bytes().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 302);

    let auth = response
        .headers()
        .get(AUTHORIZATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let location = response
        .headers()
        .get(LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let pop_token = auth.strip_prefix("POP ").expect("POP scheme").to_string();
    assert_eq!(location, format!("{key_path}?code={pop_token}"));

    let ack = PaymentAck::from_bytes(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(ack.payment, payment);

    // Retry through the redirect URL (`?code=` transport).
    let response = client
        .put(format!("{base}{location}"))
        .body(record_bytes.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Read it back.
    let response = client.get(&key_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let fetched = AddressRecord::from_bytes(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(fetched, record);

    // The POP header transport also passes the gate; the store then refuses
    // the replayed timestamp.
    let response = client
        .put(&key_url)
        .header(AUTHORIZATION, &auth)
        .body(record_bytes.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // A strictly newer record goes through.
    let newer = signed_record(&identity, record.payload.timestamp + 1);
    let response = client
        .put(&key_url)
        .header(AUTHORIZATION, &auth)
        .body(newer.to_bytes().unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
}

#[tokio::test]
async fn payment_endpoint_enforces_headers() {
    let (base, _dir) = start_server().await;
    let client = client();

    let payment = Payment {
        merchant_data: b"/keys/foo".to_vec(),
        ..Payment::default()
    };
    let body = payment.to_bytes().unwrap();

    // Missing Content-Type.
    let response = client
        .post(format!("{base}{PAYMENT_URL}"))
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 415);

    // Right Content-Type, wrong Accept.
    let response = client
        .post(format!("{base}{PAYMENT_URL}"))
        .header(CONTENT_TYPE, PAYMENT_CONTENT_TYPE)
        .header(ACCEPT, "application/json")
        .body(body.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 406);
}

#[tokio::test]
async fn invalid_tokens_are_still_challenged() {
    let (base, _dir) = start_server().await;
    let client = client();
    let identity = test_identity();
    let record_bytes = signed_record(&identity, chrono::Utc::now().timestamp())
        .to_bytes()
        .unwrap();

    let response = client
        .put(format!("{base}/keys/{}", identity.address))
        .header(AUTHORIZATION, "POP bogus")
        .body(record_bytes)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 402);
}

#[tokio::test]
async fn paid_but_malformed_body_is_rejected() {
    let (base, _dir) = start_server().await;
    let client = client();

    // Mint a valid token out of band with the shared secret.
    let path = "/keys/somewhere";
    let code = token::generate(path, TEST_SECRET);
    let response = client
        .put(format!("{base}{path}?code={code}"))
        .body(Vec::from(&b"not a record"[..]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn paid_pubkey_mismatch_is_rejected() {
    let (base, _dir) = start_server().await;
    let client = client();

    let signer = test_identity();
    let other = test_identity();
    let record_bytes = signed_record(&signer, chrono::Utc::now().timestamp())
        .to_bytes()
        .unwrap();

    let path = format!("/keys/{}", other.address);
    let code = token::generate(&path, TEST_SECRET);
    let response = client
        .put(format!("{base}{path}?code={code}"))
        .body(record_bytes)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn get_unknown_address_is_404() {
    let (base, _dir) = start_server().await;
    let client = client();
    let identity = test_identity();

    let response = client
        .get(format!("{base}/keys/{}", identity.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn reads_are_not_payment_gated() {
    let (base, _dir) = start_server().await;
    let client = client();

    // 404, not 402: the gate only fronts mutations.
    let response = client
        .get(format!("{base}/keys/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
}
