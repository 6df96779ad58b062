//! HTTP handlers and the payment gate middleware.
//!
//! Thin adapters between axum and the library: extract what the enforcer and
//! store need from the request, map `KeyserverError` onto status codes, and
//! keep every body in the binary wire format.

use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use keyserver_lib::payments::{
    POP_SCHEME, PAYMENT_ACK_CONTENT_TYPE, PAYMENT_REQUEST_CONTENT_TYPE,
};
use keyserver_lib::{AddressRecord, KeyserverError, Payment};

use crate::server::AppState;

/// Gate in front of mutating key routes.
///
/// A request with a valid proof-of-payment token passes through untouched;
/// anything else is answered with a 402 carrying the serialized payment
/// challenge.
pub async fn require_payment(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let url = request.uri().to_string();
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    if state.enforcer.validate(&url, authorization.as_deref()) {
        return next.run(request).await;
    }

    tracing::debug!(url = %url, "challenging unpaid request");
    let challenge = state
        .enforcer
        .challenge(&url)
        .and_then(|request| request.to_bytes());
    match challenge {
        Ok(bytes) => binary_response(StatusCode::PAYMENT_REQUIRED, PAYMENT_REQUEST_CONTENT_TYPE, bytes),
        Err(error) => error_response(&error),
    }
}

/// `PUT /keys/{address}`: store a record under the address in the path.
pub async fn set_key(
    State(state): State<AppState>,
    Path(address): Path<String>,
    body: Bytes,
) -> Response {
    let record = match AddressRecord::from_bytes(&body) {
        Ok(record) => record,
        Err(error) => return error_response(&error),
    };

    match state.store.set(&address, &record) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => error_response(&error),
    }
}

/// `GET /keys/{address}`: fetch a record. Expired records read as absent.
pub async fn get_key(State(state): State<AppState>, Path(address): Path<String>) -> Response {
    match state.store.get(&address).and_then(|record| record.to_bytes()) {
        Ok(bytes) => binary_response(StatusCode::OK, "application/octet-stream", bytes),
        Err(KeyserverError::NotFound) | Err(KeyserverError::ExpiredTtl) => {
            (StatusCode::NOT_FOUND, "key not found").into_response()
        }
        Err(error) => error_response(&error),
    }
}

/// `POST /payments`: accept a payment artifact, mint the proof-of-payment
/// token, and redirect back to the gated URL.
pub async fn submit_payment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok());
    let accept = headers
        .get(header::ACCEPT)
        .and_then(|value| value.to_str().ok());
    if let Err(error) = state.enforcer.check_payment_headers(content_type, accept) {
        return error_response(&error);
    }

    let payment = match Payment::from_bytes(&body) {
        Ok(payment) => payment,
        Err(error) => return error_response(&error),
    };
    tracing::info!(memo = payment.memo.as_deref().unwrap_or(""), "payment received");

    let proof = match state.enforcer.redeem(&payment) {
        Ok(proof) => proof,
        Err(error) => return error_response(&error),
    };
    let ack = match proof.ack.to_bytes() {
        Ok(bytes) => bytes,
        Err(error) => return error_response(&error),
    };

    Response::builder()
        .status(StatusCode::FOUND)
        .header(header::AUTHORIZATION, format!("{POP_SCHEME} {}", proof.token))
        .header(header::LOCATION, proof.redirect)
        .header(header::PRAGMA, "no-cache")
        .header(header::CONTENT_TYPE, PAYMENT_ACK_CONTENT_TYPE)
        .body(Body::from(ack))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

pub async fn health() -> &'static str {
    "ok"
}

fn binary_response(status: StatusCode, content_type: &'static str, body: Vec<u8>) -> Response {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header("Content-Transfer-Encoding", "binary")
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn status_for(error: &KeyserverError) -> StatusCode {
    match error {
        KeyserverError::InvalidAddress(_)
        | KeyserverError::PubkeyMismatch
        | KeyserverError::OutdatedUpdate
        | KeyserverError::ExpiredTtl
        | KeyserverError::InvalidSignature
        | KeyserverError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        KeyserverError::NotFound => StatusCode::NOT_FOUND,
        KeyserverError::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        KeyserverError::ContentTypeMismatch(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        KeyserverError::AcceptMismatch(_) => StatusCode::NOT_ACCEPTABLE,
        KeyserverError::TokenInvalid => StatusCode::PAYMENT_REQUIRED,
    }
}

fn error_response(error: &KeyserverError) -> Response {
    let status = status_for(error);
    if status.is_server_error() {
        tracing::error!(error = %error, "request failed");
    } else {
        tracing::warn!(error = %error, "request rejected");
    }
    (status, error.to_string()).into_response()
}
