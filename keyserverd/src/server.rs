//! Router assembly.

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use keyserver_lib::storage::SledEngine;
use keyserver_lib::{AddressStore, PaymentEnforcer};

use crate::config::PAYMENT_URL;
use crate::handlers;

/// Per-request read/write budget.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handles; both are read-mostly for the process lifetime.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<AddressStore<SledEngine>>,
    pub enforcer: Arc<PaymentEnforcer>,
}

/// Build the full router.
///
/// Only the mutating key route sits behind the payment gate; reads, payment
/// submission, and health stay open.
pub fn build_router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/keys/{address}", put(handlers::set_key))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_payment,
        ));

    Router::new()
        .merge(gated)
        .route("/keys/{address}", get(handlers::get_key))
        .route(PAYMENT_URL, post(handlers::submit_payment))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
