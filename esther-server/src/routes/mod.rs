//! HTTP surface.
//!
//! All responses share the `{ "success": bool, ... }` envelope the
//! frontend expects. Confirmation can arrive through the Stripe webhook,
//! through the verify endpoints after redirect, or both; every path funnels
//! into the reconciliation engine.

mod donations;
mod payments;
mod registrations;
mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/registrations", post(registrations::create_offline))
        .route(
            "/api/registrations/checkout-sessions",
            post(registrations::create_checkout_session),
        )
        .route(
            "/api/registrations/paypal-orders",
            post(registrations::create_paypal_order),
        )
        .route("/api/donations", post(donations::create_offline))
        .route(
            "/api/donations/checkout-sessions",
            post(donations::create_checkout_session),
        )
        .route(
            "/api/donations/paypal-orders",
            post(donations::create_paypal_order),
        )
        .route(
            "/api/checkout-sessions/:session_id",
            get(payments::verify_checkout_session),
        )
        .route(
            "/api/paypal-orders/:order_id/verify",
            get(payments::verify_paypal_order),
        )
        .route("/api/webhooks/stripe", post(webhooks::stripe_webhook))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
