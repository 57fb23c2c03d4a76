//! Feast of Esther backend.
//!
//! Registrations and donations are drafted by the frontend, paid through
//! Stripe Checkout or PayPal Orders, and only become durable records once
//! the payment is confirmed and reconciled. See [`reconcile`] for the
//! exactly-once settlement rules.

pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod intents;
pub mod models;
pub mod notify;
pub mod reconcile;
pub mod routes;
pub mod state;
