//! Shared application state.

use std::sync::Arc;

use esther_payments::{PayPalOrders, StripeCheckout};

use crate::config::Config;
use crate::db::RecordStore;
use crate::intents::IntentStore;
use crate::notify::Notifier;
use crate::reconcile::ReconciliationEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stripe: Arc<StripeCheckout>,
    pub paypal: Arc<PayPalOrders>,
    pub intents: Arc<dyn IntentStore>,
    pub engine: Arc<ReconciliationEngine>,
    pub records: Arc<dyn RecordStore>,
    pub notifier: Arc<dyn Notifier>,
}
