//! Payment reconciliation.
//!
//! A payment can be confirmed by the provider webhook, by the client's
//! verify call after redirect, or by both, in any order and any number of
//! times. This engine makes the durable write happen exactly once per
//! provider reference regardless of how many confirmations arrive.
//!
//! Order of operations matters:
//!
//! 1. claim the provider reference in the dedup set (atomic test-and-set);
//! 2. resolve the pending intent;
//! 3. write the durable record;
//! 4. only then drop the intent and queue notifications.
//!
//! If the durable write fails, the claim is released so the provider's
//! webhook retry (or the client's verify) can complete the payment later.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dedup::DedupSet;
use crate::db::{RecordStore, StoreError};
use crate::error::ApiError;
use crate::intents::IntentStore;
use crate::models::{
    DonationRecord, IntentPayload, PaymentMethod, PaymentStatus, RegistrationRecord,
};
use crate::notify::Notifier;

/// What a confirmation attempt resolved to. All three are successes from
/// the caller's point of view; the provider must never see an error for a
/// payment that is merely already settled or unmatchable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// This confirmation performed the durable write.
    Completed { kind: &'static str, record_id: i64 },
    /// Another confirmation already settled this provider reference.
    AlreadyProcessed,
    /// Payment confirmed but no pending intent matches it. Money moved and
    /// we cannot say for whom; acknowledged so the provider stops retrying,
    /// logged for manual follow-up.
    Orphaned,
}

pub struct ReconciliationEngine {
    records: Arc<dyn RecordStore>,
    intents: Arc<dyn IntentStore>,
    dedup: Arc<dyn DedupSet>,
    notifier: Arc<dyn Notifier>,
}

impl ReconciliationEngine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        intents: Arc<dyn IntentStore>,
        dedup: Arc<dyn DedupSet>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            records,
            intents,
            dedup,
            notifier,
        }
    }

    /// Settle a confirmed payment against its pending intent.
    ///
    /// `provider_ref` is the Stripe session id or PayPal order id;
    /// `intent_id` comes from the provider's metadata / custom_id echo.
    pub async fn record_completed_payment(
        &self,
        provider_ref: &str,
        intent_id: &str,
        method: PaymentMethod,
    ) -> Result<Outcome, ApiError> {
        if !self.dedup.try_claim(provider_ref) {
            info!(provider_ref, "Payment already processed, skipping");
            return Ok(Outcome::AlreadyProcessed);
        }

        let Some(intent) = self.intents.get(intent_id).await else {
            // The claim is kept: repeated deliveries of the same orphan
            // should not re-alert.
            error!(
                provider_ref,
                intent_id,
                "Confirmed payment has no matching pending intent; manual follow-up required"
            );
            return Ok(Outcome::Orphaned);
        };

        let write = match &intent.payload {
            IntentPayload::Registration(draft) => {
                let record = RegistrationRecord {
                    draft: draft.clone(),
                    payment_method: method,
                    payment_status: PaymentStatus::Completed,
                    provider_ref: Some(provider_ref.to_string()),
                };
                self.records
                    .insert_registration(&record)
                    .await
                    .map(|id| ("registration", id))
            }
            IntentPayload::Donation(draft) => {
                let record = DonationRecord {
                    draft: draft.clone(),
                    payment_method: method,
                    payment_status: PaymentStatus::Completed,
                    provider_ref: Some(provider_ref.to_string()),
                };
                self.records
                    .insert_donation(&record)
                    .await
                    .map(|id| ("donation", id))
            }
        };

        let (kind, record_id) = match write {
            Ok(row) => row,
            Err(StoreError::Conflict(detail)) => {
                // The row survived a previous run that crashed before its
                // bookkeeping finished. The payment is settled; redo the
                // bookkeeping and acknowledge, keeping the claim, or the
                // provider will redeliver forever.
                warn!(provider_ref, intent_id, detail = %detail, "Record already exists, treating as settled");
                let _ = self.intents.remove(intent_id).await;
                return Ok(Outcome::AlreadyProcessed);
            }
            Err(e) => {
                // Release so the next confirmation attempt can retry the
                // write; the intent stays in the store untouched.
                self.dedup.release(provider_ref);
                warn!(provider_ref, intent_id, error = %e, "Durable write failed, claim released");
                return Err(e.into());
            }
        };

        let _ = self.intents.remove(intent_id).await;

        match &intent.payload {
            IntentPayload::Registration(draft) => {
                self.notifier.registration_confirmed(draft, provider_ref)
            }
            IntentPayload::Donation(draft) => self.notifier.donation_received(draft, provider_ref),
        }

        info!(provider_ref, intent_id, kind, record_id, "Payment reconciled");
        Ok(Outcome::Completed { kind, record_id })
    }
}
