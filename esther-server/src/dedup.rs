//! Processed-confirmation dedup set.
//!
//! Both the webhook and the client verify endpoint can confirm the same
//! payment, and providers retry webhooks. The claim must be atomic and it
//! must happen before the durable write; a claim is released again if that
//! write fails so a retry can succeed.

use std::collections::HashSet;
use std::sync::Mutex;

/// Atomic test-and-set over provider references.
pub trait DedupSet: Send + Sync {
    /// Claim `provider_ref`. Returns `true` if this caller won the claim,
    /// `false` if it was already taken.
    fn try_claim(&self, provider_ref: &str) -> bool;

    /// Release a claim after a failed durable write.
    fn release(&self, provider_ref: &str);
}

/// Process-local dedup set.
#[derive(Default)]
pub struct MemoryDedupSet {
    seen: Mutex<HashSet<String>>,
}

impl MemoryDedupSet {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DedupSet for MemoryDedupSet {
    fn try_claim(&self, provider_ref: &str) -> bool {
        self.seen.lock().unwrap().insert(provider_ref.to_string())
    }

    fn release(&self, provider_ref: &str) {
        self.seen.lock().unwrap().remove(provider_ref);
    }
}
