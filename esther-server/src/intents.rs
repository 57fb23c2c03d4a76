//! Pending payment intents.
//!
//! An intent is captured when a checkout session or order is created and
//! resolved when the payment is confirmed. The store is the bridge between
//! those two moments: nothing is durable until confirmation, so a lost
//! intent means a lost registration. The file snapshot is best-effort
//! insurance across restarts; the in-memory map is the source of truth.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{IntentPayload, StoredIntent};

/// Holds drafts between session creation and payment confirmation.
#[async_trait]
pub trait IntentStore: Send + Sync {
    /// Store a new intent and return its id.
    ///
    /// Fails with [`ApiError::DuplicateInFlight`] when an unresolved intent
    /// for the same email and kind was created within the cooldown window.
    async fn create(&self, payload: IntentPayload) -> Result<String, ApiError>;

    /// Look up an intent without resolving it.
    async fn get(&self, intent_id: &str) -> Option<StoredIntent>;

    /// Most recent unresolved intent for an email and kind, if any.
    async fn find_by_email(&self, email: &str, kind: &str) -> Option<(String, StoredIntent)>;

    /// Resolve an intent, returning its payload. Removing an id that is
    /// absent (already resolved, or expired) returns `None` and is not an
    /// error.
    async fn remove(&self, intent_id: &str) -> Option<StoredIntent>;

    /// Drop intents older than `ttl_secs`, returning how many were removed.
    async fn sweep_expired(&self, ttl_secs: i64) -> usize;
}

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    intents: HashMap<String, StoredIntent>,
}

/// In-memory intent map with a JSON file snapshot written on every mutation.
pub struct FileBackedIntentStore {
    intents: Mutex<HashMap<String, StoredIntent>>,
    path: Option<PathBuf>,
    cooldown_secs: i64,
}

impl FileBackedIntentStore {
    /// Load any existing snapshot from `path`; a missing or unreadable file
    /// starts the store empty.
    pub fn new(path: Option<PathBuf>, cooldown_secs: i64) -> Self {
        let intents = match &path {
            Some(p) => match std::fs::read_to_string(p) {
                Ok(contents) => match serde_json::from_str::<Snapshot>(&contents) {
                    Ok(snapshot) => {
                        info!(
                            count = snapshot.intents.len(),
                            "Restored pending intents from snapshot"
                        );
                        snapshot.intents
                    }
                    Err(e) => {
                        warn!(error = %e, "Pending intent snapshot is corrupt, starting empty");
                        HashMap::new()
                    }
                },
                Err(_) => HashMap::new(),
            },
            None => HashMap::new(),
        };

        Self {
            intents: Mutex::new(intents),
            path,
            cooldown_secs,
        }
    }

    /// In-memory store for tests.
    pub fn ephemeral(cooldown_secs: i64) -> Self {
        Self::new(None, cooldown_secs)
    }

    fn persist(&self, snapshot: Snapshot) {
        let Some(path) = &self.path else { return };
        match serde_json::to_string_pretty(&snapshot) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!(error = %e, path = %path.display(), "Failed to write intent snapshot");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize intent snapshot"),
        }
    }

    fn snapshot_of(map: &HashMap<String, StoredIntent>) -> Snapshot {
        Snapshot {
            intents: map.clone(),
        }
    }
}

#[async_trait]
impl IntentStore for FileBackedIntentStore {
    async fn create(&self, payload: IntentPayload) -> Result<String, ApiError> {
        let now = Utc::now();
        let cooldown = Duration::seconds(self.cooldown_secs);
        let snapshot;
        let intent_id;
        {
            let mut map = self.intents.lock().unwrap();

            let in_flight = map.values().any(|intent| {
                intent.payload.email().eq_ignore_ascii_case(payload.email())
                    && intent.payload.kind() == payload.kind()
                    && now - intent.created_at < cooldown
            });
            if in_flight {
                debug!(email = %payload.email(), "Rejecting submission within cooldown window");
                return Err(ApiError::DuplicateInFlight);
            }

            intent_id = Uuid::new_v4().to_string();
            map.insert(
                intent_id.clone(),
                StoredIntent {
                    payload,
                    created_at: now,
                },
            );
            snapshot = Self::snapshot_of(&map);
        }
        self.persist(snapshot);
        debug!(intent_id = %intent_id, "Stored pending intent");
        Ok(intent_id)
    }

    async fn get(&self, intent_id: &str) -> Option<StoredIntent> {
        self.intents.lock().unwrap().get(intent_id).cloned()
    }

    async fn find_by_email(&self, email: &str, kind: &str) -> Option<(String, StoredIntent)> {
        self.intents
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, intent)| {
                intent.payload.email().eq_ignore_ascii_case(email)
                    && intent.payload.kind() == kind
            })
            .max_by_key(|(_, intent)| intent.created_at)
            .map(|(id, intent)| (id.clone(), intent.clone()))
    }

    async fn remove(&self, intent_id: &str) -> Option<StoredIntent> {
        let (removed, snapshot) = {
            let mut map = self.intents.lock().unwrap();
            let removed = map.remove(intent_id);
            let snapshot = removed.is_some().then(|| Self::snapshot_of(&map));
            (removed, snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.persist(snapshot);
        }
        removed
    }

    async fn sweep_expired(&self, ttl_secs: i64) -> usize {
        let cutoff = Utc::now() - Duration::seconds(ttl_secs);
        let (swept, snapshot) = {
            let mut map = self.intents.lock().unwrap();
            let before = map.len();
            map.retain(|_, intent| intent.created_at > cutoff);
            let swept = before - map.len();
            let snapshot = (swept > 0).then(|| Self::snapshot_of(&map));
            (swept, snapshot)
        };
        if let Some(snapshot) = snapshot {
            self.persist(snapshot);
            info!(count = swept, "Swept expired pending intents");
        }
        swept
    }
}
