//! Detached notification queue.
//!
//! Request handlers enqueue and move on; a worker task owns the actual
//! sending. A failed send is logged and dropped after the mailer's own
//! retries are exhausted; it never propagates back into the request that
//! queued it, and it never blocks a payment state transition.

use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{Email, MailError, Mailer, Result};

/// An email queued for background delivery.
#[derive(Debug, Clone)]
pub struct EmailJob {
    /// Unique job ID.
    pub id: String,
    /// The email to send.
    pub email: Email,
}

impl EmailJob {
    fn new(email: Email) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email,
        }
    }
}

/// Cloneable handle for enqueueing emails.
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<EmailJob>,
}

impl DispatcherHandle {
    /// Queue an email for background delivery. Returns immediately.
    pub fn enqueue(&self, email: Email) -> Result<()> {
        let job = EmailJob::new(email);
        debug!(job_id = %job.id, "Enqueueing email");
        self.tx
            .send(job)
            .map_err(|_| MailError::Queue("dispatcher worker has shut down".into()))
    }
}

/// Spawn the dispatcher worker and return a handle for enqueueing.
///
/// The worker drains the queue until every handle is dropped.
pub fn spawn_dispatcher(mailer: Mailer) -> DispatcherHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<EmailJob>();

    tokio::spawn(async move {
        info!("Email dispatcher worker started");
        while let Some(job) = rx.recv().await {
            match mailer.send(job.email.clone()).await {
                Ok(()) => debug!(job_id = %job.id, "Email delivered"),
                Err(e) => {
                    // Operational alert; the triggering state transition
                    // already committed and must not be rolled back.
                    error!(
                        job_id = %job.id,
                        to = ?job.email.to,
                        subject = ?job.email.subject,
                        error = %e,
                        "Failed to deliver notification email"
                    );
                }
            }
        }
        info!("Email dispatcher worker stopped");
    });

    DispatcherHandle { tx }
}
