//! Notification emails.
//!
//! Confirmation and admin-alert emails are fire-and-forget: they are
//! enqueued after the durable write commits and a delivery failure never
//! rolls anything back. The trait exists so the reconciliation engine can
//! be tested against a recording notifier.

use esther_mail::{DispatcherHandle, Email};
use esther_payments::Money;
use tracing::warn;

use crate::models::{DonationDraft, RegistrationDraft};

/// Post-confirmation notifications. Implementations must not block.
pub trait Notifier: Send + Sync {
    fn registration_confirmed(&self, draft: &RegistrationDraft, provider_ref: &str);
    fn donation_received(&self, draft: &DonationDraft, provider_ref: &str);
    /// A registration recorded without an online payment (bank transfer).
    fn registration_pending(&self, draft: &RegistrationDraft);
}

/// Sends real email through the background dispatcher.
pub struct EmailNotifier {
    dispatcher: DispatcherHandle,
    admin_email: Option<String>,
}

impl EmailNotifier {
    pub fn new(dispatcher: DispatcherHandle, admin_email: Option<String>) -> Self {
        Self {
            dispatcher,
            admin_email,
        }
    }

    fn enqueue(&self, email: Email) {
        if let Err(e) = self.dispatcher.enqueue(email) {
            warn!(error = %e, "Could not enqueue notification email");
        }
    }

    fn enqueue_admin(&self, subject: String, text: String) {
        let Some(admin) = &self.admin_email else { return };
        self.enqueue(Email::new().to(admin.clone()).subject(subject).text(text));
    }
}

impl Notifier for EmailNotifier {
    fn registration_confirmed(&self, draft: &RegistrationDraft, provider_ref: &str) {
        let name = draft.full_name();
        self.enqueue(
            Email::new()
                .to(draft.email.clone())
                .subject("Feast of Esther Registration Confirmation")
                .text(format!(
                    "Dear {name},\n\n\
                     Thank you for registering for the Feast of Esther conference. \
                     Your payment has been received and your registration is confirmed.\n\n\
                     Payment reference: {provider_ref}\n\n\
                     We look forward to seeing you there.\n\n\
                     Feast of Esther Ministries"
                ))
                .html(format!(
                    "<p>Dear {name},</p>\
                     <p>Thank you for registering for the <strong>Feast of Esther</strong> \
                     conference. Your payment has been received and your registration is \
                     confirmed.</p>\
                     <p>Payment reference: <code>{provider_ref}</code></p>\
                     <p>We look forward to seeing you there.</p>\
                     <p>Feast of Esther Ministries</p>"
                )),
        );

        self.enqueue_admin(
            format!("New registration: {name}"),
            format!(
                "A new registration has been confirmed.\n\n\
                 Name: {name}\n\
                 Email: {}\n\
                 Phone: {}\n\
                 Church: {}\n\
                 Payment reference: {provider_ref}",
                draft.email,
                draft.phonenumber.as_deref().unwrap_or("-"),
                draft.nameofchurch.as_deref().unwrap_or("-"),
            ),
        );
    }

    fn registration_pending(&self, draft: &RegistrationDraft) {
        let name = draft.full_name();
        self.enqueue(
            Email::new()
                .to(draft.email.clone())
                .subject("Feast of Esther Registration Received")
                .text(format!(
                    "Dear {name},\n\n\
                     We have received your registration for the Feast of Esther \
                     conference. Your spot will be confirmed once your bank transfer \
                     is received. Transfer details will be sent to you separately.\n\n\
                     Feast of Esther Ministries"
                ))
                .html(format!(
                    "<p>Dear {name},</p>\
                     <p>We have received your registration for the <strong>Feast of \
                     Esther</strong> conference. Your spot will be confirmed once your \
                     bank transfer is received. Transfer details will be sent to you \
                     separately.</p>\
                     <p>Feast of Esther Ministries</p>"
                )),
        );

        self.enqueue_admin(
            format!("New bank-transfer registration: {name}"),
            format!(
                "A registration is awaiting a bank transfer.\n\n\
                 Name: {name}\n\
                 Email: {}\n\
                 Phone: {}",
                draft.email,
                draft.phonenumber.as_deref().unwrap_or("-"),
            ),
        );
    }

    fn donation_received(&self, draft: &DonationDraft, provider_ref: &str) {
        let name = draft.full_name();
        let amount = format!("${}", Money::usd(draft.amount_cents).to_amount_string());
        self.enqueue(
            Email::new()
                .to(draft.email.clone())
                .subject("Thank You for Your Donation")
                .text(format!(
                    "Dear {name},\n\n\
                     Thank you for your generous donation of {amount} to \
                     Feast of Esther Ministries. Your support makes our work possible.\n\n\
                     Payment reference: {provider_ref}\n\n\
                     With gratitude,\n\
                     Feast of Esther Ministries"
                ))
                .html(format!(
                    "<p>Dear {name},</p>\
                     <p>Thank you for your generous donation of <strong>{amount}</strong> \
                     to Feast of Esther Ministries. Your support makes our work possible.</p>\
                     <p>Payment reference: <code>{provider_ref}</code></p>\
                     <p>With gratitude,<br>Feast of Esther Ministries</p>"
                )),
        );

        self.enqueue_admin(
            format!("New donation: {amount} from {name}"),
            format!(
                "A new donation has been received.\n\n\
                 Name: {name}\n\
                 Email: {}\n\
                 Phone: {}\n\
                 Amount: {amount}\n\
                 Payment reference: {provider_ref}",
                draft.email, draft.phone,
            ),
        );
    }
}
