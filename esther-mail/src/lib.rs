//! Email sending for the Feast of Esther backend.
//!
//! A small mail stack: an [`Email`] builder, a [`Transport`] trait with a
//! lettre SMTP implementation, a retrying [`Mailer`], and a detached
//! dispatcher queue so notification sends never block request handling.

pub mod dispatcher;
pub mod email;
pub mod error;
pub mod mailer;
pub mod transport;

pub use dispatcher::{spawn_dispatcher, DispatcherHandle, EmailJob};
pub use email::Email;
pub use error::{MailError, Result};
pub use mailer::{Mailer, MailerConfig};
pub use transport::{MemoryTransport, SmtpConfig, SmtpSecurity, SmtpTransport, Transport};
