//! Payment provider adapters for the Feast of Esther backend
//!
//! Two providers, two shapes:
//!
//! - [`StripeCheckout`]: hosted checkout sessions; the outcome arrives via
//!   a signed webhook and/or a session retrieval when the client returns.
//! - [`PayPalOrders`]: order/capture; the server captures the order after
//!   payer approval.
//!
//! Both adapters check their credentials *before* calling out and refuse to
//! run with placeholder keys, and both expose the provider reference id the
//! reconciliation engine keys on.

pub mod client;
pub mod error;
pub mod money;
pub mod paypal;
pub mod stripe;

pub use error::{PaymentError, PaymentResult};
pub use money::{Currency, Money};
pub use paypal::{OrderRequest, OrderStatus, PayPalOrder, PayPalOrders};
pub use stripe::{
    CheckoutSession, CheckoutSessionRequest, SessionPaymentStatus, StripeCheckout, StripeEvent,
    CHECKOUT_SESSION_COMPLETED,
};
