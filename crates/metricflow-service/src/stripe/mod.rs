//! Stripe integration for subscription billing.
//!
//! Stripe handles:
//! - Subscription checkout for the pro and enterprise plans
//! - The customer billing portal
//! - Webhook events that move organizations between plans

pub mod client;
pub mod types;

pub use client::StripeClient;
pub use client::StripeError;
pub use types::*;
