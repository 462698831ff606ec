//! MetricFlow HTTP API Service.
//!
//! This crate provides the HTTP API for MetricFlow, including:
//!
//! - Event ingestion for tracked applications
//! - The dashboard API (organizations, projects, events, metrics, team, API
//!   keys, activity log, notifications)
//! - CSV and PDF event exports
//! - Stripe subscription checkout and webhook reconciliation
//!
//! # Authentication
//!
//! The service supports two authentication methods:
//!
//! 1. **Organization API keys** (`x-api-key`) - For tracked applications (`/api/v1`)
//! 2. **Session tokens** (`Authorization: Bearer`) - For dashboard users

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Webhook handlers need async for consistency

pub mod auth;
pub mod billing;
pub mod config;
pub mod crypto;
pub mod error;
pub mod export;
pub mod handlers;
pub mod mailer;
pub mod pdf;
pub mod routes;
pub mod state;
pub mod stripe;

pub use billing::{BillingNotification, BillingProvider, CheckoutRequest};
pub use config::ServiceConfig;
pub use error::ApiError;
pub use mailer::{Email, Mailer, MailerError, ResendMailer};
pub use routes::create_router;
pub use state::AppState;
pub use stripe::{StripeClient, StripeError};
