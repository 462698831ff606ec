//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{delete, get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    activity, api_keys, auth, billing, events, exports, health, ingest, metrics, notifications,
    organizations, projects, team, webhooks,
};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for the machine ingestion API.
const INGEST_MAX_CONCURRENT_REQUESTS: usize = 200;

/// Maximum concurrent requests for dashboard endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts
/// - `POST /api/auth/register` - Create an account
/// - `POST /api/auth/login` - Exchange credentials for a session token
/// - `POST /api/auth/forgot-password` - Email a password reset link
/// - `POST /api/auth/reset-password` - Set a new password with a reset token
/// - `POST /api/auth/verify` - Confirm an email address
///
/// ## Dashboard (session token)
/// - `GET|POST /api/organizations` - Caller's organization / create one
/// - `GET|PUT /api/settings` - Organization settings
/// - `GET|POST /api/projects` - Projects
/// - `GET|POST /api/events` - Events
/// - `GET /api/events/export/csv` - CSV export
/// - `GET /api/events/export/pdf` - PDF report
/// - `GET|POST /api/metrics` - Newest metric samples / record one
/// - `GET /api/activity` - Activity log
/// - `GET|PUT /api/notifications` - Caller's notifications / mark read
/// - `GET|POST /api/api-keys`, `DELETE /api/api-keys/:id` - API keys
/// - `GET|POST /api/team`, `POST /api/team/accept-invite` - Team
/// - `POST /api/billing/checkout`, `POST /api/billing/portal` - Billing
///
/// ## Ingestion (API key, rate-limited)
/// - `POST /api/v1/events` - Record an event
/// - `GET /api/v1/events` - List events
/// - `GET /api/v1/events/:id` - Get an event
/// - `GET /api/v1/projects` - List projects
///
/// ## Webhooks (Signature verification)
/// - `POST /api/billing/webhook` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Ingestion handles high-volume traffic from tracked applications, so it
    // has a higher concurrency limit but is still protected from overload.
    let ingest_routes = Router::new()
        .route(
            "/api/v1/events",
            post(ingest::ingest_event).get(ingest::list_events),
        )
        .route("/api/v1/events/:id", get(ingest::get_event))
        .route("/api/v1/projects", get(ingest::list_projects))
        .layer(ConcurrencyLimitLayer::new(INGEST_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        // Accounts
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/auth/verify", post(auth::verify_email))
        // Organizations
        .route(
            "/api/organizations",
            get(organizations::get_organization).post(organizations::create_organization),
        )
        .route(
            "/api/settings",
            get(organizations::get_settings).put(organizations::update_settings),
        )
        // Projects and events
        .route(
            "/api/projects",
            get(projects::list_projects).post(projects::create_project),
        )
        .route(
            "/api/events",
            get(events::list_events).post(events::create_event),
        )
        .route("/api/events/export/csv", get(exports::export_csv))
        .route("/api/events/export/pdf", get(exports::export_pdf))
        .route(
            "/api/metrics",
            get(metrics::list_metrics).post(metrics::record_metric),
        )
        .route("/api/activity", get(activity::list_activity))
        .route(
            "/api/notifications",
            get(notifications::list_notifications).put(notifications::mark_read),
        )
        // API keys
        .route(
            "/api/api-keys",
            get(api_keys::list_api_keys).post(api_keys::create_api_key),
        )
        .route("/api/api-keys/:id", delete(api_keys::delete_api_key))
        // Team
        .route(
            "/api/team",
            get(team::list_members).post(team::invite_member),
        )
        .route("/api/team/accept-invite", post(team::accept_invite))
        // Billing
        .route("/api/billing/checkout", post(billing::create_checkout))
        .route("/api/billing/portal", post(billing::create_portal))
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .merge(ingest_routes)
        .merge(api_routes)
        // Webhooks (no rate limit - controlled by the payment processor)
        .route("/api/billing/webhook", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
