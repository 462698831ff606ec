//! Database schema and migrations.
//!
//! The SQL lives under `migrations/` and is embedded at compile time. Tables:
//!
//! - `organizations`: tenants and their billing state
//! - `users`: registered users
//! - `organization_members`: memberships and pending invites
//! - `api_keys`: hashed ingestion keys
//! - `projects`: projects, owned by organizations
//! - `events`: recorded events, keyed by ULID text
//! - `auth_tokens`: password reset and email verification tokens
//! - `metrics`: numeric samples, owned by projects
//! - `activity_logs`: per-organization audit trail
//! - `notifications`: per-user messages

use sqlx::migrate::Migrator;

/// Embedded migrations for the `PostgreSQL` backend.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
