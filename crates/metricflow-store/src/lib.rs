//! Storage layer for MetricFlow.
//!
//! Every tenant-owned read takes the caller's [`OrganizationId`] and filters
//! on it, so a record belonging to another organization is indistinguishable
//! from one that does not exist.
//!
//! Two backends implement [`Store`]:
//!
//! - [`PgStore`]: `PostgreSQL` via `sqlx`, used in production
//! - [`MemoryStore`]: process-local maps, used by tests and local runs
//!
//! # Example
//!
//! ```no_run
//! use metricflow_core::{Organization, OrganizationMember, UserId};
//! use metricflow_store::{MemoryStore, Store};
//!
//! # async fn demo() -> metricflow_store::Result<()> {
//! let store = MemoryStore::new();
//! let org = Organization::new("Acme", "acme").unwrap();
//! let founder = OrganizationMember::founder(org.id, UserId::generate());
//! store.create_organization(&org, &founder).await?;
//!
//! let count = store.increment_api_request_count(&org.id).await?;
//! assert_eq!(count, 1);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use metricflow_core::{
    ActivityLog, ApiKey, ApiKeyId, AuthToken, Event, EventFilter, EventId, MemberId, Metric,
    Notification, NotificationId, Organization, OrganizationId, OrganizationMember, Project,
    ProjectId, ProjectSummary, SubscriptionSnapshot, TokenKind, User, UserId,
};

/// A membership joined with the user it is bound to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    /// The membership or pending invite.
    pub member: OrganizationMember,
    /// The bound user, absent for pending invites.
    pub user: Option<User>,
}

/// An activity entry joined with the user who acted, if still present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRecord {
    /// The entry.
    pub entry: ActivityLog,
    /// The acting user.
    pub user: Option<User>,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (`PostgreSQL`, in-memory for testing).
#[async_trait]
pub trait Store: Send + Sync {
    // =========================================================================
    // Organization Operations
    // =========================================================================

    /// Create an organization together with its founding membership.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the slug is taken.
    async fn create_organization(
        &self,
        organization: &Organization,
        founder: &OrganizationMember,
    ) -> Result<()>;

    /// Get an organization by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_organization(&self, id: &OrganizationId) -> Result<Option<Organization>>;

    /// Rename an organization and return the updated record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the organization doesn't exist.
    async fn rename_organization(&self, id: &OrganizationId, name: &str) -> Result<Organization>;

    /// Atomically add one to the organization's request counter.
    ///
    /// Returns the counter after the increment. Concurrent callers never lose
    /// an increment.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the organization doesn't exist.
    async fn increment_api_request_count(&self, id: &OrganizationId) -> Result<i64>;

    /// Overwrite an organization's billing state after a completed checkout.
    ///
    /// Returns `false` if no such organization exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn apply_checkout(
        &self,
        id: &OrganizationId,
        snapshot: &SubscriptionSnapshot,
    ) -> Result<bool>;

    /// Refresh the organization that holds `snapshot.subscription_id`.
    ///
    /// Returns the number of organizations updated (zero when the subscription
    /// is unknown).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn update_subscription(&self, snapshot: &SubscriptionSnapshot) -> Result<u64>;

    /// Reset every organization holding `subscription_id` to the free plan.
    ///
    /// Returns the number of organizations reset.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<u64>;

    // =========================================================================
    // Membership Operations
    // =========================================================================

    /// The user's earliest accepted membership.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_membership_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMember>>;

    /// List members and pending invites of an organization, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_members(&self, organization_id: &OrganizationId) -> Result<Vec<MemberRecord>>;

    /// Store a pending invite.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_invite(&self, invite: &OrganizationMember) -> Result<()>;

    /// Find a pending invite by its token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_invite(&self, token: &str) -> Result<Option<OrganizationMember>>;

    /// Bind a pending invite to `user_id`.
    ///
    /// Returns `false` if the invite was already accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn accept_invite(&self, member_id: &MemberId, user_id: &UserId) -> Result<bool>;

    // =========================================================================
    // API Key Operations
    // =========================================================================

    /// Insert an API key record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_api_key(&self, key: &ApiKey) -> Result<()>;

    /// Find a key by the digest of its secret, together with its organization.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_api_key(&self, key_hash: &str) -> Result<Option<(ApiKey, Organization)>>;

    /// Record a successful authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn touch_api_key(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<()>;

    /// List an organization's keys, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_api_keys(&self, organization_id: &OrganizationId) -> Result<Vec<ApiKey>>;

    /// Delete a key. Returns `false` if the organization has no such key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn delete_api_key(&self, organization_id: &OrganizationId, id: &ApiKeyId)
        -> Result<bool>;

    // =========================================================================
    // Project Operations
    // =========================================================================

    /// Insert a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_project(&self, project: &Project) -> Result<()>;

    /// Get a project owned by `organization_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_project(
        &self,
        organization_id: &OrganizationId,
        id: &ProjectId,
    ) -> Result<Option<Project>>;

    /// List an organization's projects with event counts, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_projects(&self, organization_id: &OrganizationId) -> Result<Vec<ProjectSummary>>;

    // =========================================================================
    // Event Operations
    // =========================================================================

    /// Append an event.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_event(&self, event: &Event) -> Result<()>;

    /// Get an event whose project belongs to `organization_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_event(
        &self,
        organization_id: &OrganizationId,
        id: &EventId,
    ) -> Result<Option<Event>>;

    /// List an organization's events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_events(
        &self,
        organization_id: &OrganizationId,
        filter: &EventFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Event>>;

    /// Count an organization's events matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count_events(
        &self,
        organization_id: &OrganizationId,
        filter: &EventFilter,
    ) -> Result<i64>;

    // =========================================================================
    // Metric Operations
    // =========================================================================

    /// Append a metric sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_metric(&self, metric: &Metric) -> Result<()>;

    /// The organization's newest metric samples, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_metrics(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
    ) -> Result<Vec<Metric>>;

    // =========================================================================
    // Activity Operations
    // =========================================================================

    /// Append an activity entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn record_activity(&self, entry: &ActivityLog) -> Result<()>;

    /// List an organization's activity, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_activity(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ActivityRecord>>;

    /// Count an organization's activity entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count_activity(&self, organization_id: &OrganizationId) -> Result<i64>;

    // =========================================================================
    // Notification Operations
    // =========================================================================

    /// Store a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn create_notification(&self, notification: &Notification) -> Result<()>;

    /// A user's newest notifications, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_notifications(&self, user_id: &UserId, limit: usize)
        -> Result<Vec<Notification>>;

    /// Count a user's unread notifications.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn count_unread_notifications(&self, user_id: &UserId) -> Result<i64>;

    /// Mark the listed notifications read. Ids addressed to other users are
    /// skipped. Returns the number of notifications changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_notifications_read(
        &self,
        user_id: &UserId,
        ids: &[NotificationId],
    ) -> Result<u64>;

    // =========================================================================
    // User Operations
    // =========================================================================

    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the email is taken.
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Find a user by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Replace a user's password hash. Returns `false` if no user has `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool>;

    /// Mark a user's email as verified. Returns `false` if no user has `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> Result<bool>;

    // =========================================================================
    // Auth Token Operations
    // =========================================================================

    /// Store a single-use token.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn put_auth_token(&self, token: &AuthToken) -> Result<()>;

    /// Remove and return a token. A token can be taken at most once.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn take_auth_token(&self, kind: TokenKind, token: &str) -> Result<Option<AuthToken>>;
}
