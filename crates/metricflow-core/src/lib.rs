//! Core types for MetricFlow.
//!
//! This crate provides the domain model shared by the store and the HTTP service:
//!
//! - **Identifiers**: `OrganizationId`, `ProjectId`, `EventId`, `ApiKeyId`, `UserId`,
//!   `MemberId`, `MetricId`, `ActivityId`, `NotificationId`
//! - **Tenancy**: `Organization`, `Plan`, `SubscriptionSnapshot`
//! - **Access**: `OrganizationMember`, `Role`, `Action`
//! - **Ingestion**: `ApiKey`, `Event`, `NewEvent`, `EventType`
//! - **Accounts**: `User`, `AuthToken`, password hashing
//! - **Dashboard records**: `Metric`, `ActivityLog`, `Notification`
//!
//! Every entity other than `User` and `Notification` is reachable only through
//! an organization.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod activity;
pub mod api_key;
pub mod error;
pub mod event;
pub mod ids;
pub mod member;
pub mod metric;
pub mod notification;
pub mod organization;
pub mod project;
pub mod user;
pub mod validation;

pub use activity::{ActivityKind, ActivityLog, ACTIVITY_PAGE_SIZE};
pub use api_key::{hash_secret, ApiKey, API_KEY_PREFIX};
pub use error::{DomainError, Result, ValidationError};
pub use event::{Event, EventFilter, EventType, NewEvent};
pub use ids::{
    ActivityId, ApiKeyId, EventId, IdError, MemberId, MetricId, NotificationId, OrganizationId,
    ProjectId, UserId,
};
pub use member::{Action, OrganizationMember, Role};
pub use metric::{Metric, METRIC_LIST_LIMIT};
pub use notification::{Notification, NOTIFICATION_LIST_LIMIT};
pub use organization::{
    Organization, Plan, SubscriptionSnapshot, ENTERPRISE_PLAN_RATE_LIMIT, FREE_PLAN_RATE_LIMIT,
    PRO_PLAN_RATE_LIMIT,
};
pub use project::{Project, ProjectSummary, DEFAULT_PROJECT_COLOR};
pub use user::{
    hash_password, verify_against_dummy, verify_password, AuthToken, TokenKind, User,
};
