//! `PostgreSQL` storage implementation.
//!
//! This module provides the `PgStore` implementation of the `Store` trait.
//! Rows are read into private `FromRow` structs and converted into domain
//! types, so enum columns are validated on the way out.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use metricflow_core::{
    ActivityId, ActivityKind, ActivityLog, ApiKey, ApiKeyId, AuthToken, Event, EventFilter,
    EventId, EventType, MemberId, Metric, MetricId, Notification, NotificationId, Organization,
    OrganizationId, OrganizationMember, Plan, Project, ProjectId, ProjectSummary, Role,
    SubscriptionSnapshot, TokenKind, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::schema::MIGRATOR;
use crate::{ActivityRecord, MemberRecord, Store};

/// PostgreSQL-backed storage implementation.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to `database_url` and run pending migrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or a migration fails.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .connect(database_url)
            .await?;

        MIGRATOR.run(&pool).await?;
        tracing::info!("Connected to PostgreSQL, migrations applied");

        Ok(Self { pool })
    }

    /// Wrap an existing pool. Migrations are not run.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse<T>(value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| StoreError::Serialization(e.to_string()))
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct OrganizationRow {
    id: Uuid,
    name: String,
    slug: String,
    plan: String,
    stripe_customer_id: Option<String>,
    stripe_subscription_id: Option<String>,
    stripe_price_id: Option<String>,
    stripe_current_period_end: Option<DateTime<Utc>>,
    api_request_count: i64,
    api_rate_limit: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrganizationRow> for Organization {
    type Error = StoreError;

    fn try_from(row: OrganizationRow) -> Result<Self> {
        Ok(Self {
            id: OrganizationId::from_uuid(row.id),
            name: row.name,
            slug: row.slug,
            plan: parse::<Plan>(&row.plan)?,
            stripe_customer_id: row.stripe_customer_id,
            stripe_subscription_id: row.stripe_subscription_id,
            stripe_price_id: row.stripe_price_id,
            stripe_current_period_end: row.stripe_current_period_end,
            api_request_count: row.api_request_count,
            api_rate_limit: row.api_rate_limit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MemberRow {
    id: Uuid,
    organization_id: Uuid,
    user_id: Option<Uuid>,
    role: String,
    invited_email: Option<String>,
    invite_token: Option<String>,
    invite_accepted: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MemberRow> for OrganizationMember {
    type Error = StoreError;

    fn try_from(row: MemberRow) -> Result<Self> {
        Ok(Self {
            id: MemberId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            user_id: row.user_id.map(UserId::from_uuid),
            role: parse::<Role>(&row.role)?,
            invited_email: row.invited_email,
            invite_token: row.invite_token,
            invite_accepted: row.invite_accepted,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MemberWithUserRow {
    #[sqlx(flatten)]
    member: MemberRow,
    u_email: Option<String>,
    u_name: Option<String>,
    u_password_hash: Option<String>,
    u_email_verified_at: Option<DateTime<Utc>>,
    u_created_at: Option<DateTime<Utc>>,
}

impl TryFrom<MemberWithUserRow> for MemberRecord {
    type Error = StoreError;

    fn try_from(row: MemberWithUserRow) -> Result<Self> {
        let user = match (
            row.member.user_id,
            row.u_email,
            row.u_password_hash,
            row.u_created_at,
        ) {
            (Some(id), Some(email), Some(password_hash), Some(created_at)) => Some(User {
                id: UserId::from_uuid(id),
                email,
                name: row.u_name,
                password_hash,
                email_verified_at: row.u_email_verified_at,
                created_at,
            }),
            _ => None,
        };
        Ok(Self {
            member: row.member.try_into()?,
            user,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    key_prefix: String,
    key_hash: String,
    created_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKey {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: ApiKeyId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            name: row.name,
            key_prefix: row.key_prefix,
            key_hash: row.key_hash,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
            expires_at: row.expires_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: Uuid,
    organization_id: Uuid,
    name: String,
    description: Option<String>,
    color: String,
    created_at: DateTime<Utc>,
}

impl From<ProjectRow> for Project {
    fn from(row: ProjectRow) -> Self {
        Self {
            id: ProjectId::from_uuid(row.id),
            organization_id: OrganizationId::from_uuid(row.organization_id),
            name: row.name,
            description: row.description,
            color: row.color,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectSummaryRow {
    #[sqlx(flatten)]
    project: ProjectRow,
    event_count: i64,
}

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    project_id: Uuid,
    name: String,
    #[sqlx(rename = "type")]
    event_type: String,
    description: Option<String>,
    properties: Option<Value>,
    revenue: Option<f64>,
    external_user_id: Option<String>,
    country: Option<String>,
    device: Option<String>,
    browser: Option<String>,
    referrer: Option<String>,
    timestamp: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self> {
        let properties = match row.properties {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map),
            Some(other) => {
                return Err(StoreError::Serialization(format!(
                    "event {} has non-object properties: {other}",
                    row.id
                )))
            }
        };
        Ok(Self {
            id: parse::<EventId>(&row.id)?,
            project_id: ProjectId::from_uuid(row.project_id),
            name: row.name,
            event_type: parse::<EventType>(&row.event_type)?,
            description: row.description,
            properties,
            revenue: row.revenue,
            external_user_id: row.external_user_id,
            country: row.country,
            device: row.device,
            browser: row.browser,
            referrer: row.referrer,
            timestamp: row.timestamp,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    name: Option<String>,
    password_hash: String,
    email_verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            email_verified_at: row.email_verified_at,
            created_at: row.created_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MetricRow {
    id: Uuid,
    project_id: Uuid,
    name: String,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl From<MetricRow> for Metric {
    fn from(row: MetricRow) -> Self {
        Self {
            id: MetricId::from_uuid(row.id),
            project_id: ProjectId::from_uuid(row.project_id),
            name: row.name,
            value: row.value,
            timestamp: row.timestamp,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ActivityWithUserRow {
    id: Uuid,
    organization_id: Uuid,
    user_id: Option<Uuid>,
    action: String,
    entity_id: Option<String>,
    description: String,
    created_at: DateTime<Utc>,
    u_email: Option<String>,
    u_name: Option<String>,
    u_password_hash: Option<String>,
    u_email_verified_at: Option<DateTime<Utc>>,
    u_created_at: Option<DateTime<Utc>>,
}

impl TryFrom<ActivityWithUserRow> for ActivityRecord {
    type Error = StoreError;

    fn try_from(row: ActivityWithUserRow) -> Result<Self> {
        let user = match (row.user_id, row.u_email, row.u_password_hash, row.u_created_at) {
            (Some(id), Some(email), Some(password_hash), Some(created_at)) => Some(User {
                id: UserId::from_uuid(id),
                email,
                name: row.u_name,
                password_hash,
                email_verified_at: row.u_email_verified_at,
                created_at,
            }),
            _ => None,
        };
        Ok(Self {
            entry: ActivityLog {
                id: ActivityId::from_uuid(row.id),
                organization_id: OrganizationId::from_uuid(row.organization_id),
                user_id: row.user_id.map(UserId::from_uuid),
                action: parse::<ActivityKind>(&row.action)?,
                entity_id: row.entity_id,
                description: row.description,
                created_at: row.created_at,
            },
            user,
        })
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    message: String,
    read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            title: row.title,
            message: row.message,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

const ORGANIZATION_COLUMNS: &str = "id, name, slug, plan, stripe_customer_id, \
    stripe_subscription_id, stripe_price_id, stripe_current_period_end, api_request_count, \
    api_rate_limit, created_at, updated_at";

const EVENT_COLUMNS: &str = "e.id, e.project_id, e.name, e.type, e.description, e.properties, \
    e.revenue, e.external_user_id, e.country, e.device, e.browser, e.referrer, e.timestamp";

#[async_trait]
impl Store for PgStore {
    // =========================================================================
    // Organization Operations
    // =========================================================================

    async fn create_organization(
        &self,
        organization: &Organization,
        founder: &OrganizationMember,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO organizations
                (id, name, slug, plan, api_request_count, api_rate_limit, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(organization.id.as_uuid())
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(organization.plan.as_str())
        .bind(organization.api_request_count)
        .bind(organization.api_rate_limit)
        .bind(organization.created_at)
        .bind(organization.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_member(&mut tx, founder).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_organization(&self, id: &OrganizationId) -> Result<Option<Organization>> {
        sqlx::query_as::<_, OrganizationRow>(&format!(
            "SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Organization::try_from)
        .transpose()
    }

    async fn rename_organization(&self, id: &OrganizationId, name: &str) -> Result<Organization> {
        let row = sqlx::query_as::<_, OrganizationRow>(&format!(
            "UPDATE organizations SET name = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {ORGANIZATION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "organization",
            id: id.to_string(),
        })?;
        row.try_into()
    }

    async fn increment_api_request_count(&self, id: &OrganizationId) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r"
            UPDATE organizations
            SET api_request_count = api_request_count + 1
            WHERE id = $1
            RETURNING api_request_count
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            entity: "organization",
            id: id.to_string(),
        })
    }

    async fn apply_checkout(
        &self,
        id: &OrganizationId,
        snapshot: &SubscriptionSnapshot,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE organizations
            SET plan = $2,
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                stripe_subscription_id = $4,
                stripe_price_id = $5,
                stripe_current_period_end = $6,
                api_rate_limit = $7,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .bind(snapshot.plan.as_str())
        .bind(snapshot.customer_id.as_deref())
        .bind(&snapshot.subscription_id)
        .bind(snapshot.price_id.as_deref())
        .bind(snapshot.current_period_end)
        .bind(snapshot.plan.default_rate_limit())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_subscription(&self, snapshot: &SubscriptionSnapshot) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE organizations
            SET plan = $2,
                stripe_customer_id = COALESCE($3, stripe_customer_id),
                stripe_price_id = $4,
                stripe_current_period_end = $5,
                api_rate_limit = $6,
                updated_at = NOW()
            WHERE stripe_subscription_id = $1
            ",
        )
        .bind(&snapshot.subscription_id)
        .bind(snapshot.plan.as_str())
        .bind(snapshot.customer_id.as_deref())
        .bind(snapshot.price_id.as_deref())
        .bind(snapshot.current_period_end)
        .bind(snapshot.plan.default_rate_limit())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE organizations
            SET plan = $2,
                stripe_subscription_id = NULL,
                stripe_price_id = NULL,
                stripe_current_period_end = NULL,
                api_rate_limit = $3,
                updated_at = NOW()
            WHERE stripe_subscription_id = $1
            ",
        )
        .bind(subscription_id)
        .bind(Plan::Free.as_str())
        .bind(Plan::Free.default_rate_limit())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Membership Operations
    // =========================================================================

    async fn find_membership_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMember>> {
        sqlx::query_as::<_, MemberRow>(
            r"
            SELECT id, organization_id, user_id, role, invited_email, invite_token,
                   invite_accepted, created_at
            FROM organization_members
            WHERE user_id = $1 AND invite_accepted
            ORDER BY created_at ASC
            LIMIT 1
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(OrganizationMember::try_from)
        .transpose()
    }

    async fn list_members(&self, organization_id: &OrganizationId) -> Result<Vec<MemberRecord>> {
        sqlx::query_as::<_, MemberWithUserRow>(
            r"
            SELECT m.id, m.organization_id, m.user_id, m.role, m.invited_email, m.invite_token,
                   m.invite_accepted, m.created_at,
                   u.email AS u_email, u.name AS u_name, u.password_hash AS u_password_hash,
                   u.email_verified_at AS u_email_verified_at, u.created_at AS u_created_at
            FROM organization_members m
            LEFT JOIN users u ON u.id = m.user_id
            WHERE m.organization_id = $1
            ORDER BY m.created_at ASC
            ",
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(MemberRecord::try_from)
        .collect()
    }

    async fn create_invite(&self, invite: &OrganizationMember) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_member(&mut conn, invite).await
    }

    async fn find_invite(&self, token: &str) -> Result<Option<OrganizationMember>> {
        sqlx::query_as::<_, MemberRow>(
            r"
            SELECT id, organization_id, user_id, role, invited_email, invite_token,
                   invite_accepted, created_at
            FROM organization_members
            WHERE invite_token = $1
            ",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .map(OrganizationMember::try_from)
        .transpose()
    }

    async fn accept_invite(&self, member_id: &MemberId, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE organization_members
            SET user_id = $2, invite_accepted = TRUE, invite_token = NULL
            WHERE id = $1 AND NOT invite_accepted
            ",
        )
        .bind(member_id.as_uuid())
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // API Key Operations
    // =========================================================================

    async fn create_api_key(&self, key: &ApiKey) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO api_keys
                (id, organization_id, name, key_prefix, key_hash, created_at, last_used_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(key.id.as_uuid())
        .bind(key.organization_id.as_uuid())
        .bind(&key.name)
        .bind(&key.key_prefix)
        .bind(&key.key_hash)
        .bind(key.created_at)
        .bind(key.last_used_at)
        .bind(key.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<(ApiKey, Organization)>> {
        let Some(key) = sqlx::query_as::<_, ApiKeyRow>(
            r"
            SELECT id, organization_id, name, key_prefix, key_hash, created_at, last_used_at,
                   expires_at
            FROM api_keys
            WHERE key_hash = $1
            ",
        )
        .bind(key_hash)
        .fetch_optional(&self.pool)
        .await?
        .map(ApiKey::from) else {
            return Ok(None);
        };

        let organization = self.get_organization(&key.organization_id).await?;
        Ok(organization.map(|org| (key, org)))
    }

    async fn touch_api_key(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_api_keys(&self, organization_id: &OrganizationId) -> Result<Vec<ApiKey>> {
        let rows = sqlx::query_as::<_, ApiKeyRow>(
            r"
            SELECT id, organization_id, name, key_prefix, key_hash, created_at, last_used_at,
                   expires_at
            FROM api_keys
            WHERE organization_id = $1
            ORDER BY created_at DESC
            ",
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ApiKey::from).collect())
    }

    async fn delete_api_key(
        &self,
        organization_id: &OrganizationId,
        id: &ApiKeyId,
    ) -> Result<bool> {
        let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND organization_id = $2")
            .bind(id.as_uuid())
            .bind(organization_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Project Operations
    // =========================================================================

    async fn create_project(&self, project: &Project) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO projects (id, organization_id, name, description, color, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(project.id.as_uuid())
        .bind(project.organization_id.as_uuid())
        .bind(&project.name)
        .bind(project.description.as_deref())
        .bind(&project.color)
        .bind(project.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_project(
        &self,
        organization_id: &OrganizationId,
        id: &ProjectId,
    ) -> Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r"
            SELECT id, organization_id, name, description, color, created_at
            FROM projects
            WHERE id = $1 AND organization_id = $2
            ",
        )
        .bind(id.as_uuid())
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Project::from))
    }

    async fn list_projects(&self, organization_id: &OrganizationId) -> Result<Vec<ProjectSummary>> {
        let rows = sqlx::query_as::<_, ProjectSummaryRow>(
            r"
            SELECT p.id, p.organization_id, p.name, p.description, p.color, p.created_at,
                   (SELECT COUNT(*) FROM events e WHERE e.project_id = p.id) AS event_count
            FROM projects p
            WHERE p.organization_id = $1
            ORDER BY p.created_at DESC
            ",
        )
        .bind(organization_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ProjectSummary {
                project: row.project.into(),
                event_count: row.event_count,
            })
            .collect())
    }

    // =========================================================================
    // Event Operations
    // =========================================================================

    async fn insert_event(&self, event: &Event) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO events
                (id, project_id, name, type, description, properties, revenue,
                 external_user_id, country, device, browser, referrer, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(event.id.to_string())
        .bind(event.project_id.as_uuid())
        .bind(&event.name)
        .bind(event.event_type.as_str())
        .bind(event.description.as_deref())
        .bind(event.properties.clone().map(Value::Object))
        .bind(event.revenue)
        .bind(event.external_user_id.as_deref())
        .bind(event.country.as_deref())
        .bind(event.device.as_deref())
        .bind(event.browser.as_deref())
        .bind(event.referrer.as_deref())
        .bind(event.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_event(
        &self,
        organization_id: &OrganizationId,
        id: &EventId,
    ) -> Result<Option<Event>> {
        sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e \
             JOIN projects p ON p.id = e.project_id \
             WHERE e.id = $1 AND p.organization_id = $2"
        ))
        .bind(id.to_string())
        .bind(organization_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .map(Event::try_from)
        .transpose()
    }

    async fn list_events(
        &self,
        organization_id: &OrganizationId,
        filter: &EventFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Event>> {
        sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e \
             JOIN projects p ON p.id = e.project_id \
             WHERE p.organization_id = $1 \
               AND ($2::text IS NULL OR e.type = $2) \
               AND ($3::uuid IS NULL OR e.project_id = $3) \
             ORDER BY e.timestamp DESC, e.id DESC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(organization_id.as_uuid())
        .bind(filter.event_type.map(EventType::as_str))
        .bind(filter.project_id.map(|p| *p.as_uuid()))
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Event::try_from)
        .collect()
    }

    async fn count_events(
        &self,
        organization_id: &OrganizationId,
        filter: &EventFilter,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r"
            SELECT COUNT(*)
            FROM events e
            JOIN projects p ON p.id = e.project_id
            WHERE p.organization_id = $1
              AND ($2::text IS NULL OR e.type = $2)
              AND ($3::uuid IS NULL OR e.project_id = $3)
            ",
        )
        .bind(organization_id.as_uuid())
        .bind(filter.event_type.map(EventType::as_str))
        .bind(filter.project_id.map(|p| *p.as_uuid()))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Metric Operations
    // =========================================================================

    async fn insert_metric(&self, metric: &Metric) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO metrics (id, project_id, name, value, timestamp)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(metric.id.as_uuid())
        .bind(metric.project_id.as_uuid())
        .bind(&metric.name)
        .bind(metric.value)
        .bind(metric.timestamp)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_metrics(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
    ) -> Result<Vec<Metric>> {
        let rows = sqlx::query_as::<_, MetricRow>(
            r"
            SELECT m.id, m.project_id, m.name, m.value, m.timestamp
            FROM metrics m
            JOIN projects p ON p.id = m.project_id
            WHERE p.organization_id = $1
            ORDER BY m.timestamp DESC
            LIMIT $2
            ",
        )
        .bind(organization_id.as_uuid())
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Metric::from).collect())
    }

    // =========================================================================
    // Activity Operations
    // =========================================================================

    async fn record_activity(&self, entry: &ActivityLog) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO activity_logs
                (id, organization_id, user_id, action, entity_id, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.organization_id.as_uuid())
        .bind(entry.user_id.map(|u| *u.as_uuid()))
        .bind(entry.action.as_str())
        .bind(entry.entity_id.as_deref())
        .bind(&entry.description)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_activity(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ActivityRecord>> {
        sqlx::query_as::<_, ActivityWithUserRow>(
            r"
            SELECT a.id, a.organization_id, a.user_id, a.action, a.entity_id, a.description,
                   a.created_at,
                   u.email AS u_email, u.name AS u_name, u.password_hash AS u_password_hash,
                   u.email_verified_at AS u_email_verified_at, u.created_at AS u_created_at
            FROM activity_logs a
            LEFT JOIN users u ON u.id = a.user_id
            WHERE a.organization_id = $1
            ORDER BY a.created_at DESC
            LIMIT $2 OFFSET $3
            ",
        )
        .bind(organization_id.as_uuid())
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(ActivityRecord::try_from)
        .collect()
    }

    async fn count_activity(&self, organization_id: &OrganizationId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM activity_logs WHERE organization_id = $1",
        )
        .bind(organization_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    async fn create_notification(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO notifications (id, user_id, title, message, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(notification.id.as_uuid())
        .bind(notification.user_id.as_uuid())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r"
            SELECT id, user_id, title, message, read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(user_id.as_uuid())
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn count_unread_notifications(&self, user_id: &UserId) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT read",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn mark_notifications_read(
        &self,
        user_id: &UserId,
        ids: &[NotificationId],
    ) -> Result<u64> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let result = sqlx::query(
            r"
            UPDATE notifications
            SET read = TRUE
            WHERE user_id = $1 AND id = ANY($2) AND NOT read
            ",
        )
        .bind(user_id.as_uuid())
        .bind(&ids)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    async fn create_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, name, password_hash, email_verified_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(user.name.as_deref())
        .bind(&user.password_hash)
        .bind(user.email_verified_at)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, password_hash, email_verified_at, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, name, password_hash, email_verified_at, created_at
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE email = $1")
            .bind(email)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET email_verified_at = $2 WHERE email = $1")
            .bind(email)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Auth Token Operations
    // =========================================================================

    async fn put_auth_token(&self, token: &AuthToken) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO auth_tokens (kind, token, email, expires_at)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(token.kind.as_str())
        .bind(&token.token)
        .bind(&token.email)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn take_auth_token(&self, kind: TokenKind, token: &str) -> Result<Option<AuthToken>> {
        let row = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            r"
            DELETE FROM auth_tokens
            WHERE kind = $1 AND token = $2
            RETURNING email, expires_at
            ",
        )
        .bind(kind.as_str())
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(email, expires_at)| AuthToken {
            kind,
            email,
            token: token.to_string(),
            expires_at,
        }))
    }
}

async fn insert_member(
    conn: &mut sqlx::PgConnection,
    member: &OrganizationMember,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO organization_members
            (id, organization_id, user_id, role, invited_email, invite_token, invite_accepted,
             created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ",
    )
    .bind(member.id.as_uuid())
    .bind(member.organization_id.as_uuid())
    .bind(member.user_id.map(|u| *u.as_uuid()))
    .bind(member.role.as_str())
    .bind(member.invited_email.as_deref())
    .bind(member.invite_token.as_deref())
    .bind(member.invite_accepted)
    .bind(member.created_at)
    .execute(conn)
    .await?;
    Ok(())
}
