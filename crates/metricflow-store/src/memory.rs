//! In-memory storage implementation.
//!
//! All state sits behind one mutex, so every trait method is atomic with
//! respect to the others. The lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use metricflow_core::{
    ActivityLog, ApiKey, ApiKeyId, AuthToken, Event, EventFilter, EventId, MemberId, Metric,
    Notification, NotificationId, Organization, OrganizationId, OrganizationMember, Project,
    ProjectId, ProjectSummary, SubscriptionSnapshot, TokenKind, User, UserId,
};

use crate::error::{Result, StoreError};
use crate::{ActivityRecord, MemberRecord, Store};

#[derive(Default)]
struct Inner {
    organizations: HashMap<OrganizationId, Organization>,
    members: Vec<OrganizationMember>,
    api_keys: HashMap<ApiKeyId, ApiKey>,
    projects: HashMap<ProjectId, Project>,
    events: Vec<Event>,
    metrics: Vec<Metric>,
    activity: Vec<ActivityLog>,
    notifications: Vec<Notification>,
    users: HashMap<UserId, User>,
    tokens: HashMap<(TokenKind, String), AuthToken>,
}

impl Inner {
    fn owns_project(&self, organization_id: &OrganizationId, project_id: &ProjectId) -> bool {
        self.projects
            .get(project_id)
            .is_some_and(|p| p.organization_id == *organization_id)
    }

    fn org_events<'a>(
        &'a self,
        organization_id: &'a OrganizationId,
        filter: &'a EventFilter,
    ) -> impl Iterator<Item = &'a Event> + 'a {
        self.events
            .iter()
            .filter(move |e| self.owns_project(organization_id, &e.project_id) && filter.matches(e))
    }

    fn user_by_email_mut(&mut self, email: &str) -> Option<&mut User> {
        self.users.values_mut().find(|u| u.email == email)
    }
}

/// Process-local storage backend.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    // =========================================================================
    // Organization Operations
    // =========================================================================

    async fn create_organization(
        &self,
        organization: &Organization,
        founder: &OrganizationMember,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        if inner
            .organizations
            .values()
            .any(|o| o.slug == organization.slug)
        {
            return Err(StoreError::Conflict("organizations_slug_key".to_string()));
        }
        inner
            .organizations
            .insert(organization.id, organization.clone());
        inner.members.push(founder.clone());
        Ok(())
    }

    async fn get_organization(&self, id: &OrganizationId) -> Result<Option<Organization>> {
        Ok(self.lock()?.organizations.get(id).cloned())
    }

    async fn rename_organization(&self, id: &OrganizationId, name: &str) -> Result<Organization> {
        let mut inner = self.lock()?;
        let org = inner
            .organizations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "organization",
                id: id.to_string(),
            })?;
        org.name = name.to_string();
        org.updated_at = Utc::now();
        Ok(org.clone())
    }

    async fn increment_api_request_count(&self, id: &OrganizationId) -> Result<i64> {
        let mut inner = self.lock()?;
        let org = inner
            .organizations
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "organization",
                id: id.to_string(),
            })?;
        org.api_request_count += 1;
        Ok(org.api_request_count)
    }

    async fn apply_checkout(
        &self,
        id: &OrganizationId,
        snapshot: &SubscriptionSnapshot,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(org) = inner.organizations.get_mut(id) else {
            return Ok(false);
        };
        org.apply_subscription(snapshot);
        org.updated_at = Utc::now();
        Ok(true)
    }

    async fn update_subscription(&self, snapshot: &SubscriptionSnapshot) -> Result<u64> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let mut updated = 0;
        for org in inner.organizations.values_mut().filter(|o| {
            o.stripe_subscription_id.as_deref() == Some(snapshot.subscription_id.as_str())
        }) {
            org.apply_subscription(snapshot);
            org.updated_at = now;
            updated += 1;
        }
        Ok(updated)
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<u64> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let mut reset = 0;
        for org in inner
            .organizations
            .values_mut()
            .filter(|o| o.stripe_subscription_id.as_deref() == Some(subscription_id))
        {
            org.clear_subscription();
            org.updated_at = now;
            reset += 1;
        }
        Ok(reset)
    }

    // =========================================================================
    // Membership Operations
    // =========================================================================

    async fn find_membership_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Option<OrganizationMember>> {
        let inner = self.lock()?;
        Ok(inner
            .members
            .iter()
            .filter(|m| m.invite_accepted && m.user_id.as_ref() == Some(user_id))
            .min_by_key(|m| m.created_at)
            .cloned())
    }

    async fn list_members(&self, organization_id: &OrganizationId) -> Result<Vec<MemberRecord>> {
        let inner = self.lock()?;
        let mut records: Vec<MemberRecord> = inner
            .members
            .iter()
            .filter(|m| m.organization_id == *organization_id)
            .map(|m| MemberRecord {
                member: m.clone(),
                user: m.user_id.and_then(|id| inner.users.get(&id).cloned()),
            })
            .collect();
        records.sort_by_key(|r| r.member.created_at);
        Ok(records)
    }

    async fn create_invite(&self, invite: &OrganizationMember) -> Result<()> {
        self.lock()?.members.push(invite.clone());
        Ok(())
    }

    async fn find_invite(&self, token: &str) -> Result<Option<OrganizationMember>> {
        let inner = self.lock()?;
        Ok(inner
            .members
            .iter()
            .find(|m| m.invite_token.as_deref() == Some(token))
            .cloned())
    }

    async fn accept_invite(&self, member_id: &MemberId, user_id: &UserId) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.members.iter_mut().find(|m| m.id == *member_id) {
            Some(member) if member.is_pending() => {
                member.accept(*user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // =========================================================================
    // API Key Operations
    // =========================================================================

    async fn create_api_key(&self, key: &ApiKey) -> Result<()> {
        self.lock()?.api_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn find_api_key(&self, key_hash: &str) -> Result<Option<(ApiKey, Organization)>> {
        let inner = self.lock()?;
        Ok(inner
            .api_keys
            .values()
            .find(|k| k.key_hash == key_hash)
            .and_then(|k| {
                inner
                    .organizations
                    .get(&k.organization_id)
                    .map(|org| (k.clone(), org.clone()))
            }))
    }

    async fn touch_api_key(&self, id: &ApiKeyId, at: DateTime<Utc>) -> Result<()> {
        if let Some(key) = self.lock()?.api_keys.get_mut(id) {
            key.last_used_at = Some(at);
        }
        Ok(())
    }

    async fn list_api_keys(&self, organization_id: &OrganizationId) -> Result<Vec<ApiKey>> {
        let inner = self.lock()?;
        let mut keys: Vec<ApiKey> = inner
            .api_keys
            .values()
            .filter(|k| k.organization_id == *organization_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(keys)
    }

    async fn delete_api_key(
        &self,
        organization_id: &OrganizationId,
        id: &ApiKeyId,
    ) -> Result<bool> {
        let mut inner = self.lock()?;
        let owned = inner
            .api_keys
            .get(id)
            .is_some_and(|k| k.organization_id == *organization_id);
        if owned {
            inner.api_keys.remove(id);
        }
        Ok(owned)
    }

    // =========================================================================
    // Project Operations
    // =========================================================================

    async fn create_project(&self, project: &Project) -> Result<()> {
        self.lock()?.projects.insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(
        &self,
        organization_id: &OrganizationId,
        id: &ProjectId,
    ) -> Result<Option<Project>> {
        let inner = self.lock()?;
        Ok(inner
            .projects
            .get(id)
            .filter(|p| p.organization_id == *organization_id)
            .cloned())
    }

    async fn list_projects(&self, organization_id: &OrganizationId) -> Result<Vec<ProjectSummary>> {
        let inner = self.lock()?;
        let mut summaries: Vec<ProjectSummary> = inner
            .projects
            .values()
            .filter(|p| p.organization_id == *organization_id)
            .map(|p| ProjectSummary {
                project: p.clone(),
                event_count: inner
                    .events
                    .iter()
                    .filter(|e| e.project_id == p.id)
                    .count()
                    .try_into()
                    .unwrap_or(i64::MAX),
            })
            .collect();
        summaries.sort_by(|a, b| b.project.created_at.cmp(&a.project.created_at));
        Ok(summaries)
    }

    // =========================================================================
    // Event Operations
    // =========================================================================

    async fn insert_event(&self, event: &Event) -> Result<()> {
        self.lock()?.events.push(event.clone());
        Ok(())
    }

    async fn get_event(
        &self,
        organization_id: &OrganizationId,
        id: &EventId,
    ) -> Result<Option<Event>> {
        let inner = self.lock()?;
        Ok(inner
            .events
            .iter()
            .find(|e| e.id == *id && inner.owns_project(organization_id, &e.project_id))
            .cloned())
    }

    async fn list_events(
        &self,
        organization_id: &OrganizationId,
        filter: &EventFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Event>> {
        let inner = self.lock()?;
        let mut events: Vec<Event> = inner.org_events(organization_id, filter).cloned().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(events.into_iter().skip(offset).take(limit).collect())
    }

    async fn count_events(
        &self,
        organization_id: &OrganizationId,
        filter: &EventFilter,
    ) -> Result<i64> {
        let inner = self.lock()?;
        let count = inner.org_events(organization_id, filter).count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    // =========================================================================
    // Metric Operations
    // =========================================================================

    async fn insert_metric(&self, metric: &Metric) -> Result<()> {
        self.lock()?.metrics.push(metric.clone());
        Ok(())
    }

    async fn list_metrics(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
    ) -> Result<Vec<Metric>> {
        let inner = self.lock()?;
        let mut metrics: Vec<Metric> = inner
            .metrics
            .iter()
            .filter(|m| inner.owns_project(organization_id, &m.project_id))
            .cloned()
            .collect();
        metrics.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        metrics.truncate(limit);
        Ok(metrics)
    }

    // =========================================================================
    // Activity Operations
    // =========================================================================

    async fn record_activity(&self, entry: &ActivityLog) -> Result<()> {
        self.lock()?.activity.push(entry.clone());
        Ok(())
    }

    async fn list_activity(
        &self,
        organization_id: &OrganizationId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ActivityRecord>> {
        let inner = self.lock()?;
        let mut entries: Vec<&ActivityLog> = inner
            .activity
            .iter()
            .filter(|a| a.organization_id == *organization_id)
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|entry| ActivityRecord {
                entry: entry.clone(),
                user: entry.user_id.and_then(|id| inner.users.get(&id).cloned()),
            })
            .collect())
    }

    async fn count_activity(&self, organization_id: &OrganizationId) -> Result<i64> {
        let inner = self.lock()?;
        let count = inner
            .activity
            .iter()
            .filter(|a| a.organization_id == *organization_id)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    // =========================================================================
    // Notification Operations
    // =========================================================================

    async fn create_notification(&self, notification: &Notification) -> Result<()> {
        self.lock()?.notifications.push(notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        user_id: &UserId,
        limit: usize,
    ) -> Result<Vec<Notification>> {
        let inner = self.lock()?;
        let mut notifications: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == *user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notifications.truncate(limit);
        Ok(notifications)
    }

    async fn count_unread_notifications(&self, user_id: &UserId) -> Result<i64> {
        let inner = self.lock()?;
        let count = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == *user_id && !n.read)
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn mark_notifications_read(
        &self,
        user_id: &UserId,
        ids: &[NotificationId],
    ) -> Result<u64> {
        let mut inner = self.lock()?;
        let mut changed = 0;
        for notification in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == *user_id && !n.read && ids.contains(&n.id))
        {
            notification.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    // =========================================================================
    // User Operations
    // =========================================================================

    async fn create_user(&self, user: &User) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict("users_email_key".to_string()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.lock()?.users.get(id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let inner = self.lock()?;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_password(&self, email: &str, password_hash: &str) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(user) = inner.user_by_email_mut(email) else {
            return Ok(false);
        };
        user.password_hash = password_hash.to_string();
        Ok(true)
    }

    async fn mark_email_verified(&self, email: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.lock()?;
        let Some(user) = inner.user_by_email_mut(email) else {
            return Ok(false);
        };
        user.email_verified_at = Some(at);
        Ok(true)
    }

    // =========================================================================
    // Auth Token Operations
    // =========================================================================

    async fn put_auth_token(&self, token: &AuthToken) -> Result<()> {
        self.lock()?
            .tokens
            .insert((token.kind, token.token.clone()), token.clone());
        Ok(())
    }

    async fn take_auth_token(&self, kind: TokenKind, token: &str) -> Result<Option<AuthToken>> {
        Ok(self.lock()?.tokens.remove(&(kind, token.to_string())))
    }
}
