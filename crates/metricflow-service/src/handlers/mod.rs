//! API handlers.

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub mod activity;
pub mod api_keys;
pub mod auth;
pub mod billing;
pub mod events;
pub mod exports;
pub mod health;
pub mod ingest;
pub mod metrics;
pub mod notifications;
pub mod organizations;
pub mod projects;
pub mod team;
pub mod webhooks;

/// JSON request body whose rejections use the API error shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct Body<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(body_rejection(&rejection)),
        }
    }
}

fn body_rejection(rejection: &JsonRejection) -> ApiError {
    ApiError::Validation {
        field: "body".into(),
        message: rejection.body_text(),
    }
}

/// Unwrap a required request field.
pub(crate) fn required(field: &str, value: Option<String>) -> Result<String, ApiError> {
    value.ok_or_else(|| ApiError::Validation {
        field: field.into(),
        message: "is required".into(),
    })
}

/// Largest page size any list endpoint returns.
pub const MAX_PAGE_SIZE: usize = 100;

/// Page size when none is requested.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<usize>,
    /// Page size, capped at [`MAX_PAGE_SIZE`].
    pub limit: Option<usize>,
}

impl PageQuery {
    /// Effective page number (at least 1).
    #[must_use]
    pub fn page(&self) -> usize {
        self.page.unwrap_or(1).max(1)
    }

    /// Effective page size.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Rows to skip.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.limit())
    }
}

/// Pagination metadata returned alongside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Current page.
    pub page: usize,
    /// Page size.
    pub limit: usize,
    /// Total matching rows.
    pub total: i64,
    /// Number of pages.
    pub total_pages: i64,
}

impl Pagination {
    /// Build pagination metadata for `query` over `total` rows.
    #[must_use]
    pub fn new(query: &PageQuery, total: i64) -> Self {
        let limit = i64::try_from(query.limit()).unwrap_or(i64::MAX);
        Self {
            page: query.page(),
            limit: query.limit(),
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

/// A page of results.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    /// The rows.
    pub data: Vec<T>,
    /// Where this page sits.
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_caps() {
        let q = PageQuery::default();
        assert_eq!((q.page(), q.limit(), q.offset()), (1, 50, 0));

        let q = PageQuery { page: Some(3), limit: Some(500) };
        assert_eq!((q.page(), q.limit(), q.offset()), (3, 100, 200));

        let q = PageQuery { page: Some(0), limit: Some(0) };
        assert_eq!((q.page(), q.limit()), (1, 1));
    }

    #[test]
    fn total_pages_rounds_up() {
        let q = PageQuery { page: None, limit: Some(10) };
        assert_eq!(Pagination::new(&q, 0).total_pages, 0);
        assert_eq!(Pagination::new(&q, 10).total_pages, 1);
        assert_eq!(Pagination::new(&q, 11).total_pages, 2);
    }
}
