//! MetricFlow HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use metricflow_core::{Event, EventId, ProjectSummary};

use crate::error::ClientError;
use crate::types::{ApiErrorResponse, TrackEvent};

/// Header carrying the organization API key.
const API_KEY_HEADER: &str = "x-api-key";

/// MetricFlow ingestion API client.
///
/// Authenticates every request with an organization API key.
#[derive(Debug, Clone)]
pub struct MetricflowClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl MetricflowClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the MetricFlow service (e.g., `"https://metricflow.example.com"`)
    /// * `api_key` - Organization API key (`mk_live_...`)
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new client with custom options.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is empty or the HTTP client cannot be built.
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ClientError::Configuration("API key is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Record an event.
    ///
    /// Each accepted call counts against the organization's request quota.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::RateLimited`] once the quota is used up,
    /// [`ClientError::Validation`] naming the first invalid field, or another
    /// error if the request fails.
    pub async fn track(&self, event: TrackEvent) -> Result<Event, ClientError> {
        let url = format!("{}/api/v1/events", self.base_url);

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&event)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List the organization's projects with their event counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_projects(&self) -> Result<Vec<ProjectSummary>, ClientError> {
        let url = format!("{}/api/v1/projects", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// List recorded events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn list_events(&self, page: usize, limit: usize) -> Result<Vec<Event>, ClientError> {
        let url = format!("{}/api/v1/events", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[("page", page), ("limit", limit)])
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get a single event.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] if the event does not belong to the
    /// key's organization.
    pub async fn get_event(&self, id: &EventId) -> Result<Event, ClientError> {
        let url = format!("{}/api/v1/events/{id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let error = api_error.error;
                tracing::debug!(status = %status, code = %error.code, "MetricFlow API error");

                // Map specific error codes to typed errors
                match error.code.as_str() {
                    "unauthorized" => Err(ClientError::Unauthorized),
                    "rate_limit_exceeded" => Err(ClientError::RateLimited {
                        message: error.message,
                    }),
                    "validation_error" => {
                        let field = error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("field"))
                            .and_then(serde_json::Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        Err(ClientError::Validation {
                            field,
                            message: error.message,
                        })
                    }
                    "not_found" => Err(ClientError::NotFound(error.message)),
                    code => Err(ClientError::Api {
                        code: code.to_string(),
                        message: error.message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 10).
    pub timeout_seconds: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self { timeout_seconds: 10 }
    }
}
