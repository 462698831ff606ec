//! Request and response types for the MetricFlow client.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use metricflow_core::{EventType, ProjectId};

/// An event to record.
///
/// Built with [`TrackEvent::new`] and the chained setters; unset optional
/// fields are left out of the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEvent {
    /// Event name.
    pub name: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Project the event belongs to.
    pub project_id: ProjectId,
    /// Optional description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Revenue attributed to the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    /// Your own identifier for the acting user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_user_id: Option<String>,
    /// Country dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Device dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// Browser dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    /// Referrer dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl TrackEvent {
    /// Create an event with only the required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, event_type: EventType, project_id: ProjectId) -> Self {
        Self {
            name: name.into(),
            event_type,
            project_id,
            description: None,
            properties: None,
            revenue: None,
            external_user_id: None,
            country: None,
            device: None,
            browser: None,
            referrer: None,
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a property.
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Set the revenue.
    #[must_use]
    pub fn revenue(mut self, revenue: f64) -> Self {
        self.revenue = Some(revenue);
        self
    }

    /// Set the external user id.
    #[must_use]
    pub fn external_user_id(mut self, id: impl Into<String>) -> Self {
        self.external_user_id = Some(id.into());
        self
    }

    /// Set the country.
    #[must_use]
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    /// Set the device.
    #[must_use]
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    /// Set the browser.
    #[must_use]
    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    /// Set the referrer.
    #[must_use]
    pub fn referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }
}

/// API error response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorDetail,
}

/// API error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_event_omits_optional_fields() {
        let project_id = ProjectId::generate();
        let event = TrackEvent::new("landing", EventType::PageView, project_id);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            json!({ "name": "landing", "type": "PAGE_VIEW", "projectId": project_id })
        );
    }

    #[test]
    fn builder_sets_wire_names() {
        let event = TrackEvent::new("checkout", EventType::Purchase, ProjectId::generate())
            .revenue(19.99)
            .external_user_id("u-7")
            .property("plan", "pro")
            .property("seats", 3);

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["revenue"], 19.99);
        assert_eq!(json["externalUserId"], "u-7");
        assert_eq!(json["properties"], json!({ "plan": "pro", "seats": 3 }));
    }
}
