//! Tracked events.
//!
//! Events are immutable facts recorded by a tracked application. They are
//! appended by ingestion and never updated or deleted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::{EventId, ProjectId};

/// The fixed set of event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// A page was viewed.
    PageView,
    /// A visitor signed up.
    SignUp,
    /// A purchase was made.
    Purchase,
    /// An element was clicked.
    Click,
    /// Application-defined event.
    Custom,
}

impl EventType {
    /// All event types, in wire order.
    pub const ALL: [Self; 5] = [
        Self::PageView,
        Self::SignUp,
        Self::Purchase,
        Self::Click,
        Self::Custom,
    ];

    /// Database and wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PageView => "PAGE_VIEW",
            Self::SignUp => "SIGN_UP",
            Self::Purchase => "PURCHASE",
            Self::Click => "CLICK",
            Self::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                ValidationError::new(
                    "type",
                    "must be one of PAGE_VIEW, SIGN_UP, PURCHASE, CLICK, CUSTOM",
                )
            })
    }
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Server-assigned id.
    pub id: EventId,
    /// Owning project.
    pub project_id: ProjectId,
    /// Event name.
    pub name: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Optional description.
    pub description: Option<String>,
    /// Free-form properties.
    pub properties: Option<Map<String, Value>>,
    /// Revenue attributed to the event.
    pub revenue: Option<f64>,
    /// The tracked application's own user identifier.
    pub external_user_id: Option<String>,
    /// Country dimension.
    pub country: Option<String>,
    /// Device dimension.
    pub device: Option<String>,
    /// Browser dimension.
    pub browser: Option<String>,
    /// Referrer dimension.
    pub referrer: Option<String>,
    /// Server receive time.
    pub timestamp: DateTime<Utc>,
}

/// A validated event payload that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    /// Target project.
    pub project_id: ProjectId,
    /// Event name.
    pub name: String,
    /// Event type.
    pub event_type: EventType,
    /// Optional description.
    pub description: Option<String>,
    /// Free-form properties.
    pub properties: Option<Map<String, Value>>,
    /// Revenue attributed to the event.
    pub revenue: Option<f64>,
    /// The tracked application's own user identifier.
    pub external_user_id: Option<String>,
    /// Country dimension.
    pub country: Option<String>,
    /// Device dimension.
    pub device: Option<String>,
    /// Browser dimension.
    pub browser: Option<String>,
    /// Referrer dimension.
    pub referrer: Option<String>,
}

impl NewEvent {
    /// Validate an untrusted JSON payload.
    ///
    /// Fields are checked in a fixed order and the first failure is reported,
    /// so callers always learn about exactly one offending field. Unknown keys
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first invalid field.
    pub fn from_json(payload: &Value) -> Result<Self, ValidationError> {
        let obj = payload
            .as_object()
            .ok_or_else(|| ValidationError::new("body", "must be a JSON object"))?;

        let name = required_string(obj, "name")?;
        let event_type: EventType = required_string(obj, "type")?.parse()?;
        let project_id = required_string(obj, "projectId")?
            .parse::<ProjectId>()
            .map_err(|_| ValidationError::new("projectId", "must be a valid project id"))?;
        let description = optional_string(obj, "description")?;
        let properties = optional_object(obj, "properties")?;
        let revenue = optional_number(obj, "revenue")?;
        let external_user_id = optional_string(obj, "externalUserId")?;
        let country = optional_string(obj, "country")?;
        let device = optional_string(obj, "device")?;
        let browser = optional_string(obj, "browser")?;
        let referrer = optional_string(obj, "referrer")?;

        Ok(Self {
            project_id,
            name,
            event_type,
            description,
            properties,
            revenue,
            external_user_id,
            country,
            device,
            browser,
            referrer,
        })
    }

    /// Stamp the payload with its server-assigned id and receive time.
    #[must_use]
    pub fn into_event(self, id: EventId, timestamp: DateTime<Utc>) -> Event {
        Event {
            id,
            project_id: self.project_id,
            name: self.name,
            event_type: self.event_type,
            description: self.description,
            properties: self.properties,
            revenue: self.revenue,
            external_user_id: self.external_user_id,
            country: self.country,
            device: self.device,
            browser: self.browser,
            referrer: self.referrer,
            timestamp,
        }
    }
}

/// Filters for listing an organization's events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Restrict to one event type.
    pub event_type: Option<EventType>,
    /// Restrict to one project.
    pub project_id: Option<ProjectId>,
}

impl EventFilter {
    /// Whether `event` passes every set filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.event_type.map_or(true, |t| t == event.event_type)
            && self.project_id.map_or(true, |p| p == event.project_id)
    }
}

fn required_string(obj: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    match obj.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        None | Some(Value::Null) => Err(ValidationError::new(field, "is required")),
        Some(_) => Err(ValidationError::new(field, "must be a string")),
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<String>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::new(field, "must be a string")),
    }
}

fn optional_object(
    obj: &Map<String, Value>,
    field: &str,
) -> Result<Option<Map<String, Value>>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(ValidationError::new(field, "must be an object")),
    }
}

fn optional_number(obj: &Map<String, Value>, field: &str) -> Result<Option<f64>, ValidationError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, "must be a finite number")),
        Some(_) => Err(ValidationError::new(field, "must be a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> Value {
        json!({
            "name": "checkout",
            "type": "PURCHASE",
            "projectId": ProjectId::generate().to_string(),
            "revenue": 49.5,
            "properties": { "plan": "pro", "seats": 3 },
            "externalUserId": "u-17",
            "country": "DE",
            "device": "desktop",
            "browser": "firefox",
            "referrer": "https://news.example"
        })
    }

    #[test]
    fn accepts_full_payload() {
        let event = NewEvent::from_json(&valid_payload()).unwrap();
        assert_eq!(event.event_type, EventType::Purchase);
        assert_eq!(event.revenue, Some(49.5));
        assert_eq!(event.properties.unwrap()["seats"], json!(3));
        assert_eq!(event.external_user_id.as_deref(), Some("u-17"));
    }

    #[test]
    fn rejects_unknown_type() {
        let mut payload = valid_payload();
        payload["type"] = json!("UNKNOWN_TYPE");
        let err = NewEvent::from_json(&payload).unwrap_err();
        assert_eq!(err.field, "type");
    }

    #[test]
    fn reports_first_failing_field_only() {
        let payload = json!({ "type": "NOPE", "revenue": "lots" });
        let err = NewEvent::from_json(&payload).unwrap_err();
        assert_eq!(err.field, "name");
    }

    #[test]
    fn rejects_non_numeric_revenue() {
        let mut payload = valid_payload();
        payload["revenue"] = json!("12.00");
        assert_eq!(NewEvent::from_json(&payload).unwrap_err().field, "revenue");
    }

    #[test]
    fn rejects_non_object_properties() {
        let mut payload = valid_payload();
        payload["properties"] = json!(["a", "b"]);
        assert_eq!(NewEvent::from_json(&payload).unwrap_err().field, "properties");
    }

    #[test]
    fn rejects_malformed_project_reference() {
        let mut payload = valid_payload();
        payload["projectId"] = json!("proj_123");
        assert_eq!(NewEvent::from_json(&payload).unwrap_err().field, "projectId");
    }

    #[test]
    fn rejects_non_object_body() {
        assert_eq!(NewEvent::from_json(&json!([1, 2])).unwrap_err().field, "body");
    }

    #[test]
    fn event_serializes_type_field() {
        let event = NewEvent::from_json(&valid_payload())
            .unwrap()
            .into_event(EventId::generate(), Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "PURCHASE");
        assert_eq!(json["externalUserId"], "u-17");
    }
}
