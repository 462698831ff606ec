//! Numeric samples recorded against a project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;
use crate::{MetricId, ProjectId};

/// Most metrics a listing returns.
pub const METRIC_LIST_LIMIT: usize = 100;

/// A named value measured at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metric {
    /// Metric ID.
    pub id: MetricId,
    /// Project the sample belongs to.
    pub project_id: ProjectId,
    /// Metric name, e.g. `active_users`.
    pub name: String,
    /// Measured value.
    pub value: f64,
    /// When the sample was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    /// Record `value` for `name` now.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for `name` when it is empty, or for
    /// `value` when it is NaN or infinite.
    pub fn new(project_id: ProjectId, name: &str, value: f64) -> Result<Self, ValidationError> {
        validation::min_len("name", name, 1)?;
        if !value.is_finite() {
            return Err(ValidationError::new("value", "must be a finite number"));
        }
        Ok(Self {
            id: MetricId::generate(),
            project_id,
            name: name.to_string(),
            value,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_requires_name_and_finite_value() {
        let project = ProjectId::generate();
        assert!(Metric::new(project, "mrr", 1250.5).is_ok());
        assert_eq!(Metric::new(project, "", 1.0).unwrap_err().field, "name");
        assert_eq!(Metric::new(project, "mrr", f64::NAN).unwrap_err().field, "value");
        assert_eq!(
            Metric::new(project, "mrr", f64::INFINITY).unwrap_err().field,
            "value"
        );
    }
}
