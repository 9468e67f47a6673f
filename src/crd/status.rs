//! # Managed Status
//!
//! Status types shared by every managed kind: the provider observation
//! snapshot plus the `Ready` and `Synced` conditions.

use serde::{Deserialize, Serialize};

pub const CONDITION_READY: &str = "Ready";
pub const CONDITION_SYNCED: &str = "Synced";

pub const REASON_AVAILABLE: &str = "Available";
pub const REASON_CREATING: &str = "Creating";
pub const REASON_DELETING: &str = "Deleting";
pub const REASON_UNAVAILABLE: &str = "Unavailable";
pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";

/// Status of a managed record
///
/// `at_provider` is the last observation of the Harbor object; its shape is
/// kind specific.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(bound = "O: schemars::JsonSchema + Default")]
pub struct ManagedStatus<O> {
    #[serde(default)]
    pub at_provider: O,
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl<O> ManagedStatus<O> {
    pub fn condition(&self, r#type: &str) -> Option<&Condition> {
        find_condition(&self.conditions, r#type)
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
    /// Generation of the record this condition was computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl Condition {
    fn new(r#type: &str, status: bool, reason: &str, message: Option<String>) -> Self {
        Self {
            r#type: r#type.to_string(),
            status: if status { "True" } else { "False" }.to_string(),
            last_transition_time: None,
            reason: Some(reason.to_string()),
            message,
            observed_generation: None,
        }
    }

    #[must_use]
    pub fn with_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn available() -> Self {
        Self::new(CONDITION_READY, true, REASON_AVAILABLE, None)
    }

    pub fn creating() -> Self {
        Self::new(CONDITION_READY, false, REASON_CREATING, None)
    }

    pub fn deleting() -> Self {
        Self::new(CONDITION_READY, false, REASON_DELETING, None)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CONDITION_READY, false, REASON_UNAVAILABLE, Some(message.into()))
    }

    pub fn reconcile_success() -> Self {
        Self::new(CONDITION_SYNCED, true, REASON_RECONCILE_SUCCESS, None)
    }

    pub fn reconcile_error(reason: &str, message: impl Into<String>) -> Self {
        Self::new(CONDITION_SYNCED, false, reason, Some(message.into()))
    }
}

pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}

/// Insert or replace a condition of the same type
///
/// The transition time only moves when the status flips; a changed reason or
/// message under the same status keeps the previous timestamp.
pub fn set_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            condition.last_transition_time = if existing.status == condition.status {
                existing.last_transition_time.clone()
            } else {
                Some(chrono::Utc::now().to_rfc3339())
            };
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
            conditions.push(condition);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::RobotAccountObservation;

    #[test]
    fn test_status_schema_defaults_observation() {
        let schema =
            serde_json::to_value(schemars::schema_for!(ManagedStatus<RobotAccountObservation>))
                .unwrap();
        let properties = &schema["properties"];
        assert!(properties.get("atProvider").is_some(), "{schema}");
        assert!(properties.get("conditions").is_some(), "{schema}");
        assert_eq!(properties["atProvider"]["default"], serde_json::json!({}));
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_status_unchanged() {
        let mut conditions = Vec::new();
        set_condition(&mut conditions, Condition::reconcile_error("ReconcileError", "boom"));
        let first = conditions[0].last_transition_time.clone();
        assert!(first.is_some());

        set_condition(
            &mut conditions,
            Condition::reconcile_error("ReconcileError", "different message"),
        );
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].last_transition_time, first);
        assert_eq!(conditions[0].message.as_deref(), Some("different message"));
    }

    #[test]
    fn test_set_condition_moves_transition_time_on_flip() {
        let mut conditions = vec![Condition {
            last_transition_time: Some("2020-01-01T00:00:00+00:00".to_string()),
            ..Condition::creating()
        }];
        set_condition(&mut conditions, Condition::available());
        assert!(conditions[0].is_true());
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2020-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_find_condition_by_type() {
        let status: ManagedStatus<()> = ManagedStatus {
            at_provider: (),
            conditions: vec![Condition::available(), Condition::reconcile_success()],
        };
        assert_eq!(
            status.condition(CONDITION_SYNCED).and_then(Condition::reason),
            Some(REASON_RECONCILE_SUCCESS)
        );
        assert!(status.condition("Healthy").is_none());
    }
}
