//! # Conditions
//!
//! Typed, timestamped status entries written back to primary resources.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a condition (True, False, Unknown)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConditionStatus::True => "True",
            ConditionStatus::False => "False",
            ConditionStatus::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Last time `status` changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn new(r#type: impl Into<String>, status: ConditionStatus) -> Self {
        Self {
            r#type: r#type.into(),
            status,
            last_transition_time: None,
            reason: None,
            message: None,
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.message = (!message.is_empty()).then_some(message);
        self
    }
}

/// Upsert `condition` into `conditions` by type.
///
/// `lastTransitionTime` only advances when the status actually flips; a
/// reconcile that reports the same status keeps the previous timestamp so
/// status writes do not churn.
///
/// Returns true if anything observable changed.
pub fn set_condition(
    conditions: &mut Vec<Condition>,
    mut condition: Condition,
    now: DateTime<Utc>,
) -> bool {
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing
                    .last_transition_time
                    .clone()
                    .or_else(|| Some(now.to_rfc3339()));
            } else {
                condition.last_transition_time = Some(now.to_rfc3339());
            }
            if *existing == condition {
                return false;
            }
            *existing = condition;
            true
        }
        None => {
            condition.last_transition_time = Some(now.to_rfc3339());
            conditions.push(condition);
            true
        }
    }
}

/// Find a condition by type
#[must_use]
pub fn find_condition<'a>(conditions: &'a [Condition], r#type: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.r#type == r#type)
}
