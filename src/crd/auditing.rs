//! # AtlasAuditing
//!
//! Cluster-scoped resource applying one database auditing configuration to
//! a set of Atlas projects.

use crate::constants::{RECONCILIATION_POLICY_ANNOTATION, RECONCILIATION_POLICY_SKIP};
use crate::workflow::Condition;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type written by the auditing reconciler
pub const AUDITING_READY_CONDITION: &str = "AuditingReady";

#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "AtlasAuditing",
    group = "atlas.mongodb.com",
    version = "v1alpha1",
    status = "AtlasAuditingStatus",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"AuditingReady\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AtlasAuditingSpec {
    /// Standalone applies to the listed projects only. Linked shares the
    /// configuration across an organization.
    #[serde(default, rename = "type")]
    pub auditing_type: Option<AuditingType>,
    #[serde(default, rename = "projectIDs")]
    pub project_ids: Vec<String>,
    #[serde(flatten)]
    pub config: AuditingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AuditingType {
    Standalone,
    Linked,
}

/// Database auditing settings of one project
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditingConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Also audit successful authorization attempts
    #[serde(default)]
    pub audit_authorization_success: bool,
    /// JSON audit filter document
    #[serde(default)]
    pub audit_filter: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetState {
    /// Target project does not exist in Atlas
    Missing,
    /// Reading or writing the target failed
    Error,
    /// Target differed and was updated
    Update,
    /// Target already matched
    Idle,
}

impl TargetState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetState::Missing => "MISSING",
            TargetState::Error => "ERROR",
            TargetState::Update => "UPDATE",
            TargetState::Idle => "IDLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditTargetStatus {
    #[serde(rename = "projectID")]
    pub project_id: String,
    pub state: TargetState,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AtlasAuditingStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub audit_status: Vec<AuditTargetStatus>,
}

impl AtlasAuditing {
    /// Whether reconciliation was switched off via annotation
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.annotations()
            .get(RECONCILIATION_POLICY_ANNOTATION)
            .is_some_and(|policy| policy == RECONCILIATION_POLICY_SKIP)
    }
}
