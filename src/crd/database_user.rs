//! # AtlasDatabaseUser
//!
//! Primary resource owning connection secrets: one Atlas database user,
//! the password secret it authenticates with, and the deployments it is
//! scoped to.

use crate::watch::ObjectKey;
use crate::workflow::{set_condition, Classify, Condition, ErrorClass, ReconcileResult};
use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Condition type written by the connection-secret synchronizer
pub const READY_CONDITION: &str = "Ready";

#[derive(CustomResource, Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "AtlasDatabaseUser",
    group = "atlas.mongodb.com",
    version = "v1",
    namespaced,
    status = "AtlasDatabaseUserStatus",
    shortname = "adu",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AtlasDatabaseUserSpec {
    /// Reference to the AtlasProject this user belongs to
    pub project_ref: ResourceRef,
    pub username: String,
    /// Authentication database
    #[serde(default = "default_database_name")]
    pub database_name: String,
    #[serde(default)]
    pub password_secret_ref: Option<LocalObjectRef>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    /// Deployments the user is limited to. Empty means every deployment in
    /// the project.
    #[serde(default)]
    pub scopes: Vec<ScopeSpec>,
}

#[must_use]
pub fn default_database_name() -> String {
    "admin".to_string()
}

/// Possibly cross-namespace reference
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ResourceRef {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct LocalObjectRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    pub role_name: String,
    pub database_name: String,
    #[serde(default)]
    pub collection_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScopeType {
    Cluster,
    DataLake,
}

impl ScopeType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeType::Cluster => "CLUSTER",
            ScopeType::DataLake => "DATA_LAKE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct ScopeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub scope_type: ScopeType,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AtlasDatabaseUserStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Username the current connection secrets were generated for
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl AtlasDatabaseUserStatus {
    /// Fold a synchronizer result into the status. The recorded username
    /// only moves once secrets for it exist, so a failed rename keeps
    /// pointing at the secrets that still need cleaning up.
    pub fn record_sync(
        &mut self,
        result: &ReconcileResult,
        username: &str,
        generation: Option<i64>,
        now: DateTime<Utc>,
    ) -> bool {
        let mut changed = set_condition(&mut self.conditions, result.to_condition(READY_CONDITION), now);
        if result.is_ok() && self.user_name.as_deref() != Some(username) {
            self.user_name = Some(username.to_string());
            changed = true;
        }
        if generation.is_some() && self.observed_generation != generation {
            self.observed_generation = generation;
            changed = true;
        }
        changed
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("spec.username must not be empty")]
    EmptyUsername,
    #[error("spec.databaseName must not be empty")]
    EmptyDatabaseName,
    #[error("scope #{0} has an empty name")]
    EmptyScopeName(usize),
    #[error("scope '{0}' is listed more than once")]
    DuplicateScope(String),
}

impl Classify for SpecError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Internal
    }
}

impl AtlasDatabaseUser {
    #[must_use]
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Names of the scopes of the given type, in declaration order
    #[must_use]
    pub fn scopes(&self, scope_type: ScopeType) -> Vec<&str> {
        self.spec
            .scopes
            .iter()
            .filter(|s| s.scope_type == scope_type)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Key of the password secret (always in the user's namespace)
    #[must_use]
    pub fn password_secret_key(&self) -> Option<ObjectKey> {
        self.spec
            .password_secret_ref
            .as_ref()
            .map(|r| ObjectKey::new(self.namespace().unwrap_or_default(), r.name.clone()))
    }

    /// Secrets this user must be re-reconciled for when they change
    #[must_use]
    pub fn dependencies(&self) -> Vec<ObjectKey> {
        self.password_secret_key().into_iter().collect()
    }

    /// Username recorded by the last successful sync
    #[must_use]
    pub fn previous_username(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.user_name.as_deref())
    }

    /// Reject specs no reconcile could ever succeed with
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.spec.username.trim().is_empty() {
            return Err(SpecError::EmptyUsername);
        }
        if self.spec.database_name.trim().is_empty() {
            return Err(SpecError::EmptyDatabaseName);
        }
        let mut seen = std::collections::HashSet::new();
        for (i, scope) in self.spec.scopes.iter().enumerate() {
            if scope.name.trim().is_empty() {
                return Err(SpecError::EmptyScopeName(i));
            }
            if !seen.insert((scope.name.as_str(), scope.scope_type)) {
                return Err(SpecError::DuplicateScope(scope.name.clone()));
            }
        }
        Ok(())
    }
}

fn compare_roles(a: &RoleSpec, b: &RoleSpec) -> Ordering {
    a.role_name
        .cmp(&b.role_name)
        .then_with(|| a.database_name.cmp(&b.database_name))
        .then_with(|| a.collection_name.cmp(&b.collection_name))
}

fn compare_scopes(a: &ScopeSpec, b: &ScopeSpec) -> Ordering {
    a.name
        .cmp(&b.name)
        .then_with(|| a.scope_type.cmp(&b.scope_type))
}

/// Canonical ordering of roles and scopes so that specs differing only in
/// list order compare equal
pub fn normalize_spec(spec: &mut AtlasDatabaseUserSpec) {
    spec.roles.sort_by(compare_roles);
    spec.scopes.sort_by(compare_scopes);
}
