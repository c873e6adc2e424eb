//! # Atlas Client
//!
//! Domain objects returned by the Atlas Admin API and the [`AtlasClient`]
//! trait the synchronizer and binding provisioner are written against.
//!
//! Field names follow the Admin API v2 JSON (camelCase).

use crate::client::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Atlas project reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

impl Project {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One private-endpoint flavour of a cluster's connection strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateEndpoint {
    #[serde(default)]
    pub connection_string: Option<String>,
    #[serde(default)]
    pub srv_connection_string: Option<String>,
    #[serde(default)]
    pub srv_shard_optimized_connection_string: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStrings {
    #[serde(default)]
    pub standard: Option<String>,
    #[serde(default)]
    pub standard_srv: Option<String>,
    #[serde(default)]
    pub private: Option<String>,
    #[serde(default)]
    pub private_srv: Option<String>,
    #[serde(default)]
    pub private_endpoint: Vec<PrivateEndpoint>,
}

/// A deployment as listed by Atlas. Advanced clusters and serverless
/// instances share this shape; serverless instances only fill the SRV and
/// private-endpoint SRV strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDescription {
    pub name: String,
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default)]
    pub connection_strings: Option<ConnectionStrings>,
}

impl ClusterDescription {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_connection_strings(mut self, strings: ConnectionStrings) -> Self {
        self.connection_strings = Some(strings);
        self
    }
}

/// Paginated list envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleRequest {
    pub role_name: String,
    pub database_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub scope_type: String,
}

/// Body of a create-database-user call. The password is wiped on drop.
#[derive(Clone, Serialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseUserRequest {
    pub username: String,
    pub password: String,
    pub database_name: String,
    #[zeroize(skip)]
    pub roles: Vec<RoleRequest>,
    #[zeroize(skip)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<ScopeRequest>,
}

impl std::fmt::Debug for DatabaseUserRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseUserRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database_name", &self.database_name)
            .field("roles", &self.roles)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Database auditing settings as stored by Atlas. The filter travels as a
/// JSON document encoded in a string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub audit_authorization_success: bool,
    #[serde(default)]
    pub audit_filter: String,
}

/// Operations the controller needs from the Atlas Admin API
#[async_trait]
pub trait AtlasClient: Send + Sync {
    /// Advanced (dedicated and shared-tier) clusters of a project
    async fn list_clusters(&self, project_id: &str) -> Result<Vec<ClusterDescription>, ApiError>;

    async fn list_serverless_instances(
        &self,
        project_id: &str,
    ) -> Result<Vec<ClusterDescription>, ApiError>;

    async fn create_database_user(
        &self,
        project_id: &str,
        user: &DatabaseUserRequest,
    ) -> Result<(), ApiError>;

    async fn delete_database_user(
        &self,
        project_id: &str,
        database_name: &str,
        username: &str,
    ) -> Result<(), ApiError>;
}
