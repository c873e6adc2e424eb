//! # Atlas REST Client
//!
//! [`AtlasClient`] over the Atlas Admin API v2 using reqwest with rustls.
//!
//! Authentication is a bearer token (service-account access token). Status
//! codes map onto [`ApiError`]:
//! - 404 -> `NotFound`
//! - 401 -> `Unauthorized`
//! - 403 -> `Forbidden`
//! - any other non-2xx -> `Backend`

use crate::client::atlas::{AtlasClient, AuditLog, ClusterDescription, DatabaseUserRequest, Paginated};
use crate::client::error::ApiError;
use crate::constants::CONTROLLER_NAME;
use crate::observability::metrics;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, Instrument};
use zeroize::Zeroizing;

/// Versioned media type of the Admin API
const ATLAS_ACCEPT: &str = "application/vnd.atlas.2023-02-01+json";

/// Large enough that no real project needs a second page
const ITEMS_PER_PAGE: &str = "500";

pub struct AtlasRestClient {
    http_client: Client,
    base_url: String,
    access_token: Zeroizing<String>,
}

impl std::fmt::Debug for AtlasRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AtlasRestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AtlasRestClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(
        base_url: &str,
        access_token: Zeroizing<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("{CONTROLLER_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(self.access_token.as_str())
            .header(reqwest::header::ACCEPT, ATLAS_ACCEPT)
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response, ApiError> {
        let start = Instant::now();
        let result = request.send().await;
        metrics::observe_atlas_request(operation, start.elapsed().as_secs_f64());

        let response = result.map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status();
        debug!(operation, status = status.as_u16(), "atlas.request");

        if status.is_success() {
            return Ok(response);
        }

        metrics::increment_atlas_request_errors(operation);
        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, body))
    }

    async fn list<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<Vec<T>, ApiError> {
        let request = self
            .request(Method::GET, path)
            .query(&[("itemsPerPage", ITEMS_PER_PAGE)]);
        let response = self.send(operation, request).await?;
        let page: Paginated<T> = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(page.results)
    }

    /// Current auditing settings of a project
    ///
    /// # Errors
    /// `NotFound` if the project does not exist
    pub async fn get_audit_log(&self, project_id: &str) -> Result<AuditLog, ApiError> {
        let path = format!("/api/atlas/v2/groups/{}/auditLog", segment(project_id));
        let response = self
            .send("get_audit_log", self.request(Method::GET, &path))
            .instrument(info_span!("atlas.get_audit_log", project.id = %project_id))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// # Errors
    /// `NotFound` if the project does not exist
    pub async fn update_audit_log(&self, project_id: &str, audit_log: &AuditLog) -> Result<(), ApiError> {
        let path = format!("/api/atlas/v2/groups/{}/auditLog", segment(project_id));
        let request = self.request(Method::PATCH, &path).json(audit_log);
        self.send("update_audit_log", request)
            .instrument(info_span!("atlas.update_audit_log", project.id = %project_id))
            .await?;
        Ok(())
    }
}

fn map_status(status: StatusCode, body: String) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound(body),
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::FORBIDDEN => ApiError::Forbidden(body),
        _ => ApiError::Backend {
            status: status.as_u16(),
            message: body,
        },
    }
}

fn segment(value: &str) -> String {
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[async_trait]
impl AtlasClient for AtlasRestClient {
    async fn list_clusters(&self, project_id: &str) -> Result<Vec<ClusterDescription>, ApiError> {
        let path = format!("/api/atlas/v2/groups/{}/clusters", segment(project_id));
        self.list("list_clusters", &path)
            .instrument(info_span!("atlas.list_clusters", project.id = %project_id))
            .await
    }

    async fn list_serverless_instances(
        &self,
        project_id: &str,
    ) -> Result<Vec<ClusterDescription>, ApiError> {
        let path = format!("/api/atlas/v2/groups/{}/serverless", segment(project_id));
        self.list("list_serverless_instances", &path)
            .instrument(info_span!("atlas.list_serverless", project.id = %project_id))
            .await
    }

    async fn create_database_user(
        &self,
        project_id: &str,
        user: &DatabaseUserRequest,
    ) -> Result<(), ApiError> {
        let path = format!("/api/atlas/v2/groups/{}/databaseUsers", segment(project_id));
        let request = self.request(Method::POST, &path).json(user);
        self.send("create_database_user", request)
            .instrument(info_span!(
                "atlas.create_database_user",
                project.id = %project_id,
                user.name = %user.username
            ))
            .await?;
        Ok(())
    }

    async fn delete_database_user(
        &self,
        project_id: &str,
        database_name: &str,
        username: &str,
    ) -> Result<(), ApiError> {
        let path = format!(
            "/api/atlas/v2/groups/{}/databaseUsers/{}/{}",
            segment(project_id),
            segment(database_name),
            segment(username)
        );
        self.send("delete_database_user", self.request(Method::DELETE, &path))
            .instrument(info_span!(
                "atlas.delete_database_user",
                project.id = %project_id,
                user.name = %username
            ))
            .await?;
        Ok(())
    }
}
