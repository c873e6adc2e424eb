//! # Connection Secret Synchronizer
//!
//! Keeps one connection secret per reachable deployment for a database user
//! and removes the ones that stopped being valid.
//!
//! ## Flow of `synchronize(project, owner)`
//!
//! 1. Merge advanced clusters and serverless instances by name (first wins)
//! 2. Skip deployments outside the owner's cluster scopes; deployments
//!    without connection strings are pending
//! 3. Read the owner's password once, upsert a secret per ready deployment
//! 4. Cleanup: secrets for deployments no longer in scope, then secrets
//!    generated for a previous username
//!
//! Upserts always finish before cleanup starts, so a still-valid secret is
//! never deleted mid-rename. The synchronizer holds no mutable state and
//! performs no retries; a pending or transient outcome is reported as
//! `InProgress` for the scheduler to requeue.

use crate::client::{
    ApiError, AtlasClient, CredentialError, CredentialSource, Project, SecretStore, StoreError,
};
use crate::connsecret::connection::{connection_set, Connection};
use crate::connsecret::naming::{connection_secret_name, normalize_identifier};
use crate::connsecret::secret::{build_connection_secret, project_labels, upsert_secret, UpsertOutcome};
use crate::connsecret::url::UrlError;
use crate::constants::{CLUSTER_LABEL_KEY, CLUSTER_NAME_ANNOTATION_KEY, DEFAULT_RETRY_SECS};
use crate::crd::{AtlasDatabaseUser, ScopeType};
use crate::observability::metrics;
use crate::workflow::{Classify, ConditionReason, ErrorClass, ReconcileResult};
use kube::ResourceExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

/// Log event emitted when connection secrets were created or updated
pub const CONNECTION_SECRETS_ENSURED_EVENT: &str = "ConnectionSecretsEnsured";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list clusters: {0}")]
    ListClusters(#[source] ApiError),

    #[error("failed to list serverless instances: {0}")]
    ListServerless(#[source] ApiError),

    #[error("failed to read password: {0}")]
    Credentials(#[source] CredentialError),

    #[error("invalid connection string for {deployment}: {source}")]
    ConnectionUrl { deployment: String, source: UrlError },

    #[error("failed to ensure connection secret {name}: {source}")]
    Upsert { name: String, source: StoreError },

    #[error("failed to list connection secrets: {0}")]
    List(#[source] StoreError),

    #[error("failed to remove connection secret {name}: {source}")]
    Remove { name: String, source: StoreError },
}

impl SyncError {
    /// Reason code reported for this failure
    #[must_use]
    pub fn reason(&self) -> ConditionReason {
        match self {
            SyncError::ListClusters(e) | SyncError::ListServerless(e) => match e.class() {
                ErrorClass::Auth => ConditionReason::AtlasAuthenticationFailed,
                ErrorClass::NotFound => ConditionReason::ResourceNotFound,
                ErrorClass::Transient | ErrorClass::Internal => {
                    ConditionReason::DatabaseUserConnectionSecretsNotCreated
                }
            },
            SyncError::Credentials(_)
            | SyncError::ConnectionUrl { .. }
            | SyncError::Upsert { .. } => ConditionReason::DatabaseUserConnectionSecretsNotCreated,
            SyncError::List(_) | SyncError::Remove { .. } => {
                ConditionReason::DatabaseUserStaleConnectionSecrets
            }
        }
    }
}

impl Classify for SyncError {
    fn class(&self) -> ErrorClass {
        match self {
            SyncError::ListClusters(e) | SyncError::ListServerless(e) => e.class(),
            // the owner's password is required input, not a backend hiccup
            SyncError::Credentials(_) => ErrorClass::Internal,
            SyncError::ConnectionUrl { .. } => ErrorClass::Internal,
            SyncError::Upsert { source, .. } | SyncError::Remove { source, .. } => source.class(),
            SyncError::List(e) => e.class(),
        }
    }
}

/// What one synchronizer pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Every secret that exists and is current after the pass
    pub ensured: Vec<String>,
    /// Subset of `ensured` that was created or rewritten
    pub changed: Vec<String>,
    /// Deployments in scope still waiting for connection strings
    pub pending: Vec<String>,
    /// Secrets deleted by cleanup
    pub removed: Vec<String>,
}

pub struct ConnectionSecretSynchronizer {
    atlas: Arc<dyn AtlasClient>,
    store: Arc<dyn SecretStore>,
    credentials: Arc<dyn CredentialSource>,
    retry_after: Duration,
    tolerate_serverless_failure: bool,
}

impl std::fmt::Debug for ConnectionSecretSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSecretSynchronizer")
            .field("retry_after", &self.retry_after)
            .field("tolerate_serverless_failure", &self.tolerate_serverless_failure)
            .finish_non_exhaustive()
    }
}

impl ConnectionSecretSynchronizer {
    #[must_use]
    pub fn new(
        atlas: Arc<dyn AtlasClient>,
        store: Arc<dyn SecretStore>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            atlas,
            store,
            credentials,
            retry_after: Duration::from_secs(DEFAULT_RETRY_SECS),
            tolerate_serverless_failure: false,
        }
    }

    /// Delay attached to `InProgress` results
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Treat a failed serverless listing as an empty one (Atlas for
    /// Government offers no serverless instances)
    #[must_use]
    pub fn with_serverless_failure_tolerated(mut self, tolerate: bool) -> Self {
        self.tolerate_serverless_failure = tolerate;
        self
    }

    /// Run one pass and fold it into a [`ReconcileResult`]
    pub async fn synchronize(&self, project: &Project, owner: &AtlasDatabaseUser) -> ReconcileResult {
        let span = info_span!(
            "connsecret.synchronize",
            resource.name = %owner.name_any(),
            resource.namespace = %owner.namespace().unwrap_or_default(),
            project.id = %project.id
        );
        let start = Instant::now();

        let result = async {
            if let Err(e) = owner.validate() {
                return ReconcileResult::terminate(ConditionReason::DatabaseUserInvalidSpec, e.to_string());
            }
            match self.run(project, owner).await {
                Ok(report) if !report.pending.is_empty() => ReconcileResult::in_progress(
                    ConditionReason::ConnectionInventoryNotReady,
                    format!(
                        "Waiting for deployments to get created/updated: {}",
                        report.pending.join(", ")
                    ),
                )
                .with_retry_after(self.retry_after),
                Ok(_) => ReconcileResult::ok(),
                Err(e) => {
                    if e.class() == ErrorClass::NotFound {
                        debug!(error = %e, "Connection secret synchronization hit a missing resource");
                    } else {
                        warn!(error = %e, "❌ Connection secret synchronization failed");
                    }
                    ReconcileResult::from_error(e.reason(), &e).with_retry_after(self.retry_after)
                }
            }
        }
        .instrument(span)
        .await;

        metrics::increment_sync_outcome(result.phase().as_str());
        metrics::observe_sync_duration(start.elapsed().as_secs_f64());
        result
    }

    /// One pass without result mapping
    ///
    /// # Errors
    /// Returns the first failure; upserts done before it stay in place
    pub async fn run(
        &self,
        project: &Project,
        owner: &AtlasDatabaseUser,
    ) -> Result<SyncReport, SyncError> {
        let namespace = owner.namespace().unwrap_or_default();
        let username = owner.spec.username.as_str();
        let scopes = owner.scopes(ScopeType::Cluster);
        let mut report = SyncReport::default();

        let connections = self.connections(&project.id).await?;
        let mut ready: Vec<&Connection> = Vec::new();
        for connection in &connections {
            if !scopes.is_empty() && !scopes.contains(&connection.name.as_str()) {
                continue;
            }
            if connection.is_ready() {
                ready.push(connection);
            } else {
                debug!(
                    deployment = %connection.name,
                    "Deployment is not ready yet, not creating a connection Secret"
                );
                report.pending.push(connection.name.clone());
            }
        }

        if !ready.is_empty() {
            let password = self
                .credentials
                .read_password(owner)
                .await
                .map_err(SyncError::Credentials)?;

            for connection in ready {
                let desired =
                    build_connection_secret(&namespace, project, connection, username, &password)
                        .map_err(|source| SyncError::ConnectionUrl {
                            deployment: connection.name.clone(),
                            source,
                        })?;
                let name = desired.name_any();
                let outcome = upsert_secret(self.store.as_ref(), &namespace, desired)
                    .await
                    .map_err(|source| SyncError::Upsert {
                        name: name.clone(),
                        source,
                    })?;
                metrics::increment_connection_secrets_upserted(outcome.as_str());
                debug!(secret = %name, outcome = outcome.as_str(), "connsecret.upsert");
                if outcome != UpsertOutcome::Unchanged {
                    report.changed.push(name.clone());
                }
                report.ensured.push(name);
            }
        }

        if !report.changed.is_empty() {
            info!(
                event = CONNECTION_SECRETS_ENSURED_EVENT,
                secrets = %report.changed.join(", "),
                "✅ Connection Secrets were created/updated"
            );
        }

        report.removed = self.cleanup(project, owner, &report.ensured).await?;
        Ok(report)
    }

    async fn connections(&self, project_id: &str) -> Result<Vec<Connection>, SyncError> {
        let clusters = self
            .atlas
            .list_clusters(project_id)
            .await
            .map_err(SyncError::ListClusters)?;

        let serverless = match self.atlas.list_serverless_instances(project_id).await {
            Ok(instances) => instances,
            Err(e) if self.tolerate_serverless_failure => {
                debug!(error = %e, "Ignoring serverless listing failure on Atlas for Government");
                Vec::new()
            }
            Err(e) => return Err(SyncError::ListServerless(e)),
        };

        Ok(connection_set([
            clusters
                .iter()
                .map(|c| Connection::from_cluster(c, false))
                .collect(),
            serverless
                .iter()
                .map(|c| Connection::from_cluster(c, true))
                .collect(),
        ]))
    }

    async fn cleanup(
        &self,
        project: &Project,
        owner: &AtlasDatabaseUser,
        ensured: &[String],
    ) -> Result<Vec<String>, SyncError> {
        let mut removed = self.remove_out_of_scope(project, owner, ensured).await?;

        if let Some(previous) = owner.previous_username() {
            if !previous.is_empty() && previous != owner.spec.username {
                removed.extend(self.remove_for_username(project, owner, previous, ensured).await?);
            }
        }

        if !removed.is_empty() {
            metrics::increment_connection_secrets_deleted(removed.len());
        }
        Ok(removed)
    }

    /// Secrets of the current username whose deployment left the scope list
    async fn remove_out_of_scope(
        &self,
        project: &Project,
        owner: &AtlasDatabaseUser,
        ensured: &[String],
    ) -> Result<Vec<String>, SyncError> {
        let scopes: HashSet<String> = owner
            .scopes(ScopeType::Cluster)
            .into_iter()
            .map(normalize_identifier)
            .collect();
        if scopes.is_empty() {
            return Ok(Vec::new());
        }

        let mut stale = Vec::new();
        for (name, deployment) in self.list_for_username(project, owner, &owner.spec.username).await? {
            if !scopes.contains(&normalize_identifier(&deployment)) && !ensured.contains(&name) {
                stale.push(name);
            }
        }
        self.remove_all(&owner.namespace().unwrap_or_default(), stale).await
    }

    /// Every secret generated for `username`, used after a rename
    async fn remove_for_username(
        &self,
        project: &Project,
        owner: &AtlasDatabaseUser,
        username: &str,
        ensured: &[String],
    ) -> Result<Vec<String>, SyncError> {
        let stale: Vec<String> = self
            .list_for_username(project, owner, username)
            .await?
            .into_iter()
            .map(|(name, _)| name)
            // a rename that only changes case maps onto the same names
            .filter(|name| !ensured.contains(name))
            .collect();
        self.remove_all(&owner.namespace().unwrap_or_default(), stale).await
    }

    /// `(secret name, deployment name)` of the project's connection secrets
    /// generated for `username`. The deployment comes from the full-name
    /// annotation; the label is only a fallback since it is cut at 63
    /// characters.
    async fn list_for_username(
        &self,
        project: &Project,
        owner: &AtlasDatabaseUser,
        username: &str,
    ) -> Result<Vec<(String, String)>, SyncError> {
        let namespace = owner.namespace().unwrap_or_default();
        let secrets = self
            .store
            .list(&namespace, &project_labels(&project.id))
            .await
            .map_err(SyncError::List)?;

        Ok(secrets
            .into_iter()
            .filter_map(|secret| {
                let deployment = secret
                    .annotations()
                    .get(CLUSTER_NAME_ANNOTATION_KEY)
                    .or_else(|| secret.labels().get(CLUSTER_LABEL_KEY))?
                    .clone();
                let name = secret.name_any();
                (name == connection_secret_name(&project.name, &deployment, username))
                    .then_some((name, deployment))
            })
            .collect())
    }

    /// Delete every secret in `names`, continuing past failures. The first
    /// failure is returned once all deletions were attempted.
    async fn remove_all(&self, namespace: &str, names: Vec<String>) -> Result<Vec<String>, SyncError> {
        let mut removed = Vec::new();
        let mut first_error = None;
        for name in names {
            match self.store.delete(namespace, &name).await {
                Ok(()) => {
                    debug!(secret = %name, "Removed stale connection Secret");
                    removed.push(name);
                }
                Err(source) => {
                    warn!(secret = %name, error = %source, "Failed to remove connection Secret");
                    if first_error.is_none() {
                        first_error = Some(SyncError::Remove { name, source });
                    }
                }
            }
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "Removed stale connection secrets");
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(removed),
        }
    }

    /// Delete every connection secret of `owner` in `project`, for the
    /// current and the recorded username. Used when the owner goes away.
    pub async fn remove_connection_secrets(
        &self,
        project: &Project,
        owner: &AtlasDatabaseUser,
    ) -> ReconcileResult {
        let mut usernames = vec![owner.spec.username.clone()];
        if let Some(previous) = owner.previous_username() {
            if !previous.is_empty() && previous != owner.spec.username {
                usernames.push(previous.to_string());
            }
        }

        let namespace = owner.namespace().unwrap_or_default();
        for username in &usernames {
            let names = match self.list_for_username(project, owner, username).await {
                Ok(secrets) => secrets.into_iter().map(|(name, _)| name).collect(),
                Err(e) => {
                    return ReconcileResult::from_error(
                        ConditionReason::DatabaseUserConnectionSecretsNotDeleted,
                        &e,
                    )
                    .with_retry_after(self.retry_after)
                }
            };
            match self.remove_all(&namespace, names).await {
                Ok(removed) if !removed.is_empty() => {
                    metrics::increment_connection_secrets_deleted(removed.len());
                }
                Ok(_) => {}
                Err(e) => {
                    return ReconcileResult::from_error(
                        ConditionReason::DatabaseUserConnectionSecretsNotDeleted,
                        &e,
                    )
                    .with_retry_after(self.retry_after)
                }
            }
        }
        ReconcileResult::ok()
    }
}
