//! # Secret Store
//!
//! Key/value plus label lookup over Kubernetes Secrets. The synchronizer and
//! credential resolver only see the [`SecretStore`] trait; [`KubeSecretStore`]
//! is the in-cluster implementation.

use crate::client::error::StoreError;
use crate::constants::{CONTROLLER_NAME, SECRET_KIND};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{DeleteParams, ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use std::collections::BTreeMap;
use tracing::debug;

#[async_trait]
pub trait SecretStore: Send + Sync {
    /// `Ok(None)` when the secret does not exist
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    async fn create(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError>;

    /// Full replace. `secret.metadata.resource_version` must be set to get
    /// optimistic concurrency.
    async fn replace(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError>;

    /// Deleting a missing secret is not an error
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Secrets in `namespace` carrying every label in `labels`
    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>, StoreError>;
}

#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Render a label map as a Kubernetes label selector (`k1=v1,k2=v2`)
#[must_use]
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn map_kube_error(err: kube::Error, namespace: &str, name: &str) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
            kind: SECRET_KIND,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 409 && api_err.reason == "AlreadyExists" => {
            StoreError::AlreadyExists {
                kind: SECRET_KIND,
                namespace: namespace.to_string(),
                name: name.to_string(),
            }
        }
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::Conflict {
            kind: SECRET_KIND,
            namespace: namespace.to_string(),
            name: name.to_string(),
            message: api_err.message,
        },
        other => StoreError::Backend(other.to_string()),
    }
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.api(namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_kube_error(e, namespace, name))
    }

    async fn create(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        let pp = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        self.api(namespace)
            .create(&pp, secret)
            .await
            .map_err(|e| map_kube_error(e, namespace, &secret.name_any()))
    }

    async fn replace(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        let name = secret.name_any();
        let pp = PostParams {
            field_manager: Some(CONTROLLER_NAME.to_string()),
            ..Default::default()
        };
        self.api(namespace)
            .replace(&name, &pp, secret)
            .await
            .map_err(|e| map_kube_error(e, namespace, &name))
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        match self.api(namespace).delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(
                    resource.namespace = namespace,
                    resource.name = name,
                    "Secret already gone"
                );
                Ok(())
            }
            Err(e) => Err(map_kube_error(e, namespace, name)),
        }
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>, StoreError> {
        let lp = ListParams::default().labels(&label_selector(labels));
        self.api(namespace)
            .list(&lp)
            .await
            .map(|list| list.items)
            .map_err(|e| map_kube_error(e, namespace, ""))
    }
}
