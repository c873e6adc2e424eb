//! Shared fakes for the integration tests
//!
//! In-memory stand-ins for the Atlas Admin API and the Kubernetes Secret
//! store, plus builders for database users.

#![allow(dead_code)]

use async_trait::async_trait;
use atlas_connection_controller::client::{
    ApiError, AtlasClient, ClusterDescription, ConnectionStrings, DatabaseUserRequest,
    SecretStore, StoreError,
};
use atlas_connection_controller::crd::{
    AtlasDatabaseUser, AtlasDatabaseUserSpec, AtlasDatabaseUserStatus, LocalObjectRef,
    ResourceRef, ScopeSpec, ScopeType,
};
use atlas_connection_controller::watch::{ObjectKey, WorkQueue};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

pub const NAMESPACE: &str = "team";
pub const PASSWORD_SECRET: &str = "app-password";
pub const PASSWORD: &str = "s3cr3t!";

/// Builds a fresh error for every call, `ApiError` is not `Clone`
pub type ApiFailure = fn() -> ApiError;
pub type StoreFailure = fn() -> StoreError;

#[derive(Debug, Default)]
pub struct FakeAtlas {
    pub clusters: Mutex<Vec<ClusterDescription>>,
    pub serverless: Mutex<Vec<ClusterDescription>>,
    pub fail_clusters: Mutex<Option<ApiFailure>>,
    pub fail_serverless: Mutex<Option<ApiFailure>>,
    pub fail_create_user: Mutex<Option<ApiFailure>>,
    pub fail_delete_user: Mutex<Option<ApiFailure>>,
    pub created_users: Mutex<Vec<DatabaseUserRequest>>,
    pub deleted_users: Mutex<Vec<String>>,
}

impl FakeAtlas {
    pub fn with_clusters(clusters: Vec<ClusterDescription>) -> Self {
        let atlas = Self::default();
        *atlas.clusters.lock().unwrap() = clusters;
        atlas
    }

    pub fn set_clusters(&self, clusters: Vec<ClusterDescription>) {
        *self.clusters.lock().unwrap() = clusters;
    }

    pub fn set_serverless(&self, instances: Vec<ClusterDescription>) {
        *self.serverless.lock().unwrap() = instances;
    }
}

#[async_trait]
impl AtlasClient for FakeAtlas {
    async fn list_clusters(&self, _project_id: &str) -> Result<Vec<ClusterDescription>, ApiError> {
        if let Some(fail) = *self.fail_clusters.lock().unwrap() {
            return Err(fail());
        }
        Ok(self.clusters.lock().unwrap().clone())
    }

    async fn list_serverless_instances(
        &self,
        _project_id: &str,
    ) -> Result<Vec<ClusterDescription>, ApiError> {
        if let Some(fail) = *self.fail_serverless.lock().unwrap() {
            return Err(fail());
        }
        Ok(self.serverless.lock().unwrap().clone())
    }

    async fn create_database_user(
        &self,
        _project_id: &str,
        user: &DatabaseUserRequest,
    ) -> Result<(), ApiError> {
        if let Some(fail) = *self.fail_create_user.lock().unwrap() {
            return Err(fail());
        }
        self.created_users.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn delete_database_user(
        &self,
        _project_id: &str,
        _database_name: &str,
        username: &str,
    ) -> Result<(), ApiError> {
        if let Some(fail) = *self.fail_delete_user.lock().unwrap() {
            return Err(fail());
        }
        self.deleted_users.lock().unwrap().push(username.to_string());
        Ok(())
    }
}

/// Secret store over a map, with optional injected failures
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    secrets: Mutex<BTreeMap<(String, String), Secret>>,
    pub fail_create: Mutex<Option<StoreFailure>>,
    pub fail_delete: Mutex<HashSet<String>>,
    pub writes: Mutex<usize>,
}

impl MemorySecretStore {
    pub fn insert(&self, secret: Secret) {
        let key = (secret.namespace().unwrap_or_default(), secret.name_any());
        self.secrets.lock().unwrap().insert(key, secret);
    }

    pub fn get_sync(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn names(&self, namespace: &str) -> Vec<String> {
        self.secrets
            .lock()
            .unwrap()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    fn bump_version(secret: &mut Secret) {
        let next = secret
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        secret.metadata.resource_version = Some(next.to_string());
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.get_sync(namespace, name))
    }

    async fn create(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        if let Some(fail) = *self.fail_create.lock().unwrap() {
            return Err(fail());
        }
        let key = (namespace.to_string(), secret.name_any());
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: "Secret",
                namespace: key.0,
                name: key.1,
            });
        }
        let mut stored = secret.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        Self::bump_version(&mut stored);
        secrets.insert(key, stored.clone());
        *self.writes.lock().unwrap() += 1;
        Ok(stored)
    }

    async fn replace(&self, namespace: &str, secret: &Secret) -> Result<Secret, StoreError> {
        let key = (namespace.to_string(), secret.name_any());
        let mut secrets = self.secrets.lock().unwrap();
        let Some(existing) = secrets.get(&key) else {
            return Err(StoreError::NotFound {
                kind: "Secret",
                namespace: key.0,
                name: key.1,
            });
        };
        if secret.metadata.resource_version.is_some()
            && secret.metadata.resource_version != existing.metadata.resource_version
        {
            return Err(StoreError::Conflict {
                kind: "Secret",
                namespace: key.0,
                name: key.1,
                message: "resourceVersion mismatch".to_string(),
            });
        }
        let mut stored = secret.clone();
        stored.metadata.namespace = Some(namespace.to_string());
        Self::bump_version(&mut stored);
        secrets.insert(key, stored.clone());
        *self.writes.lock().unwrap() += 1;
        Ok(stored)
    }

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        if self.fail_delete.lock().unwrap().contains(name) {
            return Err(StoreError::Backend(format!("refusing to delete {name}")));
        }
        self.secrets
            .lock()
            .unwrap()
            .remove(&(namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn list(
        &self,
        namespace: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<Vec<Secret>, StoreError> {
        Ok(self
            .secrets
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .filter(|(_, secret)| {
                let existing = secret.labels();
                labels.iter().all(|(k, v)| existing.get(k) == Some(v))
            })
            .map(|(_, secret)| secret.clone())
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct RecordingQueue(pub Mutex<Vec<ObjectKey>>);

impl RecordingQueue {
    pub fn take(&self) -> Vec<ObjectKey> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}

impl WorkQueue for RecordingQueue {
    fn enqueue(&self, key: ObjectKey) {
        self.0.lock().unwrap().push(key);
    }
}

pub fn ready_cluster(name: &str) -> ClusterDescription {
    let host = name.to_lowercase();
    ClusterDescription::new(name).with_connection_strings(ConnectionStrings {
        standard: Some(format!("mongodb://{host}-00.abc.net:27017,{host}-01.abc.net:27017/?ssl=true")),
        standard_srv: Some(format!("mongodb+srv://{host}.abc.net")),
        ..Default::default()
    })
}

/// Listed by Atlas but without connection strings yet
pub fn pending_cluster(name: &str) -> ClusterDescription {
    ClusterDescription::new(name).with_connection_strings(ConnectionStrings::default())
}

pub fn password_secret(password: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(PASSWORD_SECRET.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "password".to_string(),
            ByteString(password.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

pub fn database_user(name: &str, username: &str) -> AtlasDatabaseUser {
    let mut user = AtlasDatabaseUser::new(
        name,
        AtlasDatabaseUserSpec {
            project_ref: ResourceRef {
                name: "my-project".to_string(),
                namespace: None,
            },
            username: username.to_string(),
            database_name: "admin".to_string(),
            password_secret_ref: Some(LocalObjectRef {
                name: PASSWORD_SECRET.to_string(),
            }),
            roles: Vec::new(),
            scopes: Vec::new(),
        },
    );
    user.metadata.namespace = Some(NAMESPACE.to_string());
    user
}

pub fn with_cluster_scopes(mut user: AtlasDatabaseUser, clusters: &[&str]) -> AtlasDatabaseUser {
    user.spec.scopes = clusters
        .iter()
        .map(|name| ScopeSpec {
            name: (*name).to_string(),
            scope_type: ScopeType::Cluster,
        })
        .collect();
    user
}

pub fn with_previous_username(mut user: AtlasDatabaseUser, username: &str) -> AtlasDatabaseUser {
    user.status = Some(AtlasDatabaseUserStatus {
        user_name: Some(username.to_string()),
        ..Default::default()
    });
    user
}

pub fn data_value(secret: &Secret, key: &str) -> String {
    let value = secret.data.as_ref().unwrap().get(key).unwrap();
    String::from_utf8(value.0.clone()).unwrap()
}
