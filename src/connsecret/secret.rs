//! # Connection Secret Payload
//!
//! Builds the `Secret` delivered for one (project, cluster, user) triple and
//! writes it through a [`SecretStore`] with get-or-create-else-replace
//! semantics.
//!
//! Connection secrets carry no owner references: a secret belongs to the
//! combination of a user and a deployment, not to a single parent, and is
//! garbage-collected by the synchronizer's cleanup pass instead.

use crate::client::{Project, SecretStore, StoreError};
use crate::connsecret::connection::Connection;
use crate::connsecret::naming::{connection_secret_name, normalize_label_value};
use crate::connsecret::url::{embed_credentials, UrlError};
use crate::constants::{
    CLUSTER_LABEL_KEY, CLUSTER_NAME_ANNOTATION_KEY, PASSWORD_KEY, PRIVATE_KEY, PRIVATE_SHARD_KEY,
    PRIVATE_SRV_KEY, PROJECT_LABEL_KEY, STANDARD_KEY, STANDARD_SRV_KEY, USERNAME_KEY,
};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use std::collections::BTreeMap;

const SECRET_TYPE: &str = "Opaque";

/// Labels identifying the connection secrets of a project
#[must_use]
pub fn project_labels(project_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(PROJECT_LABEL_KEY.to_string(), project_id.to_string())])
}

fn bytes(value: impl Into<String>) -> ByteString {
    ByteString(value.into().into_bytes())
}

/// Key of the n-th private variant: the first one has no index suffix
fn indexed(key: &str, index: usize) -> String {
    if index == 0 {
        key.to_string()
    } else {
        format!("{key}{index}")
    }
}

/// Desired connection secret for `connection`, credentials embedded into
/// every non-empty URL
///
/// # Errors
/// Returns an error if a connection URL cannot take credentials
pub fn build_connection_secret(
    namespace: &str,
    project: &Project,
    connection: &Connection,
    username: &str,
    password: &str,
) -> Result<Secret, UrlError> {
    let mut data = BTreeMap::from([
        (USERNAME_KEY.to_string(), bytes(username)),
        (PASSWORD_KEY.to_string(), bytes(password)),
        (
            STANDARD_KEY.to_string(),
            bytes(embed_credentials(&connection.standard_url, username, password)?),
        ),
        (
            STANDARD_SRV_KEY.to_string(),
            bytes(embed_credentials(&connection.standard_srv_url, username, password)?),
        ),
        (PRIVATE_KEY.to_string(), bytes("")),
        (PRIVATE_SRV_KEY.to_string(), bytes("")),
    ]);

    for (index, variant) in connection.private_variants().iter().enumerate() {
        data.insert(
            indexed(PRIVATE_KEY, index),
            bytes(embed_credentials(&variant.url, username, password)?),
        );
        data.insert(
            indexed(PRIVATE_SRV_KEY, index),
            bytes(embed_credentials(&variant.srv_url, username, password)?),
        );
        data.insert(
            indexed(PRIVATE_SHARD_KEY, index),
            bytes(embed_credentials(&variant.shard_url, username, password)?),
        );
    }

    let mut labels = project_labels(&project.id);
    labels.insert(
        CLUSTER_LABEL_KEY.to_string(),
        normalize_label_value(&connection.name),
    );

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(connection_secret_name(&project.name, &connection.name, username)),
            namespace: Some(namespace.to_string()),
            labels: Some(labels),
            annotations: Some(BTreeMap::from([(
                CLUSTER_NAME_ANNOTATION_KEY.to_string(),
                connection.name.clone(),
            )])),
            ..Default::default()
        },
        data: Some(data),
        type_: Some(SECRET_TYPE.to_string()),
        ..Default::default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl UpsertOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
            UpsertOutcome::Unchanged => "unchanged",
        }
    }
}

fn covers(existing: &BTreeMap<String, String>, desired: &BTreeMap<String, String>) -> bool {
    desired.iter().all(|(k, v)| existing.get(k) == Some(v))
}

fn merged(
    existing: Option<&BTreeMap<String, String>>,
    desired: Option<BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.extend(desired.unwrap_or_default());
    merged
}

/// Create `desired`, or replace the existing secret of the same name when
/// its payload, labels or annotations differ. Labels and annotations added
/// by others are kept.
///
/// # Errors
/// Store failures are returned unchanged. A conflict on replace means
/// someone else wrote in between and the caller should retry.
pub async fn upsert_secret(
    store: &dyn SecretStore,
    namespace: &str,
    mut desired: Secret,
) -> Result<UpsertOutcome, StoreError> {
    let name = desired.name_any();
    let Some(existing) = store.get(namespace, &name).await? else {
        store.create(namespace, &desired).await?;
        return Ok(UpsertOutcome::Created);
    };

    if existing.data == desired.data
        && existing.type_ == desired.type_
        && covers(existing.labels(), desired.labels())
        && covers(existing.annotations(), desired.annotations())
    {
        return Ok(UpsertOutcome::Unchanged);
    }

    desired.metadata.labels = Some(merged(
        existing.metadata.labels.as_ref(),
        desired.metadata.labels.take(),
    ));
    desired.metadata.annotations = Some(merged(
        existing.metadata.annotations.as_ref(),
        desired.metadata.annotations.take(),
    ));
    desired.metadata.resource_version = existing.metadata.resource_version.clone();

    store.replace(namespace, &desired).await?;
    Ok(UpsertOutcome::Updated)
}
