//! # Credential Bindings
//!
//! Provisions a fresh Atlas database user for a consumer and hands its
//! credentials over in a local Secret.
//!
//! The two writes are not transactional. When the Secret cannot be created
//! after the user was, the user is deleted again so no orphan credentials
//! stay behind in Atlas. If that compensating delete fails too, both errors
//! are reported and the binding terminates; an operator has to remove the
//! user by hand.

use crate::client::{ApiError, AtlasClient, DatabaseUserRequest, RoleRequest, SecretStore, StoreError};
use crate::constants::{PASSWORD_KEY, USERNAME_KEY};
use crate::workflow::{Classify, ConditionReason, ErrorClass, ReconcileResult};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

const DIGITS: &[u8] = b"0123456789";
const SPECIALS: &[u8] = b"~=+%^*/()[]{}!@#$?|";
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const PASSWORD_LENGTH: usize = 16;

/// Default role granted to bound users
pub const DEFAULT_BINDING_ROLE: &str = "readWriteAnyDatabase";

#[derive(Debug, Clone)]
pub struct BindingRequest {
    pub project_id: String,
    pub namespace: String,
    /// Name of the Secret receiving the credentials
    pub secret_name: String,
    pub username_prefix: String,
    pub database_name: String,
    pub roles: Vec<RoleRequest>,
    pub labels: BTreeMap<String, String>,
}

impl BindingRequest {
    /// Request for a user with [`DEFAULT_BINDING_ROLE`] on `admin`
    #[must_use]
    pub fn new(
        project_id: impl Into<String>,
        namespace: impl Into<String>,
        secret_name: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            namespace: namespace.into(),
            secret_name: secret_name.into(),
            username_prefix: "atlas-db-user".to_string(),
            database_name: "admin".to_string(),
            roles: vec![RoleRequest {
                role_name: DEFAULT_BINDING_ROLE.to_string(),
                database_name: "admin".to_string(),
                collection_name: None,
            }],
            labels: BTreeMap::new(),
        }
    }
}

/// Credentials handed out by a successful binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub username: String,
    pub secret_name: String,
}

#[derive(Debug, Error)]
pub enum BindingError {
    #[error("failed to create database user {username}: {source}")]
    CreateUser { username: String, source: ApiError },

    #[error("failed to create credentials secret {name}: {source}")]
    CreateSecret { name: String, source: StoreError },

    #[error(
        "failed to create credentials secret {name} ({secret_error}) and failed to delete database user {username} afterwards ({cleanup_error}); remove the user manually"
    )]
    CompensationFailed {
        name: String,
        username: String,
        secret_error: StoreError,
        cleanup_error: ApiError,
    },
}

impl Classify for BindingError {
    fn class(&self) -> ErrorClass {
        match self {
            BindingError::CreateUser { source, .. } => source.class(),
            // the user was rolled back, a retry starts from scratch
            BindingError::CreateSecret { source, .. } => source.class(),
            BindingError::CompensationFailed { .. } => ErrorClass::Internal,
        }
    }
}

impl BindingError {
    /// Bindings never retry on their own: a half-provisioned binding must
    /// not be repeated blindly
    #[must_use]
    pub fn to_result(&self) -> ReconcileResult {
        let reason = match self {
            BindingError::CreateUser { source, .. } if source.class() == ErrorClass::Auth => {
                ConditionReason::AtlasAuthenticationFailed
            }
            BindingError::CreateUser { .. } | BindingError::CreateSecret { .. } => {
                ConditionReason::ConnectionBackendError
            }
            BindingError::CompensationFailed { .. } => ConditionReason::ConnectionCleanupFailed,
        };
        ReconcileResult::terminate(reason, self.to_string())
    }
}

/// Random password with at least one digit and one special character
#[must_use]
pub fn generate_password<R: Rng>(rng: &mut R) -> Zeroizing<String> {
    let all: Vec<u8> = [LETTERS, DIGITS, SPECIALS].concat();
    let mut buf: Zeroizing<Vec<u8>> = Zeroizing::new(Vec::with_capacity(PASSWORD_LENGTH));
    buf.push(DIGITS[rng.gen_range(0..DIGITS.len())]);
    buf.push(SPECIALS[rng.gen_range(0..SPECIALS.len())]);
    while buf.len() < PASSWORD_LENGTH {
        buf.push(all[rng.gen_range(0..all.len())]);
    }
    buf.shuffle(rng);
    // every byte comes from the ASCII tables above
    Zeroizing::new(buf.iter().map(|&b| char::from(b)).collect())
}

fn generate_username(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}

fn credentials_secret(request: &BindingRequest, username: &str, password: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(request.secret_name.clone()),
            namespace: Some(request.namespace.clone()),
            labels: (!request.labels.is_empty()).then(|| request.labels.clone()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([
            (USERNAME_KEY.to_string(), ByteString(username.as_bytes().to_vec())),
            (PASSWORD_KEY.to_string(), ByteString(password.as_bytes().to_vec())),
        ])),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

/// Create a database user and store its credentials in a Secret,
/// deleting the user again if the Secret cannot be written
///
/// # Errors
/// See [`BindingError`]
pub async fn provision_binding(
    atlas: &dyn AtlasClient,
    store: &dyn SecretStore,
    request: &BindingRequest,
) -> Result<Binding, BindingError> {
    let username = generate_username(&request.username_prefix);
    let password = generate_password(&mut rand::thread_rng());

    let user = DatabaseUserRequest {
        username: username.clone(),
        password: password.as_str().to_owned(),
        database_name: request.database_name.clone(),
        roles: request.roles.clone(),
        scopes: Vec::new(),
    };
    atlas
        .create_database_user(&request.project_id, &user)
        .await
        .map_err(|source| BindingError::CreateUser {
            username: username.clone(),
            source,
        })?;

    let secret = credentials_secret(request, &username, &password);
    if let Err(secret_error) = store.create(&request.namespace, &secret).await {
        warn!(
            secret = %request.secret_name,
            user.name = %username,
            error = %secret_error,
            "Credentials secret creation failed, deleting database user"
        );
        let cleanup = atlas
            .delete_database_user(&request.project_id, &request.database_name, &username)
            .await;
        return match cleanup {
            // already gone is as good as deleted
            Err(cleanup_error) if !cleanup_error.is_not_found() => {
                error!(
                    user.name = %username,
                    error = %cleanup_error,
                    "❌ Failed to delete database user after secret creation failure"
                );
                Err(BindingError::CompensationFailed {
                    name: request.secret_name.clone(),
                    username,
                    secret_error,
                    cleanup_error,
                })
            }
            _ => Err(BindingError::CreateSecret {
                name: request.secret_name.clone(),
                source: secret_error,
            }),
        };
    }

    info!(
        secret = %request.secret_name,
        user.name = %username,
        "✅ Credential binding provisioned"
    );
    Ok(Binding {
        username,
        secret_name: request.secret_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_password_has_digit_and_special() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let password = generate_password(&mut rng);
            assert_eq!(password.len(), PASSWORD_LENGTH);
            assert!(password.bytes().any(|b| DIGITS.contains(&b)));
            assert!(password.bytes().any(|b| SPECIALS.contains(&b)));
        }
    }

    #[test]
    fn test_usernames_are_unique() {
        let a = generate_username("atlas-db-user");
        let b = generate_username("atlas-db-user");
        assert_ne!(a, b);
        assert!(a.starts_with("atlas-db-user-"));
    }

    #[test]
    fn test_compensation_failure_terminates() {
        let err = BindingError::CompensationFailed {
            name: "creds".into(),
            username: "u".into(),
            secret_error: StoreError::Backend("etcd".into()),
            cleanup_error: ApiError::Backend {
                status: 500,
                message: "oops".into(),
            },
        };
        let result = err.to_result();
        assert!(result.is_terminal());
        assert_eq!(result.reason(), Some(ConditionReason::ConnectionCleanupFailed));
        assert!(result.message().contains("etcd"));
        assert!(result.message().contains("oops"));
    }
}
