//! # Credential Resolution
//!
//! Reads a database user's password from the Secret its spec references.
//! The plaintext only ever lives in a [`Zeroizing`] buffer.

use crate::client::error::CredentialError;
use crate::client::store::SecretStore;
use crate::constants::PASSWORD_KEY;
use crate::crd::AtlasDatabaseUser;
use async_trait::async_trait;
use std::sync::Arc;
use zeroize::Zeroizing;

#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn read_password(
        &self,
        owner: &AtlasDatabaseUser,
    ) -> Result<Zeroizing<String>, CredentialError>;
}

/// [`CredentialSource`] reading the `password` key of the owner's password secret
#[derive(Clone)]
pub struct CredentialResolver {
    store: Arc<dyn SecretStore>,
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver").finish_non_exhaustive()
    }
}

impl CredentialResolver {
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialSource for CredentialResolver {
    async fn read_password(
        &self,
        owner: &AtlasDatabaseUser,
    ) -> Result<Zeroizing<String>, CredentialError> {
        let key = owner
            .password_secret_key()
            .ok_or_else(|| CredentialError::MissingSecretRef {
                owner: owner.key().to_string(),
            })?;

        let secret = self
            .store
            .get(&key.namespace, &key.name)
            .await?
            .ok_or_else(|| CredentialError::SecretNotFound {
                namespace: key.namespace.clone(),
                name: key.name.clone(),
            })?;

        // stringData is write-only on the API server but fakes and
        // not-yet-persisted objects may still carry it
        let raw: Zeroizing<Vec<u8>> = match secret.data.as_ref().and_then(|d| d.get(PASSWORD_KEY)) {
            Some(bytes) => Zeroizing::new(bytes.0.clone()),
            None => match secret.string_data.as_ref().and_then(|d| d.get(PASSWORD_KEY)) {
                Some(value) => Zeroizing::new(value.as_bytes().to_vec()),
                None => {
                    return Err(CredentialError::MissingField {
                        namespace: key.namespace,
                        name: key.name,
                        field: PASSWORD_KEY.to_string(),
                    })
                }
            },
        };

        let Ok(password) = std::str::from_utf8(&raw) else {
            return Err(CredentialError::InvalidEncoding {
                namespace: key.namespace,
                name: key.name,
                field: PASSWORD_KEY.to_string(),
            });
        };

        if password.is_empty() {
            return Err(CredentialError::EmptyField {
                namespace: key.namespace,
                name: key.name,
                field: PASSWORD_KEY.to_string(),
            });
        }

        Ok(Zeroizing::new(password.to_string()))
    }
}
