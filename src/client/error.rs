//! # Client Errors
//!
//! Typed errors returned by the Atlas REST client, the secret store and
//! credential resolution. Each classifies into the reconcile taxonomy.

use crate::workflow::{Classify, ErrorClass};
use thiserror::Error;

/// Errors from the Atlas Admin API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Atlas resource not found: {0}")]
    NotFound(String),

    #[error("Atlas rejected the API credentials (401)")]
    Unauthorized,

    #[error("Atlas denied access (403): {0}")]
    Forbidden(String),

    #[error("Atlas returned HTTP {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Atlas request failed: {0}")]
    Transport(String),

    #[error("Failed to decode Atlas response: {0}")]
    Decode(String),
}

impl ApiError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}

impl Classify for ApiError {
    fn class(&self) -> ErrorClass {
        match self {
            ApiError::NotFound(_) => ErrorClass::NotFound,
            ApiError::Unauthorized | ApiError::Forbidden(_) => ErrorClass::Auth,
            // 4xx other than 401/403/404 means the request itself was wrong
            ApiError::Backend { status, .. } if (400..500).contains(status) && *status != 429 => {
                ErrorClass::Internal
            }
            ApiError::Backend { .. } | ApiError::Transport(_) => ErrorClass::Transient,
            ApiError::Decode(_) => ErrorClass::Internal,
        }
    }
}

/// Errors from the secondary-object store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    #[error("Conflict writing {kind} {namespace}/{name}: {message}")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
        message: String,
    },

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl Classify for StoreError {
    fn class(&self) -> ErrorClass {
        match self {
            StoreError::NotFound { .. } => ErrorClass::NotFound,
            // Both resolve on the next attempt against fresh state
            StoreError::AlreadyExists { .. } | StoreError::Conflict { .. } => ErrorClass::Transient,
            StoreError::Backend(_) => ErrorClass::Transient,
        }
    }
}

/// Errors resolving an owner's password
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("{owner} has no password secret reference")]
    MissingSecretRef { owner: String },

    #[error("password secret {namespace}/{name} not found")]
    SecretNotFound { namespace: String, name: String },

    #[error("password secret {namespace}/{name} has no '{field}' field")]
    MissingField {
        namespace: String,
        name: String,
        field: String,
    },

    #[error("password secret {namespace}/{name} has an empty '{field}' field")]
    EmptyField {
        namespace: String,
        name: String,
        field: String,
    },

    #[error("password secret {namespace}/{name} field '{field}' is not valid UTF-8")]
    InvalidEncoding {
        namespace: String,
        name: String,
        field: String,
    },

    #[error("failed to read password secret: {0}")]
    Store(#[from] StoreError),
}

impl Classify for CredentialError {
    fn class(&self) -> ErrorClass {
        match self {
            CredentialError::SecretNotFound { .. } => ErrorClass::NotFound,
            CredentialError::MissingSecretRef { .. }
            | CredentialError::MissingField { .. }
            | CredentialError::EmptyField { .. }
            | CredentialError::InvalidEncoding { .. } => ErrorClass::Internal,
            CredentialError::Store(e) => e.class(),
        }
    }
}
