//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ## Usage
//!
//! ```rust
//! use atlas_connection_controller::prelude::*;
//! ```
//!
//! This brings into scope:
//! - All CRD types (AtlasDatabaseUser, AtlasAuditing, etc.)
//! - Collaborator traits (AtlasClient, SecretStore, CredentialSource, AuditService)
//! - Dependency watch types (DependencyRegistry, WatchEventRouter, WorkQueue)
//! - Reconcile outcome types (ReconcileResult, ConditionReason)
//! - Config types (ControllerConfig)

// CRD types - most commonly used
pub use crate::crd::*;

// Collaborator traits - needed for alternative backends and test fakes
pub use crate::audit::AuditService;
pub use crate::client::{AtlasClient, CredentialSource, SecretStore};

// Dependency watch
pub use crate::watch::{
    DependencyRegistry, ObjectKey, SignificanceRule, WatchEventRouter, WatchedObject, WorkQueue,
};

// Connection secrets
pub use crate::connsecret::{ConnectionSecretSynchronizer, SyncReport};

// Reconcile outcome
pub use crate::workflow::{Classify, ConditionReason, ErrorClass, Phase, ReconcileResult};

// Config types
pub use crate::config::ControllerConfig;

// Common error types
pub use crate::client::{ApiError, CredentialError, StoreError};
