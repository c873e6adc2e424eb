//! # Condition Reasons
//!
//! Machine-readable reason codes attached to reconcile results and status
//! conditions. Callers branch on these codes, never on messages.

use std::fmt;

/// Reason code for a reconcile outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionReason {
    /// Unexpected failure inside the controller
    Internal,
    /// Atlas rejected the configured API credentials
    AtlasAuthenticationFailed,
    /// Atlas or the resource store answered with a transient failure
    BackendError,
    /// A referenced object does not exist
    ResourceNotFound,
    DatabaseUserInvalidSpec,
    DatabaseUserConnectionSecretsNotCreated,
    DatabaseUserConnectionSecretsNotDeleted,
    DatabaseUserStaleConnectionSecrets,
    /// At least one connection endpoint is still being provisioned
    ConnectionInventoryNotReady,
    /// Credential binding could not be provisioned
    ConnectionBackendError,
    /// Credential binding failed and the compensating cleanup failed as well
    ConnectionCleanupFailed,
    AuditingReady,
    AuditingNotSupported,
    AuditingProjectNotFound,
    AuditingUpdateFailed,
}

impl ConditionReason {
    /// CamelCase representation written to status conditions
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionReason::Internal => "InternalError",
            ConditionReason::AtlasAuthenticationFailed => "AtlasAuthenticationFailed",
            ConditionReason::BackendError => "BackendError",
            ConditionReason::ResourceNotFound => "ResourceNotFound",
            ConditionReason::DatabaseUserInvalidSpec => "DatabaseUserInvalidSpec",
            ConditionReason::DatabaseUserConnectionSecretsNotCreated => {
                "DatabaseUserConnectionSecretsNotCreated"
            }
            ConditionReason::DatabaseUserConnectionSecretsNotDeleted => {
                "DatabaseUserConnectionSecretsNotDeleted"
            }
            ConditionReason::DatabaseUserStaleConnectionSecrets => {
                "DatabaseUserStaleConnectionSecrets"
            }
            ConditionReason::ConnectionInventoryNotReady => "ConnectionInventoryNotReady",
            ConditionReason::ConnectionBackendError => "ConnectionBackendError",
            ConditionReason::ConnectionCleanupFailed => "ConnectionCleanupFailed",
            ConditionReason::AuditingReady => "AuditingReady",
            ConditionReason::AuditingNotSupported => "AuditingNotSupported",
            ConditionReason::AuditingProjectNotFound => "AuditingProjectNotFound",
            ConditionReason::AuditingUpdateFailed => "AuditingUpdateFailed",
        }
    }
}

impl fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
