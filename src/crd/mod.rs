//! # Custom Resource Definitions
//!
//! CRD types owned by the connection controller.
//!
//! - `database_user.rs` - `AtlasDatabaseUser` spec, status and helpers
//! - `auditing.rs` - `AtlasAuditing` spec and per-project status

mod auditing;
mod database_user;

pub use auditing::{
    AtlasAuditing, AtlasAuditingSpec, AtlasAuditingStatus, AuditTargetStatus, AuditingConfig,
    AuditingType, TargetState, AUDITING_READY_CONDITION,
};
pub use database_user::{
    default_database_name, normalize_spec, AtlasDatabaseUser, AtlasDatabaseUserSpec,
    AtlasDatabaseUserStatus, LocalObjectRef, ResourceRef, RoleSpec, ScopeSpec, ScopeType,
    SpecError, READY_CONDITION,
};
