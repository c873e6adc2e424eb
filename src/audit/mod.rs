//! # Auditing
//!
//! Applies an `AtlasAuditing` resource to the database auditing settings of
//! its target projects.
//!
//! - `service.rs` - [`AuditService`] and its Atlas implementation
//! - `reconciler.rs` - lock / per-target state machine
//! - `controller.rs` - kube-runtime controller writing finalizer and status

mod controller;
mod reconciler;
mod service;

pub use controller::{reconcile, run_auditing_controller, AuditContext, ControllerError};
pub use reconciler::{reconcile_auditing, AuditError, AuditOutcome, LockState, TargetOutcome};
pub use service::{config_matches, AuditService};
