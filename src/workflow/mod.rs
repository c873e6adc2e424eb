//! # Workflow
//!
//! Reconcile outcome primitives shared by every resource-kind reconciler.
//!
//! - `result.rs` - [`ReconcileResult`] and the error taxonomy
//! - `reason.rs` - machine-readable reason codes
//! - `condition.rs` - status conditions with edge-triggered transition times

mod condition;
mod reason;
mod result;

pub use condition::{find_condition, set_condition, Condition, ConditionStatus};
pub use reason::ConditionReason;
pub use result::{Classify, ErrorClass, Phase, ReconcileResult};
