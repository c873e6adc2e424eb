//! # Watch
//!
//! Dependency tracking between primary resources and the secondary objects
//! they reference, plus routing of secondary-object changes into reconcile
//! requests.
//!
//! - `registry.rs` - concurrency-safe reverse index (watched object -> dependents)
//! - `router.rs` - significance filtering and enqueuing
//! - `queue.rs` - channel-backed work queue
//! - `kube_source.rs` - Kubernetes Secret watcher feeding the router

pub mod kube_source;
mod queue;
mod registry;
mod router;

pub use kube_source::{run_dependency_tracking, run_secret_watch};
pub use queue::ChannelWorkQueue;
pub use registry::{DependencyRegistry, KindWatches, ObjectKey, RegistrySnapshot, WatchedObject};
pub use router::{
    PayloadFieldsRule, SignificanceRule, WatchEventRouter, WatchEventRouterBuilder, WorkQueue,
};
