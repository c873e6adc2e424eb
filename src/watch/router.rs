//! # Watch Event Router
//!
//! Turns change notifications on secondary objects into reconcile requests
//! for the primary resources registered as their dependents.
//!
//! Which callbacks apply to which kind is fixed when the router is built:
//! every kind may carry a [`SignificanceRule`] that decides whether an update
//! changed anything a dependent cares about. Kinds without a rule treat every
//! update as significant.
//!
//! The router only reads the [`DependencyRegistry`]; enqueuing is its only
//! side effect.

use crate::constants::SECRET_KIND;
use crate::observability::metrics;
use crate::watch::registry::{DependencyRegistry, ObjectKey, WatchedObject};
use kube::{Resource, ResourceExt};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sink for reconcile requests, implemented by the external scheduler
pub trait WorkQueue: Send + Sync {
    fn enqueue(&self, key: ObjectKey);
}

/// Decides whether an update between two serialized versions of an object
/// is worth a reconcile
pub trait SignificanceRule: Send + Sync {
    fn is_significant(&self, old: &Value, new: &Value) -> bool;
}

impl<F> SignificanceRule for F
where
    F: Fn(&Value, &Value) -> bool + Send + Sync,
{
    fn is_significant(&self, old: &Value, new: &Value) -> bool {
        self(old, new)
    }
}

/// Significant when any of the listed top-level payload fields differ.
/// Metadata (resourceVersion, managedFields, annotations) is never compared.
#[derive(Debug, Clone)]
pub struct PayloadFieldsRule {
    fields: Vec<&'static str>,
}

impl PayloadFieldsRule {
    #[must_use]
    pub fn new(fields: &[&'static str]) -> Self {
        Self {
            fields: fields.to_vec(),
        }
    }

    /// `data`, `stringData` and `type` of a Secret
    #[must_use]
    pub fn secret() -> Self {
        Self::new(&["data", "stringData", "type"])
    }

    /// `data` and `binaryData` of a ConfigMap
    #[must_use]
    pub fn config_map() -> Self {
        Self::new(&["data", "binaryData"])
    }
}

impl SignificanceRule for PayloadFieldsRule {
    fn is_significant(&self, old: &Value, new: &Value) -> bool {
        self.fields.iter().any(|field| old.get(field) != new.get(field))
    }
}

pub struct WatchEventRouter {
    registry: Arc<DependencyRegistry>,
    queue: Arc<dyn WorkQueue>,
    rules: HashMap<String, Arc<dyn SignificanceRule>>,
}

impl fmt::Debug for WatchEventRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&String> = self.rules.keys().collect();
        kinds.sort();
        f.debug_struct("WatchEventRouter")
            .field("filtered_kinds", &kinds)
            .finish_non_exhaustive()
    }
}

pub struct WatchEventRouterBuilder {
    registry: Arc<DependencyRegistry>,
    queue: Arc<dyn WorkQueue>,
    rules: HashMap<String, Arc<dyn SignificanceRule>>,
}

impl fmt::Debug for WatchEventRouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchEventRouterBuilder")
            .field("rules", &self.rules.len())
            .finish_non_exhaustive()
    }
}

impl WatchEventRouterBuilder {
    /// Attach a significance rule to `kind`, replacing any previous one
    #[must_use]
    pub fn with_rule(mut self, kind: impl Into<String>, rule: impl SignificanceRule + 'static) -> Self {
        self.rules.insert(kind.into(), Arc::new(rule));
        self
    }

    #[must_use]
    pub fn build(self) -> WatchEventRouter {
        WatchEventRouter {
            registry: self.registry,
            queue: self.queue,
            rules: self.rules,
        }
    }
}

impl WatchEventRouter {
    #[must_use]
    pub fn builder(
        registry: Arc<DependencyRegistry>,
        queue: Arc<dyn WorkQueue>,
    ) -> WatchEventRouterBuilder {
        WatchEventRouterBuilder {
            registry,
            queue,
            rules: HashMap::new(),
        }
    }

    /// Router with the payload rule for Secrets, the only kind the
    /// connection controller watches
    #[must_use]
    pub fn for_secrets(registry: Arc<DependencyRegistry>, queue: Arc<dyn WorkQueue>) -> Self {
        Self::builder(registry, queue)
            .with_rule(SECRET_KIND, PayloadFieldsRule::secret())
            .build()
    }

    /// A created object is always significant, it may be a re-creation of
    /// something dependents were waiting for. Returns the number of requests
    /// enqueued.
    pub fn on_create(&self, kind: &str, key: &ObjectKey) -> usize {
        self.enqueue_dependents(kind, key)
    }

    /// Enqueue dependents only if the kind's significance rule reports a change
    pub fn on_update<K>(&self, kind: &str, old: &K, new: &K) -> usize
    where
        K: Resource + Serialize,
    {
        let key = ObjectKey::new(new.namespace().unwrap_or_default(), new.name_any());

        if let Some(rule) = self.rules.get(kind) {
            match (serde_json::to_value(old), serde_json::to_value(new)) {
                (Ok(old), Ok(new)) => {
                    if !rule.is_significant(&old, &new) {
                        debug!(
                            watched.kind = kind,
                            watched.key = %key,
                            "watch.event.filtered: update has no payload change"
                        );
                        metrics::increment_updates_filtered(kind);
                        return 0;
                    }
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!(
                        watched.kind = kind,
                        watched.key = %key,
                        error = %e,
                        "Failed to serialize watched object, treating update as significant"
                    );
                }
            }
        }

        self.enqueue_dependents(kind, &key)
    }

    /// Deletion is handled by the owning reconciler's own deletion logic
    pub fn on_delete(&self, _kind: &str, _key: &ObjectKey) -> usize {
        0
    }

    pub fn on_generic(&self, _kind: &str, _key: &ObjectKey) -> usize {
        0
    }

    fn enqueue_dependents(&self, kind: &str, key: &ObjectKey) -> usize {
        let watched = WatchedObject::new(kind, key.clone());
        let dependents = self.registry.dependents_of(&watched);
        let count = dependents.len();

        for dependent in dependents {
            debug!(
                watched.kind = kind,
                watched.key = %key,
                resource.namespace = %dependent.namespace,
                resource.name = %dependent.name,
                "watch.event.enqueued"
            );
            self.queue.enqueue(dependent);
        }

        if count > 0 {
            metrics::increment_reconcile_requests(kind, count);
        }
        count
    }
}
