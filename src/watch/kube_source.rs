//! # Secret Watch Source
//!
//! Feeds a `kube_runtime::watcher` stream of Secrets into the
//! [`WatchEventRouter`]. The watcher only reports the latest state of an
//! object, so a local cache of the last seen version is kept to hand the
//! router an old/new pair on updates.
//!
//! Re-lists (`Init` .. `InitDone`) are reconciled against the cache: objects
//! that vanished while the watch was down are reported as deletes, objects
//! that appeared are reported as creates.

use crate::constants::SECRET_KIND;
use crate::crd::AtlasDatabaseUser;
use crate::watch::registry::{DependencyRegistry, ObjectKey};
use crate::watch::router::WatchEventRouter;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, ResourceExt};
use kube_runtime::watcher;
use kube_runtime::WatchStreamExt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Last-seen state of every Secret, driving old/new pairs for the router
#[derive(Debug, Default)]
pub(crate) struct SecretCache {
    objects: HashMap<ObjectKey, Secret>,
    relist_seen: Option<HashSet<ObjectKey>>,
    initialized: bool,
}

impl SecretCache {
    /// Apply one watcher event, returning the number of reconcile requests
    /// the router produced
    pub(crate) fn handle(&mut self, router: &WatchEventRouter, event: watcher::Event<Secret>) -> usize {
        match event {
            watcher::Event::Apply(secret) => self.apply(router, secret),
            watcher::Event::Delete(secret) => {
                let key = key_of(&secret);
                self.objects.remove(&key);
                router.on_delete(SECRET_KIND, &key)
            }
            watcher::Event::Init => {
                self.relist_seen = Some(HashSet::new());
                0
            }
            watcher::Event::InitApply(secret) => {
                let key = key_of(&secret);
                if let Some(seen) = self.relist_seen.as_mut() {
                    seen.insert(key);
                }
                if self.initialized {
                    self.apply(router, secret)
                } else {
                    // First listing, nothing to compare against
                    self.objects.insert(key_of(&secret), secret);
                    0
                }
            }
            watcher::Event::InitDone => {
                let mut enqueued = 0;
                if let Some(seen) = self.relist_seen.take() {
                    let gone: Vec<ObjectKey> = self
                        .objects
                        .keys()
                        .filter(|key| !seen.contains(*key))
                        .cloned()
                        .collect();
                    for key in gone {
                        self.objects.remove(&key);
                        enqueued += router.on_delete(SECRET_KIND, &key);
                    }
                }
                self.initialized = true;
                enqueued
            }
        }
    }

    fn apply(&mut self, router: &WatchEventRouter, secret: Secret) -> usize {
        let key = key_of(&secret);
        let enqueued = match self.objects.get(&key) {
            Some(old) => router.on_update(SECRET_KIND, old, &secret),
            None => router.on_create(SECRET_KIND, &key),
        };
        self.objects.insert(key, secret);
        enqueued
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.objects.len()
    }
}

fn key_of(secret: &Secret) -> ObjectKey {
    ObjectKey::new(secret.namespace().unwrap_or_default(), secret.name_any())
}

/// Watch Secrets through `api` until `shutdown` flips to true.
///
/// Watch errors are logged and retried with the watcher's default backoff.
pub async fn run_secret_watch(
    api: Api<Secret>,
    router: Arc<WatchEventRouter>,
    mut shutdown: watch::Receiver<bool>,
) {
    if *shutdown.borrow() {
        return;
    }

    info!("Starting Secret watch for dependent reconcile routing");

    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);
    let mut cache = SecretCache::default();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Secret watch stopping");
                    return;
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(event)) => {
                        let enqueued = cache.handle(&router, event);
                        if enqueued > 0 {
                            debug!(enqueued, "Secret change routed to dependents");
                        }
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "⚠️  Secret watch error, retrying");
                    }
                    None => {
                        warn!("Secret watch stream ended");
                        return;
                    }
                }
            }
        }
    }
}

/// Keeps the registry in line with the password secrets of every
/// `AtlasDatabaseUser`
#[derive(Debug, Default)]
pub(crate) struct DependencyTracker {
    known: HashSet<ObjectKey>,
    relist_seen: Option<HashSet<ObjectKey>>,
}

impl DependencyTracker {
    pub(crate) fn handle(&mut self, registry: &DependencyRegistry, event: watcher::Event<AtlasDatabaseUser>) {
        match event {
            watcher::Event::Apply(user) => self.track(registry, &user),
            watcher::Event::InitApply(user) => {
                if let Some(seen) = self.relist_seen.as_mut() {
                    seen.insert(user.key());
                }
                self.track(registry, &user);
            }
            watcher::Event::Delete(user) => {
                let key = user.key();
                self.known.remove(&key);
                registry.forget(&key);
            }
            watcher::Event::Init => self.relist_seen = Some(HashSet::new()),
            watcher::Event::InitDone => {
                if let Some(seen) = self.relist_seen.take() {
                    for key in self.known.difference(&seen) {
                        registry.forget(key);
                    }
                    self.known = seen;
                }
            }
        }
    }

    fn track(&mut self, registry: &DependencyRegistry, user: &AtlasDatabaseUser) {
        let key = user.key();
        registry.ensure_watched(&key, SECRET_KIND, user.dependencies());
        self.known.insert(key);
    }
}

/// Register the password-secret dependencies of every `AtlasDatabaseUser`
/// seen through `api` until `shutdown` flips to true
pub async fn run_dependency_tracking(
    api: Api<AtlasDatabaseUser>,
    registry: Arc<DependencyRegistry>,
    mut shutdown: watch::Receiver<bool>,
) {
    if *shutdown.borrow() {
        return;
    }

    info!("Starting AtlasDatabaseUser watch for dependency tracking");

    let stream = watcher(api, watcher::Config::default()).default_backoff();
    futures::pin_mut!(stream);
    let mut tracker = DependencyTracker::default();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("AtlasDatabaseUser watch stopping");
                    return;
                }
            }
            next = stream.next() => {
                match next {
                    Some(Ok(event)) => tracker.handle(&registry, event),
                    Some(Err(e)) => {
                        warn!(error = %e, "⚠️  AtlasDatabaseUser watch error, retrying");
                    }
                    None => {
                        warn!("AtlasDatabaseUser watch stream ended");
                        return;
                    }
                }
            }
        }
    }
}
