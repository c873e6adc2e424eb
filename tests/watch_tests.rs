//! Dependency registry and watch event routing working together

mod common;

use atlas_connection_controller::constants::SECRET_KIND;
use atlas_connection_controller::watch::{
    DependencyRegistry, KindWatches, ObjectKey, WatchEventRouter, WatchedObject, WorkQueue,
};
use common::*;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;
use std::sync::Arc;

fn secret(name: &str, value: &str, resource_version: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NAMESPACE.to_string()),
            resource_version: Some(resource_version.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(
            "password".to_string(),
            ByteString(value.as_bytes().to_vec()),
        )])),
        ..Default::default()
    }
}

fn setup() -> (Arc<DependencyRegistry>, Arc<RecordingQueue>, WatchEventRouter) {
    let registry = Arc::new(DependencyRegistry::new());
    let queue = Arc::new(RecordingQueue::default());
    let sink: Arc<RecordingQueue> = Arc::clone(&queue);
    let sink: Arc<dyn WorkQueue> = sink;
    let router = WatchEventRouter::for_secrets(Arc::clone(&registry), sink);
    (registry, queue, router)
}

#[test]
fn test_database_user_dependencies_route_secret_changes() {
    let (registry, queue, router) = setup();
    let user = database_user("app-user", "app");
    registry.ensure_watched(&user.key(), SECRET_KIND, user.dependencies());

    let old = secret(PASSWORD_SECRET, "one", "1");
    let new = secret(PASSWORD_SECRET, "two", "2");
    assert_eq!(router.on_update(SECRET_KIND, &old, &new), 1);
    assert_eq!(queue.take(), vec![ObjectKey::new(NAMESPACE, "app-user")]);
}

#[test]
fn test_metadata_only_update_is_filtered() {
    let (registry, queue, router) = setup();
    let user = database_user("app-user", "app");
    registry.ensure_watched(&user.key(), SECRET_KIND, user.dependencies());

    let old = secret(PASSWORD_SECRET, "same", "1");
    let new = secret(PASSWORD_SECRET, "same", "2");
    assert_eq!(router.on_update(SECRET_KIND, &old, &new), 0);
    assert!(queue.take().is_empty());
}

#[test]
fn test_shared_secret_fans_out_to_every_dependent() {
    let (registry, queue, router) = setup();
    for name in ["b-user", "a-user"] {
        let user = database_user(name, name);
        registry.ensure_watched(&user.key(), SECRET_KIND, user.dependencies());
    }

    let key = ObjectKey::new(NAMESPACE, PASSWORD_SECRET);
    assert_eq!(router.on_create(SECRET_KIND, &key), 2);
    assert_eq!(
        queue.take(),
        vec![
            ObjectKey::new(NAMESPACE, "a-user"),
            ObjectKey::new(NAMESPACE, "b-user"),
        ]
    );
}

#[test]
fn test_delete_and_generic_events_enqueue_nothing() {
    let (registry, queue, router) = setup();
    let user = database_user("app-user", "app");
    registry.ensure_watched(&user.key(), SECRET_KIND, user.dependencies());

    let key = ObjectKey::new(NAMESPACE, PASSWORD_SECRET);
    assert_eq!(router.on_delete(SECRET_KIND, &key), 0);
    assert_eq!(router.on_generic(SECRET_KIND, &key), 0);
    assert!(queue.take().is_empty());
}

#[test]
fn test_switching_password_secret_moves_the_dependency() {
    let (registry, queue, router) = setup();
    let mut user = database_user("app-user", "app");
    registry.ensure_watched(&user.key(), SECRET_KIND, user.dependencies());

    user.spec.password_secret_ref = Some(atlas_connection_controller::crd::LocalObjectRef {
        name: "rotated-password".to_string(),
    });
    registry.ensure_watched(&user.key(), SECRET_KIND, user.dependencies());

    assert_eq!(router.on_create(SECRET_KIND, &ObjectKey::new(NAMESPACE, PASSWORD_SECRET)), 0);
    assert_eq!(router.on_create(SECRET_KIND, &ObjectKey::new(NAMESPACE, "rotated-password")), 1);
    assert_eq!(queue.take().len(), 1);
}

#[test]
fn test_forgotten_user_is_no_longer_enqueued() {
    let (registry, queue, router) = setup();
    let user = database_user("app-user", "app");
    registry.ensure_watched(&user.key(), SECRET_KIND, user.dependencies());
    registry.forget(&user.key());

    assert!(registry.is_empty());
    assert_eq!(router.on_create(SECRET_KIND, &ObjectKey::new(NAMESPACE, PASSWORD_SECRET)), 0);
    assert!(queue.take().is_empty());
}

#[test]
fn test_multi_kind_registration_keeps_kinds_apart() {
    let registry = DependencyRegistry::new();
    let owner = ObjectKey::new(NAMESPACE, "app-user");
    let shared = ObjectKey::new(NAMESPACE, "shared");
    registry.ensure_watched_multi_kind(
        &owner,
        vec![
            KindWatches::new("Secret", vec![shared.clone()]),
            KindWatches::new("ConfigMap", vec![shared.clone()]),
        ],
    );

    registry.ensure_watched(&owner, "ConfigMap", Vec::<ObjectKey>::new());

    assert_eq!(
        registry.dependents_of(&WatchedObject::new("Secret", shared.clone())),
        vec![owner]
    );
    assert!(registry
        .dependents_of(&WatchedObject::new("ConfigMap", shared))
        .is_empty());
}
