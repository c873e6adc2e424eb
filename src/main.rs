//! # Atlas Connection Controller
//!
//! Process entry point. Wires the dependency registry, the Secret watch and
//! the `AtlasDatabaseUser` dependency tracking into a work queue, serves
//! probes and metrics, and optionally runs the `AtlasAuditing` controller.
//!
//! Dequeued reconcile requests are logged as `reconcile.requested`; the
//! dependent reconcilers consume them from there.

use anyhow::{Context, Result};
use atlas_connection_controller::audit::{run_auditing_controller, AuditContext};
use atlas_connection_controller::client::AtlasRestClient;
use atlas_connection_controller::config::ControllerConfig;
use atlas_connection_controller::crd::AtlasDatabaseUser;
use atlas_connection_controller::observability::{logging, metrics};
use atlas_connection_controller::server::{start_server, ServerState};
use atlas_connection_controller::watch::{
    run_dependency_tracking, run_secret_watch, ChannelWorkQueue, DependencyRegistry,
    WatchEventRouter, WorkQueue,
};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .unwrap_or_else(|_| panic!("Failed to install rustls crypto provider"));

    let config = ControllerConfig::from_env();
    logging::init(&config.log_level, logging::LogFormat::parse(&config.log_format))
        .context("Failed to initialize logging")?;

    info!("Starting Atlas Connection Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(?config, "Controller configuration loaded");

    metrics::register_metrics()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_state = Arc::new(ServerState::new());

    let server_handle = tokio::spawn({
        let state = Arc::clone(&server_state);
        let shutdown = shutdown_rx.clone();
        let port = config.metrics_port;
        async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (secrets, users): (Api<Secret>, Api<AtlasDatabaseUser>) = match &config.watch_namespace {
        Some(namespace) => {
            info!(namespace = %namespace, "Watching a single namespace");
            (
                Api::namespaced(client.clone(), namespace),
                Api::namespaced(client.clone(), namespace),
            )
        }
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };

    let registry = Arc::new(DependencyRegistry::new());
    let (queue, mut requests) = ChannelWorkQueue::new();
    let queue: Arc<dyn WorkQueue> = Arc::new(queue);
    let router = Arc::new(WatchEventRouter::for_secrets(Arc::clone(&registry), queue));

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(run_dependency_tracking(
        users,
        Arc::clone(&registry),
        shutdown_rx.clone(),
    )));

    tasks.push(tokio::spawn({
        let router = Arc::clone(&router);
        let mut shutdown = shutdown_rx.clone();
        let restart_delay = config.watch_restart_delay();
        async move {
            loop {
                run_secret_watch(secrets.clone(), Arc::clone(&router), shutdown.clone()).await;
                if *shutdown.borrow() {
                    return;
                }
                warn!(delay = ?restart_delay, "⚠️  Restarting Secret watch");
                tokio::select! {
                    () = tokio::time::sleep(restart_delay) => {}
                    _ = shutdown.changed() => return,
                }
            }
        }
    }));

    tasks.push(tokio::spawn(async move {
        while let Some(key) = requests.recv().await {
            info!(dependent = %key, "reconcile.requested");
        }
    }));

    if config.enable_auditing {
        let token = config
            .load_access_token()
            .context("Auditing is enabled but no usable Atlas access token is configured")?;
        let atlas = AtlasRestClient::new(&config.atlas_base_url, token, config.request_timeout())
            .context("Failed to create Atlas API client")?;
        let ctx = Arc::new(AuditContext::new(
            client.clone(),
            Arc::new(atlas),
            config.retry_duration(),
        ));
        tasks.push(tokio::spawn(run_auditing_controller(ctx)));
    } else {
        info!("AtlasAuditing controller disabled (set ENABLE_AUDITING=true to run it)");
    }

    server_state.set_ready(true);
    info!("✅ Controller initialized, watching for changes");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, stopping");

    if shutdown_tx.send(true).is_err() {
        warn!("No task was listening for shutdown");
    }
    server_state.set_ready(false);

    // The drain task only ends once every queue handle is gone
    drop(router);
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Task ended abnormally");
        }
    }
    if let Err(e) = server_handle.await {
        warn!(error = %e, "HTTP server task ended abnormally");
    }

    info!("Controller stopped");
    Ok(())
}
