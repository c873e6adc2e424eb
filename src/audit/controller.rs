//! # Auditing Controller
//!
//! Runs [`reconcile_auditing`] for every `AtlasAuditing` resource through a
//! `kube_runtime::Controller` and writes back finalizer and status.
//!
//! Deleting a resource only releases the finalizer. Auditing settings already
//! applied in Atlas stay as they are.

use crate::audit::reconciler::{reconcile_auditing, LockState};
use crate::audit::service::AuditService;
use crate::constants::AUDITING_FINALIZER;
use crate::crd::{AtlasAuditing, AUDITING_READY_CONDITION};
use crate::workflow::set_condition;
use chrono::Utc;
use futures::StreamExt;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use kube_runtime::controller::Action;
use kube_runtime::{watcher, Controller};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

pub struct AuditContext {
    api: Api<AtlasAuditing>,
    service: Arc<dyn AuditService>,
    retry_after: Duration,
}

impl std::fmt::Debug for AuditContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditContext")
            .field("retry_after", &self.retry_after)
            .finish_non_exhaustive()
    }
}

impl AuditContext {
    #[must_use]
    pub fn new(client: Client, service: Arc<dyn AuditService>, retry_after: Duration) -> Self {
        Self {
            api: Api::all(client),
            service,
            retry_after,
        }
    }
}

/// Finalizer list after pinning or releasing ours, `None` if unchanged
fn finalizers_after(current: &[String], wanted: bool) -> Option<Vec<String>> {
    let present = current.iter().any(|f| f == AUDITING_FINALIZER);
    if present == wanted {
        return None;
    }
    let mut finalizers: Vec<String> = current
        .iter()
        .filter(|f| *f != AUDITING_FINALIZER)
        .cloned()
        .collect();
    if wanted {
        finalizers.push(AUDITING_FINALIZER.to_string());
    }
    Some(finalizers)
}

async fn set_finalizer(
    api: &Api<AtlasAuditing>,
    resource: &AtlasAuditing,
    wanted: bool,
) -> Result<(), ControllerError> {
    let Some(finalizers) = finalizers_after(resource.finalizers(), wanted) else {
        return Ok(());
    };
    let patch = json!({ "metadata": { "finalizers": finalizers } });
    api.patch(&resource.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
        .await?;
    debug!(resource.name = %resource.name_any(), pinned = wanted, "audit.finalizer");
    Ok(())
}

/// Reconcile one `AtlasAuditing` resource
///
/// # Errors
/// Returns an error if finalizer or status cannot be written
pub async fn reconcile(
    resource: Arc<AtlasAuditing>,
    ctx: Arc<AuditContext>,
) -> Result<Action, ControllerError> {
    if resource.metadata.deletion_timestamp.is_some() {
        set_finalizer(&ctx.api, &resource, false).await?;
        return Ok(Action::await_change());
    }

    let now = Utc::now();
    let mut status = resource.status.clone().unwrap_or_default();
    let (result, changed) = match reconcile_auditing(ctx.service.as_ref(), &resource).await {
        Ok(outcome) if outcome.lock == LockState::Unknown => return Ok(Action::await_change()),
        Ok(outcome) => {
            if let Some(wanted) = outcome.wants_finalizer() {
                set_finalizer(&ctx.api, &resource, wanted).await?;
            }
            let changed = outcome.apply_status(&mut status, now);
            (outcome.result, changed)
        }
        Err(e) => {
            warn!(resource.name = %resource.name_any(), error = %e, "Auditing resource rejected");
            let result = e.to_result();
            let changed = set_condition(
                &mut status.conditions,
                result.to_condition(AUDITING_READY_CONDITION),
                now,
            );
            (result, changed)
        }
    };

    if changed {
        let patch = json!({ "status": status });
        ctx.api
            .patch_status(&resource.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
    }

    Ok(result.with_retry_after(ctx.retry_after).to_action())
}

fn error_policy(resource: Arc<AtlasAuditing>, error: &ControllerError, ctx: Arc<AuditContext>) -> Action {
    error!(
        resource.name = %resource.name_any(),
        error = %error,
        "❌ Auditing reconciliation error"
    );
    Action::requeue(ctx.retry_after)
}

/// Run the auditing controller until the process receives a shutdown signal
pub async fn run_auditing_controller(ctx: Arc<AuditContext>) {
    info!("Starting AtlasAuditing controller");
    Controller::new(ctx.api.clone(), watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((object, _)) => debug!(resource.name = %object.name, "audit.reconciled"),
                Err(e) => warn!(error = %e, "Auditing controller error"),
            }
        })
        .await;
    info!("AtlasAuditing controller stopped");
}
