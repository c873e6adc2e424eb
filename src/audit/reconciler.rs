//! # Auditing Reconciler
//!
//! Two-level state machine over an [`AtlasAuditing`] resource.
//!
//! The outer level decides ownership of the targets:
//! - `Unknown -> Locked` when at least one target project is listed; the
//!   finalizer is pinned so the targets are not abandoned silently
//! - `Unknown -> Released` when no project is listed; the finalizer goes
//!
//! While `Locked`, every target project is evaluated on its own to one of
//! `MISSING`, `ERROR`, `UPDATE` or `IDLE`. The per-target results are folded
//! into one [`ReconcileResult`], the most severe one winning.

use crate::audit::service::{config_matches, AuditService};
use crate::client::ApiError;
use crate::crd::{
    AtlasAuditing, AtlasAuditingStatus, AuditTargetStatus, AuditingType, TargetState,
    AUDITING_READY_CONDITION,
};
use crate::observability::metrics;
use crate::workflow::{set_condition, Classify, ConditionReason, ErrorClass, ReconcileResult};
use chrono::{DateTime, Utc};
use kube::ResourceExt;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("spec.type must be one of: standalone, linked")]
    MissingType,

    #[error("linked auditing mode is not supported yet")]
    LinkedModeNotSupported,
}

impl Classify for AuditError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Internal
    }
}

impl AuditError {
    #[must_use]
    pub fn to_result(&self) -> ReconcileResult {
        ReconcileResult::terminate(ConditionReason::AuditingNotSupported, self.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Not evaluated (reconciliation skipped)
    Unknown,
    /// Targets are managed, finalizer pinned
    Locked,
    /// Nothing to manage, finalizer removed
    Released,
}

impl LockState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            LockState::Unknown => "UNKNOWN",
            LockState::Locked => "LOCKED",
            LockState::Released => "RELEASED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetOutcome {
    pub project_id: String,
    pub state: TargetState,
    pub result: ReconcileResult,
}

impl TargetOutcome {
    fn status(&self) -> AuditTargetStatus {
        AuditTargetStatus {
            project_id: self.project_id.clone(),
            state: self.state,
            message: (!self.result.message().is_empty()).then(|| self.result.message().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditOutcome {
    pub lock: LockState,
    pub targets: Vec<TargetOutcome>,
    pub result: ReconcileResult,
}

impl AuditOutcome {
    fn skipped() -> Self {
        Self {
            lock: LockState::Unknown,
            targets: Vec::new(),
            result: ReconcileResult::ok(),
        }
    }

    /// Desired finalizer presence, `None` when it must be left alone
    #[must_use]
    pub fn wants_finalizer(&self) -> Option<bool> {
        match self.lock {
            LockState::Unknown => None,
            LockState::Locked => Some(true),
            LockState::Released => Some(false),
        }
    }

    /// Write the ready condition and per-target states. Returns true if
    /// the status changed.
    pub fn apply_status(&self, status: &mut AtlasAuditingStatus, now: DateTime<Utc>) -> bool {
        let mut changed = set_condition(
            &mut status.conditions,
            self.result.to_condition(AUDITING_READY_CONDITION),
            now,
        );
        let targets: Vec<AuditTargetStatus> = self.targets.iter().map(TargetOutcome::status).collect();
        if status.audit_status != targets {
            status.audit_status = targets;
            changed = true;
        }
        changed
    }
}

/// Evaluate `resource` against Atlas and converge every target project
///
/// # Errors
/// Returns [`AuditError`] when the resource cannot be handled at all; the
/// outcome of individual targets is reported inside [`AuditOutcome`]
pub async fn reconcile_auditing(
    service: &dyn AuditService,
    resource: &AtlasAuditing,
) -> Result<AuditOutcome, AuditError> {
    let span = info_span!("audit.reconcile", resource.name = %resource.name_any());
    async {
        if resource.is_skipped() {
            debug!("Reconciliation skipped by annotation");
            return Ok(AuditOutcome::skipped());
        }

        match resource.spec.auditing_type {
            None => return Err(AuditError::MissingType),
            Some(AuditingType::Linked) => return Err(AuditError::LinkedModeNotSupported),
            Some(AuditingType::Standalone) => {}
        }

        let mut seen = HashSet::new();
        let project_ids: Vec<&str> = resource
            .spec
            .project_ids
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .collect();

        if project_ids.is_empty() {
            debug!(lock = LockState::Released.as_str(), "No target projects");
            return Ok(AuditOutcome {
                lock: LockState::Released,
                targets: Vec::new(),
                result: ReconcileResult::ok(),
            });
        }

        let mut targets = Vec::with_capacity(project_ids.len());
        for project_id in project_ids {
            targets.push(evaluate_target(service, resource, project_id).await);
        }
        let result = targets
            .iter()
            .map(|t| t.result.clone())
            .fold(ReconcileResult::ok(), ReconcileResult::merge);

        Ok(AuditOutcome {
            lock: LockState::Locked,
            targets,
            result,
        })
    }
    .instrument(span)
    .await
}

async fn evaluate_target(
    service: &dyn AuditService,
    resource: &AtlasAuditing,
    project_id: &str,
) -> TargetOutcome {
    let desired = &resource.spec.config;
    let outcome = |state: TargetState, result: ReconcileResult| {
        metrics::increment_audit_targets(state.as_str());
        TargetOutcome {
            project_id: project_id.to_string(),
            state,
            result,
        }
    };
    let failed = |error: &ApiError| {
        warn!(project.id = %project_id, error = %error, "❌ Auditing update failed");
        outcome(
            TargetState::Error,
            ReconcileResult::from_error(ConditionReason::AuditingUpdateFailed, error),
        )
    };

    let current = match service.get(project_id).await {
        Ok(current) => current,
        Err(e) if e.is_not_found() => {
            warn!(project.id = %project_id, "Auditing target project not found");
            return outcome(
                TargetState::Missing,
                ReconcileResult::terminate(
                    ConditionReason::AuditingProjectNotFound,
                    format!("project {project_id} not found"),
                ),
            );
        }
        Err(e) => return failed(&e),
    };

    if config_matches(desired, &current) {
        debug!(project.id = %project_id, state = TargetState::Idle.as_str(), "audit.target");
        return outcome(TargetState::Idle, ReconcileResult::ok());
    }

    match service.set(project_id, desired).await {
        Ok(()) => {
            info!(project.id = %project_id, "✅ Auditing configuration updated");
            outcome(TargetState::Update, ReconcileResult::ok())
        }
        Err(e) => failed(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{RECONCILIATION_POLICY_ANNOTATION, RECONCILIATION_POLICY_SKIP};
    use crate::crd::{AtlasAuditingSpec, AuditingConfig};
    use crate::workflow::ConditionStatus;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const KNOWN: &str = "12345";
    const UNKNOWN: &str = "54321";

    struct FakeAuditService {
        projects: Mutex<HashMap<String, AuditingConfig>>,
        set_error: Option<u16>,
        sets: Mutex<Vec<String>>,
    }

    impl FakeAuditService {
        fn new() -> Self {
            let atlas = AuditingConfig {
                enabled: true,
                audit_authorization_success: true,
                audit_filter: Some(serde_json::json!({})),
            };
            Self {
                projects: Mutex::new(HashMap::from([(KNOWN.to_string(), atlas)])),
                set_error: None,
                sets: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AuditService for FakeAuditService {
        async fn get(&self, project_id: &str) -> Result<AuditingConfig, ApiError> {
            self.projects
                .lock()
                .unwrap()
                .get(project_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("project {project_id}")))
        }

        async fn set(&self, project_id: &str, config: &AuditingConfig) -> Result<(), ApiError> {
            if let Some(status) = self.set_error {
                return Err(ApiError::Backend {
                    status,
                    message: "unavailable".into(),
                });
            }
            self.sets.lock().unwrap().push(project_id.to_string());
            self.projects
                .lock()
                .unwrap()
                .insert(project_id.to_string(), config.clone());
            Ok(())
        }
    }

    fn auditing(auditing_type: Option<AuditingType>, project_ids: &[&str], config: AuditingConfig) -> AtlasAuditing {
        AtlasAuditing::new(
            "test-auditing",
            AtlasAuditingSpec {
                auditing_type,
                project_ids: project_ids.iter().map(ToString::to_string).collect(),
                config,
            },
        )
    }

    fn standalone(project_ids: &[&str]) -> AtlasAuditing {
        auditing(Some(AuditingType::Standalone), project_ids, AuditingConfig::default())
    }

    #[tokio::test]
    async fn test_skip_annotation_leaves_everything_alone() {
        let service = FakeAuditService::new();
        let mut resource = standalone(&[KNOWN]);
        resource.annotations_mut().insert(
            RECONCILIATION_POLICY_ANNOTATION.to_string(),
            RECONCILIATION_POLICY_SKIP.to_string(),
        );

        let outcome = reconcile_auditing(&service, &resource).await.unwrap();
        assert_eq!(outcome.lock, LockState::Unknown);
        assert_eq!(outcome.wants_finalizer(), None);
        assert!(service.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_type_is_rejected() {
        let service = FakeAuditService::new();
        let err = reconcile_auditing(&service, &auditing(None, &[KNOWN], AuditingConfig::default()))
            .await
            .unwrap_err();
        assert_eq!(err, AuditError::MissingType);
        assert!(err.to_result().is_terminal());
    }

    #[tokio::test]
    async fn test_linked_mode_is_not_supported() {
        let service = FakeAuditService::new();
        let resource = auditing(Some(AuditingType::Linked), &[KNOWN], AuditingConfig::default());
        let err = reconcile_auditing(&service, &resource).await.unwrap_err();
        assert_eq!(err, AuditError::LinkedModeNotSupported);
        assert_eq!(err.to_result().reason(), Some(ConditionReason::AuditingNotSupported));
    }

    #[tokio::test]
    async fn test_no_projects_releases() {
        let service = FakeAuditService::new();
        let outcome = reconcile_auditing(&service, &standalone(&[])).await.unwrap();
        assert_eq!(outcome.lock, LockState::Released);
        assert_eq!(outcome.wants_finalizer(), Some(false));
        assert!(outcome.result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_project_terminates() {
        let service = FakeAuditService::new();
        let outcome = reconcile_auditing(&service, &standalone(&[UNKNOWN])).await.unwrap();

        assert_eq!(outcome.lock, LockState::Locked);
        assert_eq!(outcome.targets[0].state, TargetState::Missing);
        assert!(outcome.result.is_terminal());
        assert_eq!(outcome.result.reason(), Some(ConditionReason::AuditingProjectNotFound));
    }

    #[tokio::test]
    async fn test_differing_project_is_updated() {
        let service = FakeAuditService::new();
        let outcome = reconcile_auditing(&service, &standalone(&[KNOWN])).await.unwrap();

        assert_eq!(outcome.targets[0].state, TargetState::Update);
        assert!(outcome.result.is_ok());
        assert_eq!(*service.sets.lock().unwrap(), vec![KNOWN.to_string()]);
    }

    #[tokio::test]
    async fn test_matching_project_is_idle() {
        let service = FakeAuditService::new();
        let resource = auditing(
            Some(AuditingType::Standalone),
            &[KNOWN, KNOWN],
            AuditingConfig {
                enabled: true,
                audit_authorization_success: true,
                audit_filter: None,
            },
        );
        let outcome = reconcile_auditing(&service, &resource).await.unwrap();

        assert_eq!(outcome.targets.len(), 1);
        assert_eq!(outcome.targets[0].state, TargetState::Idle);
        assert!(service.sets.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_update_failure_is_retried() {
        let mut service = FakeAuditService::new();
        service.set_error = Some(503);
        let outcome = reconcile_auditing(&service, &standalone(&[KNOWN])).await.unwrap();

        assert_eq!(outcome.targets[0].state, TargetState::Error);
        assert!(outcome.result.is_in_progress());
        assert_eq!(outcome.result.reason(), Some(ConditionReason::AuditingUpdateFailed));
    }

    #[tokio::test]
    async fn test_most_severe_target_wins_and_status_is_written() {
        let service = FakeAuditService::new();
        let outcome = reconcile_auditing(&service, &standalone(&[KNOWN, UNKNOWN]))
            .await
            .unwrap();
        assert!(outcome.result.is_terminal());

        let mut status = AtlasAuditingStatus::default();
        assert!(outcome.apply_status(&mut status, Utc::now()));
        assert_eq!(status.conditions[0].status, ConditionStatus::False);
        assert_eq!(status.audit_status.len(), 2);
        assert_eq!(status.audit_status[0].state, TargetState::Update);
        assert_eq!(status.audit_status[0].message, None);
        assert_eq!(status.audit_status[1].state, TargetState::Missing);

        assert!(!outcome.apply_status(&mut status, Utc::now()));
    }
}
