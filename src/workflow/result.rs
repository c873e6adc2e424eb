//! # Reconcile Result
//!
//! Tri-state outcome of a single reconcile attempt. A fresh result is computed
//! on every invocation and never persisted; only the derived [`Condition`]
//! reaches a resource's status.
//!
//! - `Ok` - nothing left to do until the next external trigger
//! - `InProgress` - not converged yet, the scheduler re-invokes after `retry_after`
//! - `Terminate` - failed in a way retrying cannot fix without operator intervention

use crate::constants::DEFAULT_RETRY_SECS;
use crate::workflow::condition::{Condition, ConditionStatus};
use crate::workflow::reason::ConditionReason;
use kube_runtime::controller::Action;
use std::time::Duration;

/// Phase of a reconcile result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Ok,
    InProgress,
    Terminate,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Ok => "ok",
            Phase::InProgress => "in_progress",
            Phase::Terminate => "terminate",
        }
    }
}

/// Error taxonomy shared by every collaborator error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Referenced object is absent
    NotFound,
    /// Credentials are structurally wrong (401/403)
    Auth,
    /// Backend hiccup, 5xx, network failure or optimistic-concurrency conflict
    Transient,
    /// Programming or configuration error
    Internal,
}

/// Implemented by errors that can be mapped onto the reconcile taxonomy
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Outcome of one reconcile attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    phase: Phase,
    reason: Option<ConditionReason>,
    message: String,
    retry_after: Option<Duration>,
}

impl ReconcileResult {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            phase: Phase::Ok,
            reason: None,
            message: String::new(),
            retry_after: None,
        }
    }

    /// Non-terminal result, retried after the default delay
    #[must_use]
    pub fn in_progress(reason: ConditionReason, message: impl Into<String>) -> Self {
        Self {
            phase: Phase::InProgress,
            reason: Some(reason),
            message: message.into(),
            retry_after: Some(Duration::from_secs(DEFAULT_RETRY_SECS)),
        }
    }

    /// Terminal failure, no automatic retry
    #[must_use]
    pub fn terminate(reason: ConditionReason, message: impl Into<String>) -> Self {
        Self {
            phase: Phase::Terminate,
            reason: Some(reason),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Map a classified error onto a result.
    ///
    /// Transient failures become `InProgress`; not-found, auth and internal
    /// failures terminate. The error's `Display` output becomes the message.
    #[must_use]
    pub fn from_error<E>(reason: ConditionReason, error: &E) -> Self
    where
        E: Classify + std::fmt::Display,
    {
        match error.class() {
            ErrorClass::Transient => Self::in_progress(reason, error.to_string()),
            ErrorClass::NotFound | ErrorClass::Auth | ErrorClass::Internal => {
                Self::terminate(reason, error.to_string())
            }
        }
    }

    /// Override the retry delay. Ignored for anything but `InProgress`.
    #[must_use]
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        if self.phase == Phase::InProgress {
            self.retry_after = Some(retry_after);
        }
        self
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn reason(&self) -> Option<ConditionReason> {
        self.reason
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.phase == Phase::Ok
    }

    #[must_use]
    pub fn is_in_progress(&self) -> bool {
        self.phase == Phase::InProgress
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.phase == Phase::Terminate
    }

    /// Keep the more severe of two results (`Terminate` > `InProgress` > `Ok`).
    /// On a tie the first one wins.
    #[must_use]
    pub fn merge(self, other: ReconcileResult) -> ReconcileResult {
        if other.phase > self.phase {
            other
        } else {
            self
        }
    }

    /// Scheduler action for this result
    #[must_use]
    pub fn to_action(&self) -> Action {
        match (self.phase, self.retry_after) {
            (Phase::InProgress, Some(delay)) => Action::requeue(delay),
            (Phase::InProgress, None) => {
                Action::requeue(Duration::from_secs(DEFAULT_RETRY_SECS))
            }
            (Phase::Ok | Phase::Terminate, _) => Action::await_change(),
        }
    }

    /// Condition of the given type derived from this result
    #[must_use]
    pub fn to_condition(&self, condition_type: &str) -> Condition {
        let status = if self.is_ok() {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        };
        let mut condition = Condition::new(condition_type, status).with_message(&*self.message);
        if let Some(reason) = self.reason {
            condition = condition.with_reason(reason.as_str());
        }
        condition
    }
}

impl Default for ReconcileResult {
    fn default() -> Self {
        Self::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fake(ErrorClass);

    impl std::fmt::Display for Fake {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "fake {:?}", self.0)
        }
    }

    impl Classify for Fake {
        fn class(&self) -> ErrorClass {
            self.0
        }
    }

    #[test]
    fn test_in_progress_gets_default_retry() {
        let result = ReconcileResult::in_progress(
            ConditionReason::DatabaseUserConnectionSecretsNotCreated,
            "waiting",
        );
        assert!(result.is_in_progress());
        assert_eq!(
            result.retry_after(),
            Some(Duration::from_secs(DEFAULT_RETRY_SECS))
        );
    }

    #[test]
    fn test_retry_override_ignored_for_terminal_results() {
        let result = ReconcileResult::terminate(ConditionReason::Internal, "boom")
            .with_retry_after(Duration::from_secs(1));
        assert_eq!(result.retry_after(), None);
    }

    #[test]
    fn test_error_classes_map_to_phases() {
        let reason = ConditionReason::BackendError;
        assert!(ReconcileResult::from_error(reason, &Fake(ErrorClass::Transient)).is_in_progress());
        assert!(ReconcileResult::from_error(reason, &Fake(ErrorClass::Auth)).is_terminal());
        assert!(ReconcileResult::from_error(reason, &Fake(ErrorClass::NotFound)).is_terminal());
        assert!(ReconcileResult::from_error(reason, &Fake(ErrorClass::Internal)).is_terminal());
    }

    #[test]
    fn test_error_message_is_surfaced_verbatim() {
        let result =
            ReconcileResult::from_error(ConditionReason::Internal, &Fake(ErrorClass::Internal));
        assert_eq!(result.message(), "fake Internal");
        assert_eq!(result.reason(), Some(ConditionReason::Internal));
    }

    #[test]
    fn test_merge_keeps_most_severe() {
        let ok = ReconcileResult::ok();
        let progress = ReconcileResult::in_progress(ConditionReason::BackendError, "a");
        let term = ReconcileResult::terminate(ConditionReason::Internal, "b");

        assert!(ok.clone().merge(progress.clone()).is_in_progress());
        assert!(progress.clone().merge(term.clone()).is_terminal());
        assert!(term.merge(ok).is_terminal());
    }

    #[test]
    fn test_to_action() {
        assert_eq!(ReconcileResult::ok().to_action(), Action::await_change());
        assert_eq!(
            ReconcileResult::in_progress(ConditionReason::BackendError, "x")
                .with_retry_after(Duration::from_secs(3))
                .to_action(),
            Action::requeue(Duration::from_secs(3))
        );
        assert_eq!(
            ReconcileResult::terminate(ConditionReason::Internal, "x").to_action(),
            Action::await_change()
        );
    }

    #[test]
    fn test_to_condition() {
        let cond = ReconcileResult::ok().to_condition("Ready");
        assert_eq!(cond.status, ConditionStatus::True);
        assert!(cond.reason.is_none());

        let cond = ReconcileResult::terminate(ConditionReason::DatabaseUserInvalidSpec, "bad")
            .to_condition("Ready");
        assert_eq!(cond.status, ConditionStatus::False);
        assert_eq!(cond.reason.as_deref(), Some("DatabaseUserInvalidSpec"));
        assert_eq!(cond.message.as_deref(), Some("bad"));
    }
}
