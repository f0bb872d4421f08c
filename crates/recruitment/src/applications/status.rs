use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::domain::{ApplicationId, ApplicationStatus};
use super::store::{ApplicationStore, StatusWrite, StoreError};
use super::validation::{self, ValidationError};

/// Which review decisions a recruiter may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPolicy {
    /// Allow an accepted application to be rejected (and the reverse).
    pub allow_decision_change: bool,
}

impl Default for ReviewPolicy {
    fn default() -> Self {
        Self {
            allow_decision_change: true,
        }
    }
}

impl ReviewPolicy {
    pub fn check(
        &self,
        from: ApplicationStatus,
        to: ApplicationStatus,
    ) -> Result<(), StatusUpdateError> {
        let allowed = match (from, to) {
            (_, ApplicationStatus::Unset) => false,
            (from, to) if from.is_decided() && from != to => self.allow_decision_change,
            _ => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(StatusUpdateError::InvalidTransition { from, to })
        }
    }
}

/// State of an application after a successful review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReceipt {
    pub application_id: ApplicationId,
    pub application_status: ApplicationStatus,
    pub version_number: i64,
}

/// Applies recruiter decisions guarded by the application's version number.
pub struct StatusUpdater<S> {
    store: Arc<S>,
    policy: ReviewPolicy,
}

impl<S> StatusUpdater<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(store: Arc<S>, policy: ReviewPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> ReviewPolicy {
        self.policy
    }

    /// Compare-and-swap on `version_number`. A stale `caller_version` is reported as
    /// [`StatusUpdateError::Conflict`] and leaves the row untouched.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        application_id: ApplicationId,
        status: &str,
        caller_version: i64,
    ) -> Result<StatusReceipt, StatusUpdateError> {
        validation::validate_application_id(application_id)?;
        validation::validate_version(caller_version)?;
        let target = ApplicationStatus::parse(status)
            .ok_or_else(|| StatusUpdateError::InvalidStatus(status.to_string()))?;

        let current = self
            .store
            .fetch_application(application_id)
            .await
            .map_err(StatusUpdateError::Persistence)?
            .ok_or(StatusUpdateError::NotFound(application_id))?;

        if current.version != caller_version {
            return Err(self.conflict(application_id, caller_version, current.version));
        }
        // The stored status is the one belonging to `caller_version`; the guarded write below
        // fails if anything changed since.
        self.policy.check(current.status, target)?;

        let write = self
            .store
            .compare_and_set_status(application_id, target, caller_version)
            .await
            .map_err(StatusUpdateError::Persistence)?;

        match write {
            StatusWrite::Applied { version } => {
                info!(status = %target, version, "application status updated");
                Ok(StatusReceipt {
                    application_id,
                    application_status: target,
                    version_number: version,
                })
            }
            StatusWrite::VersionMismatch { current } => {
                Err(self.conflict(application_id, caller_version, current))
            }
            StatusWrite::Missing => Err(StatusUpdateError::NotFound(application_id)),
        }
    }

    fn conflict(
        &self,
        application_id: ApplicationId,
        expected: i64,
        current: i64,
    ) -> StatusUpdateError {
        warn!(expected, current, "stale application version");
        StatusUpdateError::Conflict {
            application_id,
            expected,
            current,
        }
    }
}

/// Error raised by the status updater.
#[derive(Debug, thiserror::Error)]
pub enum StatusUpdateError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("'{0}' is not a recognised application status")]
    InvalidStatus(String),
    #[error("application status cannot change from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("application {0} not found")]
    NotFound(ApplicationId),
    #[error(
        "application {application_id} was already handled or changed \
         (version {expected} is stale, current version is {current})"
    )]
    Conflict {
        application_id: ApplicationId,
        expected: i64,
        current: i64,
    },
    #[error("could not update application")]
    Persistence(#[source] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_is_never_a_target() {
        let policy = ReviewPolicy::default();
        for from in [
            ApplicationStatus::Unset,
            ApplicationStatus::Accepted,
            ApplicationStatus::Rejected,
        ] {
            assert!(matches!(
                policy.check(from, ApplicationStatus::Unset),
                Err(StatusUpdateError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn default_policy_allows_changing_a_decision() {
        let policy = ReviewPolicy::default();
        assert!(policy
            .check(ApplicationStatus::Accepted, ApplicationStatus::Rejected)
            .is_ok());
        assert!(policy
            .check(ApplicationStatus::Rejected, ApplicationStatus::Accepted)
            .is_ok());
    }

    #[test]
    fn strict_policy_locks_decisions_but_allows_repeats() {
        let policy = ReviewPolicy {
            allow_decision_change: false,
        };
        assert!(policy
            .check(ApplicationStatus::Unset, ApplicationStatus::Accepted)
            .is_ok());
        assert!(policy
            .check(ApplicationStatus::Accepted, ApplicationStatus::Accepted)
            .is_ok());
        assert!(matches!(
            policy.check(ApplicationStatus::Accepted, ApplicationStatus::Rejected),
            Err(StatusUpdateError::InvalidTransition {
                from: ApplicationStatus::Accepted,
                to: ApplicationStatus::Rejected,
            })
        ));
    }
}
