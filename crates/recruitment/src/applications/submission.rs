use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::domain::{
    ApplicationId, ApplicationSubmission, AvailabilityPeriod, CompetenceEntry, Identity, PersonId,
};
use super::store::{ApplicationStore, StoreError, StoreTransaction};
use super::validation::{self, ValidationError};

/// Whether the upsert touched an existing profile row or created one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileWrite {
    Created,
    Updated,
}

/// Summary of a committed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub person_id: PersonId,
    pub profiles_created: usize,
    pub profiles_updated: usize,
    pub applications: Vec<ApplicationId>,
}

/// Persists a whole submission (profiles and availability periods) in one transaction.
pub struct SubmissionCoordinator<S> {
    store: Arc<S>,
}

impl<S> SubmissionCoordinator<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(identity = %identity))]
    pub async fn submit(
        &self,
        identity: &Identity,
        submission: &ApplicationSubmission,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        validation::validate_identity(identity)?;
        validation::validate_submission(submission)?;

        let person = self
            .store
            .find_person(identity)
            .await
            .map_err(SubmissionError::Failed)?
            .ok_or(SubmissionError::PersonNotFound)?;

        let mut tx = self.store.begin().await.map_err(SubmissionError::Failed)?;
        match write_submission(tx.as_mut(), person.id, submission).await {
            Ok(receipt) => {
                tx.commit().await.map_err(SubmissionError::Failed)?;
                info!(
                    person_id = %person.id,
                    profiles_created = receipt.profiles_created,
                    profiles_updated = receipt.profiles_updated,
                    applications = receipt.applications.len(),
                    "application submitted"
                );
                Ok(receipt)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "rollback after failed submission also failed");
                }
                warn!(person_id = %person.id, error = %err, "application submission rolled back");
                Err(SubmissionError::Failed(err))
            }
        }
    }
}

// Every write is awaited in order before the caller commits.
async fn write_submission(
    tx: &mut dyn StoreTransaction,
    person: PersonId,
    submission: &ApplicationSubmission,
) -> Result<SubmissionReceipt, StoreError> {
    let mut receipt = SubmissionReceipt {
        person_id: person,
        profiles_created: 0,
        profiles_updated: 0,
        applications: Vec::with_capacity(submission.periods.len()),
    };

    for entry in &submission.competencies {
        match upsert_competence_profile(tx, person, entry).await? {
            ProfileWrite::Created => receipt.profiles_created += 1,
            ProfileWrite::Updated => receipt.profiles_updated += 1,
        }
    }

    for period in &submission.periods {
        let id = create_availability(tx, person, period).await?;
        receipt.applications.push(id);
    }

    Ok(receipt)
}

/// Update-then-insert-on-miss, so resubmitting a competence overwrites the experience value
/// instead of tripping the (person, competence) uniqueness.
pub async fn upsert_competence_profile(
    tx: &mut dyn StoreTransaction,
    person: PersonId,
    entry: &CompetenceEntry,
) -> Result<ProfileWrite, StoreError> {
    let updated = tx
        .update_competence_profile(person, entry.competence_id, entry.years_of_experience)
        .await?;
    if updated > 0 {
        return Ok(ProfileWrite::Updated);
    }

    tx.insert_competence_profile(person, entry.competence_id, entry.years_of_experience)
        .await?;
    Ok(ProfileWrite::Created)
}

/// Always inserts a fresh application; identical periods are not deduplicated.
pub async fn create_availability(
    tx: &mut dyn StoreTransaction,
    person: PersonId,
    period: &AvailabilityPeriod,
) -> Result<ApplicationId, StoreError> {
    tx.insert_availability(person, period).await
}

/// Error raised by the submission coordinator.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("applicant could not be found")]
    PersonNotFound,
    #[error("could not submit application")]
    Failed(#[source] StoreError),
}
