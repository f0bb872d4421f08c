use std::sync::Arc;

use super::domain::{ApplicationId, ApplicationSubmission, Identity};
use super::listing::{ApplicationAggregator, ApplicationView};
use super::status::{ReviewPolicy, StatusReceipt, StatusUpdateError, StatusUpdater};
use super::store::{ApplicationStore, StoreError};
use super::submission::{SubmissionCoordinator, SubmissionError, SubmissionReceipt};

/// Service composing submission, review, and listing over one store.
pub struct ApplicationService<S> {
    submissions: SubmissionCoordinator<S>,
    reviews: StatusUpdater<S>,
    listing: ApplicationAggregator<S>,
}

impl<S> ApplicationService<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(store: Arc<S>, policy: ReviewPolicy) -> Self {
        Self {
            submissions: SubmissionCoordinator::new(Arc::clone(&store)),
            reviews: StatusUpdater::new(Arc::clone(&store), policy),
            listing: ApplicationAggregator::new(store),
        }
    }

    /// Submit competences and availability periods for an applicant.
    pub async fn submit(
        &self,
        identity: &Identity,
        submission: &ApplicationSubmission,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        self.submissions.submit(identity, submission).await
    }

    /// Record a recruiter decision if `version` is still current.
    pub async fn update_status(
        &self,
        application_id: ApplicationId,
        status: &str,
        version: i64,
    ) -> Result<StatusReceipt, StatusUpdateError> {
        self.reviews.update(application_id, status, version).await
    }

    pub async fn list(&self) -> Result<Vec<ApplicationView>, StoreError> {
        self.listing.list().await
    }

    pub async fn get(
        &self,
        application_id: ApplicationId,
    ) -> Result<Option<ApplicationView>, StoreError> {
        self.listing.get(application_id).await
    }

    pub fn review_policy(&self) -> ReviewPolicy {
        self.reviews.policy()
    }
}
