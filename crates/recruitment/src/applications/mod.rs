//! Application intake and recruiter review.
//!
//! Submissions are written atomically through a [`StoreTransaction`]; status changes go through
//! a version-guarded compare-and-swap so two recruiters acting on the same application cannot
//! both win.

pub mod domain;
pub mod listing;
pub mod memory;
pub mod postgres;
pub mod router;
pub mod service;
pub mod status;
pub mod store;
pub mod submission;
pub(crate) mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission,
    AvailabilityPeriod, CompetenceEntry, CompetenceId, CompetenceTranslation, Identity, NewPerson,
    Person, PersonId, Role,
};
pub use listing::{ApplicantView, ApplicationAggregator, ApplicationView, CompetenceProfileView};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use router::{application_router, StatusUpdateRequest, SubmitApplicationRequest};
pub use service::ApplicationService;
pub use status::{ReviewPolicy, StatusReceipt, StatusUpdateError, StatusUpdater};
pub use store::{
    ApplicationRow, ApplicationSnapshot, ApplicationStore, ProfileRow, StatusWrite, StoreError,
    StoreTransaction, TranslationRow,
};
pub use submission::{
    create_availability, upsert_competence_profile, ProfileWrite, SubmissionCoordinator,
    SubmissionError, SubmissionReceipt,
};
pub use validation::ValidationError;
