use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, AvailabilityPeriod, CompetenceId,
    Identity, Person, PersonId,
};

/// Persistence gateway used by the submission, review, and listing components.
///
/// Implementations own the connection to the relational store. Multi-row writes only happen
/// through a [`StoreTransaction`] obtained from [`ApplicationStore::begin`].
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn find_person(&self, identity: &Identity) -> Result<Option<Person>, StoreError>;

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError>;

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;

    /// Writes `status` and bumps the version only when the stored version equals
    /// `expected_version`. The check and the write are a single atomic step.
    async fn compare_and_set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        expected_version: i64,
    ) -> Result<StatusWrite, StoreError>;

    /// Reads applications (all, or only `only`) plus the applicants' profiles and competence
    /// translations from one consistent view of committed data.
    async fn application_snapshot(
        &self,
        only: Option<ApplicationId>,
    ) -> Result<ApplicationSnapshot, StoreError>;
}

/// Write scope spanning one submission. Dropping it without `commit` discards every write.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Returns the number of rows updated.
    async fn update_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<u64, StoreError>;

    async fn insert_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<(), StoreError>;

    /// Inserts an unset application at version 0.
    async fn insert_availability(
        &mut self,
        person: PersonId,
        period: &AvailabilityPeriod,
    ) -> Result<ApplicationId, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Outcome of a guarded status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    Applied { version: i64 },
    VersionMismatch { current: i64 },
    Missing,
}

/// Availability row joined with the applicant's name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRow {
    pub record: ApplicationRecord,
    pub name: String,
    pub surname: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub person_id: PersonId,
    pub competence_id: CompetenceId,
    pub years_of_experience: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRow {
    pub competence_id: CompetenceId,
    pub language: String,
    pub translation: String,
}

/// Flat rows backing the denormalized application listing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApplicationSnapshot {
    pub applications: Vec<ApplicationRow>,
    pub profiles: Vec<ProfileRow>,
    pub translations: Vec<TranslationRow>,
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error("store operation timed out")]
    Timeout,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected stored value: {0}")]
    Decode(String),
    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match classify(&err) {
            Some(mapped) => mapped,
            None => StoreError::Database(err),
        }
    }
}

// SQLSTATE 57014 is query_canceled, raised when statement_timeout fires.
const QUERY_CANCELED: &str = "57014";

fn classify(err: &sqlx::Error) -> Option<StoreError> {
    use sqlx::error::ErrorKind;

    match err {
        sqlx::Error::PoolTimedOut => Some(StoreError::Timeout),
        sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            Some(StoreError::Unavailable(err.to_string()))
        }
        sqlx::Error::Database(db) => {
            if db.code().as_deref() == Some(QUERY_CANCELED) {
                return Some(StoreError::Timeout);
            }
            match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Some(StoreError::Constraint(db.message().to_string())),
                _ => None,
            }
        }
        _ => None,
    }
}
