use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde_json::Value;

use crate::applications::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission,
    AvailabilityPeriod, CompetenceEntry, CompetenceId, CompetenceTranslation, Identity, NewPerson,
    Person, PersonId, Role,
};
use crate::applications::memory::MemoryStore;
use crate::applications::store::{
    ApplicationSnapshot, ApplicationStore, StatusWrite, StoreError, StoreTransaction,
};
use crate::applications::{ApplicationService, ReviewPolicy};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn period(from: NaiveDate, to: NaiveDate) -> AvailabilityPeriod {
    AvailabilityPeriod {
        from_date: from,
        to_date: to,
    }
}

pub(super) fn january() -> AvailabilityPeriod {
    period(date(2024, 1, 1), date(2024, 2, 1))
}

pub(super) fn summer() -> AvailabilityPeriod {
    period(date(2024, 6, 1), date(2024, 8, 31))
}

pub(super) fn entry(competence: CompetenceId, years: f64) -> CompetenceEntry {
    CompetenceEntry {
        competence_id: competence,
        years_of_experience: years,
    }
}

pub(super) fn submission(
    competencies: Vec<CompetenceEntry>,
    periods: Vec<AvailabilityPeriod>,
) -> ApplicationSubmission {
    ApplicationSubmission {
        competencies,
        periods,
    }
}

/// Seeded memory store: one applicant, one recruiter, two competences.
pub(super) struct Fixture {
    pub(super) store: Arc<MemoryStore>,
    pub(super) applicant: Person,
    pub(super) recruiter: Person,
    pub(super) ticket_sales: CompetenceId,
    pub(super) lotteries: CompetenceId,
}

impl Fixture {
    pub(super) async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let applicant = store
            .add_person(NewPerson {
                name: "Anna".to_string(),
                surname: "Lind".to_string(),
                email: "anna@example.se".to_string(),
                username: "anna".to_string(),
                role: Role::Applicant,
            })
            .await
            .expect("applicant seeded");
        let recruiter = store
            .add_person(NewPerson {
                name: "Rut".to_string(),
                surname: "Berg".to_string(),
                email: "rut@example.se".to_string(),
                username: "rut".to_string(),
                role: Role::Recruiter,
            })
            .await
            .expect("recruiter seeded");
        let ticket_sales = store
            .add_competence(vec![
                CompetenceTranslation {
                    language: "en".to_string(),
                    translation: "ticket sales".to_string(),
                },
                CompetenceTranslation {
                    language: "sv".to_string(),
                    translation: "biljettförsäljning".to_string(),
                },
            ])
            .await;
        let lotteries = store
            .add_competence(vec![CompetenceTranslation {
                language: "en".to_string(),
                translation: "lotteries".to_string(),
            }])
            .await;

        Self {
            store,
            applicant,
            recruiter,
            ticket_sales,
            lotteries,
        }
    }

    pub(super) fn applicant_identity(&self) -> Identity {
        Identity::Username(self.applicant.username.clone())
    }

    pub(super) fn service(&self) -> ApplicationService<MemoryStore> {
        ApplicationService::new(Arc::clone(&self.store), ReviewPolicy::default())
    }

    pub(super) fn service_with(&self, policy: ReviewPolicy) -> ApplicationService<MemoryStore> {
        ApplicationService::new(Arc::clone(&self.store), policy)
    }

    /// Submits one January period for the applicant and returns its id.
    pub(super) async fn submitted_application(&self) -> ApplicationId {
        let receipt = self
            .service()
            .submit(
                &self.applicant_identity(),
                &submission(vec![entry(self.ticket_sales, 3.0)], vec![january()]),
            )
            .await
            .expect("submission succeeds");
        receipt.applications[0]
    }

    pub(super) async fn record(&self, id: ApplicationId) -> ApplicationRecord {
        self.store
            .fetch_application(id)
            .await
            .expect("fetch succeeds")
            .expect("application present")
    }
}

/// Memory store whose transactions fail on the n-th availability insert.
pub(super) struct FlakyStore {
    pub(super) inner: MemoryStore,
    pub(super) fail_on_availability: usize,
}

#[async_trait]
impl ApplicationStore for FlakyStore {
    async fn find_person(&self, identity: &Identity) -> Result<Option<Person>, StoreError> {
        self.inner.find_person(identity).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FlakyTransaction {
            inner,
            inserted: 0,
            fail_on: self.fail_on_availability,
        }))
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        self.inner.fetch_application(id).await
    }

    async fn compare_and_set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        expected_version: i64,
    ) -> Result<StatusWrite, StoreError> {
        self.inner
            .compare_and_set_status(id, status, expected_version)
            .await
    }

    async fn application_snapshot(
        &self,
        only: Option<ApplicationId>,
    ) -> Result<ApplicationSnapshot, StoreError> {
        self.inner.application_snapshot(only).await
    }
}

struct FlakyTransaction {
    inner: Box<dyn StoreTransaction>,
    inserted: usize,
    fail_on: usize,
}

#[async_trait]
impl StoreTransaction for FlakyTransaction {
    async fn update_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<u64, StoreError> {
        self.inner
            .update_competence_profile(person, competence, years_of_experience)
            .await
    }

    async fn insert_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<(), StoreError> {
        self.inner
            .insert_competence_profile(person, competence, years_of_experience)
            .await
    }

    async fn insert_availability(
        &mut self,
        person: PersonId,
        period: &AvailabilityPeriod,
    ) -> Result<ApplicationId, StoreError> {
        self.inserted += 1;
        if self.inserted == self.fail_on {
            return Err(StoreError::Unavailable("connection reset by peer".to_string()));
        }
        self.inner.insert_availability(person, period).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

/// Store that behaves like a database that is down.
pub(super) struct UnavailableStore;

fn offline() -> StoreError {
    StoreError::Unavailable("database offline at 10.0.0.7:5432".to_string())
}

#[async_trait]
impl ApplicationStore for UnavailableStore {
    async fn find_person(&self, _identity: &Identity) -> Result<Option<Person>, StoreError> {
        Err(offline())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Err(offline())
    }

    async fn fetch_application(
        &self,
        _id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        Err(offline())
    }

    async fn compare_and_set_status(
        &self,
        _id: ApplicationId,
        _status: ApplicationStatus,
        _expected_version: i64,
    ) -> Result<StatusWrite, StoreError> {
        Err(offline())
    }

    async fn application_snapshot(
        &self,
        _only: Option<ApplicationId>,
    ) -> Result<ApplicationSnapshot, StoreError> {
        Err(offline())
    }
}

/// Store whose row moves on between the status pre-read and the guarded write: reads report
/// `version` while the write answers with `write`.
pub(super) struct DriftingStore {
    record: ApplicationRecord,
    write: StatusWrite,
}

impl DriftingStore {
    pub(super) fn new(version: i64, write: StatusWrite) -> Self {
        Self {
            record: ApplicationRecord {
                id: ApplicationId(7),
                person_id: PersonId(1),
                period: january(),
                status: ApplicationStatus::Unset,
                version,
                created_at: Utc::now(),
            },
            write,
        }
    }

    pub(super) fn application_id(&self) -> ApplicationId {
        self.record.id
    }
}

#[async_trait]
impl ApplicationStore for DriftingStore {
    async fn find_person(&self, _identity: &Identity) -> Result<Option<Person>, StoreError> {
        Ok(None)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        Err(offline())
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok((id == self.record.id).then(|| self.record.clone()))
    }

    async fn compare_and_set_status(
        &self,
        _id: ApplicationId,
        _status: ApplicationStatus,
        _expected_version: i64,
    ) -> Result<StatusWrite, StoreError> {
        Ok(self.write)
    }

    async fn application_snapshot(
        &self,
        _only: Option<ApplicationId>,
    ) -> Result<ApplicationSnapshot, StoreError> {
        Ok(ApplicationSnapshot::default())
    }
}

pub(super) async fn json_body(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    let value = serde_json::from_slice(&bytes).expect("json body");
    (status, value)
}
