use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, AvailabilityPeriod, CompetenceId,
    CompetenceTranslation, Identity, NewPerson, Person, PersonId,
};
use super::store::{
    ApplicationRow, ApplicationSnapshot, ApplicationStore, ProfileRow, StatusWrite, StoreError,
    StoreTransaction, TranslationRow,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    people: BTreeMap<PersonId, Person>,
    competences: BTreeMap<CompetenceId, Vec<CompetenceTranslation>>,
    // Kept as a plain row list so duplicate (person, competence) rows would be observable.
    profiles: Vec<ProfileRow>,
    applications: BTreeMap<ApplicationId, ApplicationRecord>,
    last_person_id: i64,
    last_competence_id: i64,
    last_application_id: i64,
}

impl Tables {
    fn require_person(&self, person: PersonId) -> Result<(), StoreError> {
        if self.people.contains_key(&person) {
            Ok(())
        } else {
            Err(StoreError::Constraint(format!(
                "person {person} does not exist"
            )))
        }
    }
}

/// Process-local store with the same transactional guarantees as the Postgres store.
///
/// A transaction owns the table lock for its whole lifetime and writes to a staged copy, so
/// commits are all-or-nothing and concurrent readers only ever see committed tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_person(&self, person: NewPerson) -> Result<Person, StoreError> {
        let mut tables = self.tables.lock().await;
        let duplicate = tables
            .people
            .values()
            .any(|existing| existing.username == person.username || existing.email == person.email);
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "username '{}' or email '{}' already registered",
                person.username, person.email
            )));
        }

        tables.last_person_id += 1;
        let stored = Person {
            id: PersonId(tables.last_person_id),
            name: person.name,
            surname: person.surname,
            email: person.email,
            username: person.username,
            role: person.role,
        };
        tables.people.insert(stored.id, stored.clone());
        Ok(stored)
    }

    pub async fn add_competence(&self, translations: Vec<CompetenceTranslation>) -> CompetenceId {
        let mut tables = self.tables.lock().await;
        tables.last_competence_id += 1;
        let id = CompetenceId(tables.last_competence_id);
        tables.competences.insert(id, translations);
        id
    }

    pub async fn profiles_for(&self, person: PersonId) -> Vec<ProfileRow> {
        let tables = self.tables.lock().await;
        tables
            .profiles
            .iter()
            .filter(|row| row.person_id == person)
            .cloned()
            .collect()
    }

    pub async fn applications_for(&self, person: PersonId) -> Vec<ApplicationRecord> {
        let tables = self.tables.lock().await;
        tables
            .applications
            .values()
            .filter(|record| record.person_id == person)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn find_person(&self, identity: &Identity) -> Result<Option<Person>, StoreError> {
        let tables = self.tables.lock().await;
        let found = match identity {
            Identity::Person(id) => tables.people.get(id).cloned(),
            Identity::Username(username) => tables
                .people
                .values()
                .find(|person| &person.username == username)
                .cloned(),
            Identity::Email(email) => tables
                .people
                .values()
                .find(|person| &person.email == email)
                .cloned(),
        };
        Ok(found)
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryTransaction { guard, staged }))
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.applications.get(&id).cloned())
    }

    async fn compare_and_set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        expected_version: i64,
    ) -> Result<StatusWrite, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(record) = tables.applications.get_mut(&id) else {
            return Ok(StatusWrite::Missing);
        };
        if record.version != expected_version {
            return Ok(StatusWrite::VersionMismatch {
                current: record.version,
            });
        }

        record.status = status;
        record.version = expected_version + 1;
        Ok(StatusWrite::Applied {
            version: record.version,
        })
    }

    async fn application_snapshot(
        &self,
        only: Option<ApplicationId>,
    ) -> Result<ApplicationSnapshot, StoreError> {
        let tables = self.tables.lock().await;

        let mut applications = Vec::new();
        for record in tables.applications.values() {
            if only.is_some_and(|id| id != record.id) {
                continue;
            }
            // Mirrors the inner join on person.
            let Some(person) = tables.people.get(&record.person_id) else {
                continue;
            };
            applications.push(ApplicationRow {
                record: record.clone(),
                name: person.name.clone(),
                surname: person.surname.clone(),
            });
        }

        let applicants: BTreeSet<PersonId> = applications
            .iter()
            .map(|row| row.record.person_id)
            .collect();
        let profiles: Vec<ProfileRow> = tables
            .profiles
            .iter()
            .filter(|row| applicants.contains(&row.person_id))
            .cloned()
            .collect();

        let competences: BTreeSet<CompetenceId> =
            profiles.iter().map(|row| row.competence_id).collect();
        let translations = competences
            .iter()
            .flat_map(|id| {
                tables
                    .competences
                    .get(id)
                    .into_iter()
                    .flatten()
                    .map(move |translation| TranslationRow {
                        competence_id: *id,
                        language: translation.language.clone(),
                        translation: translation.translation.clone(),
                    })
            })
            .collect();

        Ok(ApplicationSnapshot {
            applications,
            profiles,
            translations,
        })
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn update_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<u64, StoreError> {
        let mut updated = 0;
        for row in self
            .staged
            .profiles
            .iter_mut()
            .filter(|row| row.person_id == person && row.competence_id == competence)
        {
            row.years_of_experience = years_of_experience;
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<(), StoreError> {
        self.staged.require_person(person)?;
        if !self.staged.competences.contains_key(&competence) {
            return Err(StoreError::Constraint(format!(
                "competence {competence} does not exist"
            )));
        }
        if years_of_experience < 0.0 {
            return Err(StoreError::Constraint(
                "years_of_experience must be non-negative".to_string(),
            ));
        }
        let duplicate = self
            .staged
            .profiles
            .iter()
            .any(|row| row.person_id == person && row.competence_id == competence);
        if duplicate {
            return Err(StoreError::Constraint(format!(
                "profile for person {person} and competence {competence} already exists"
            )));
        }

        self.staged.profiles.push(ProfileRow {
            person_id: person,
            competence_id: competence,
            years_of_experience,
        });
        Ok(())
    }

    async fn insert_availability(
        &mut self,
        person: PersonId,
        period: &AvailabilityPeriod,
    ) -> Result<ApplicationId, StoreError> {
        self.staged.require_person(person)?;
        if period.from_date > period.to_date {
            return Err(StoreError::Constraint(
                "from_date must not be after to_date".to_string(),
            ));
        }

        self.staged.last_application_id += 1;
        let id = ApplicationId(self.staged.last_application_id);
        self.staged.applications.insert(
            id,
            ApplicationRecord {
                id,
                person_id: person,
                period: *period,
                status: ApplicationStatus::Unset,
                version: 0,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTransaction { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
