use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationStatus, CompetenceId, CompetenceTranslation, PersonId,
};
use super::store::{ApplicationSnapshot, ApplicationStore, ProfileRow, StoreError};

/// Denormalized application as shown to recruiters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub application_status: ApplicationStatus,
    pub version_number: i64,
    pub applicant: ApplicantView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicantView {
    pub person_id: PersonId,
    pub name: String,
    pub surname: String,
    pub competence_profiles: Vec<CompetenceProfileView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetenceProfileView {
    pub competence_id: CompetenceId,
    pub years_of_experience: f64,
    pub translations: Vec<CompetenceTranslation>,
}

/// Read-only assembly of application views from committed rows.
pub struct ApplicationAggregator<S> {
    store: Arc<S>,
}

impl<S> ApplicationAggregator<S>
where
    S: ApplicationStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<ApplicationView>, StoreError> {
        let snapshot = self.store.application_snapshot(None).await?;
        Ok(assemble(snapshot))
    }

    pub async fn get(&self, id: ApplicationId) -> Result<Option<ApplicationView>, StoreError> {
        let snapshot = self.store.application_snapshot(Some(id)).await?;
        Ok(assemble(snapshot).into_iter().next())
    }
}

fn assemble(snapshot: ApplicationSnapshot) -> Vec<ApplicationView> {
    let ApplicationSnapshot {
        mut applications,
        profiles,
        translations,
    } = snapshot;

    let mut names: BTreeMap<CompetenceId, Vec<CompetenceTranslation>> = BTreeMap::new();
    for row in translations {
        names.entry(row.competence_id).or_default().push(CompetenceTranslation {
            language: row.language,
            translation: row.translation,
        });
    }

    let mut by_person: BTreeMap<PersonId, Vec<ProfileRow>> = BTreeMap::new();
    for row in profiles {
        by_person.entry(row.person_id).or_default().push(row);
    }

    applications.sort_by_key(|row| row.record.id);
    applications
        .into_iter()
        .map(|row| {
            let competence_profiles = by_person
                .get(&row.record.person_id)
                .map(|rows| {
                    rows.iter()
                        .map(|profile| CompetenceProfileView {
                            competence_id: profile.competence_id,
                            years_of_experience: profile.years_of_experience,
                            translations: names
                                .get(&profile.competence_id)
                                .cloned()
                                .unwrap_or_default(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            ApplicationView {
                application_id: row.record.id,
                from_date: row.record.period.from_date,
                to_date: row.record.period.to_date,
                created_at: row.record.created_at,
                application_status: row.record.status,
                version_number: row.record.version,
                applicant: ApplicantView {
                    person_id: row.record.person_id,
                    name: row.name,
                    surname: row.surname,
                    competence_profiles,
                },
            }
        })
        .collect()
}
