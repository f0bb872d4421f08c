use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use recruitment::applications::{
    CompetenceId, CompetenceTranslation, MemoryStore, NewPerson, Person, Role, StoreError,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory store with a recruiter, an applicant, and a few translated competences.
pub(crate) struct SeededStore {
    pub(crate) store: MemoryStore,
    pub(crate) applicant: Person,
    pub(crate) recruiter: Person,
    pub(crate) competences: Vec<CompetenceId>,
}

const COMPETENCES: [(&str, &str); 3] = [
    ("ticket sales", "biljettförsäljning"),
    ("lotteries", "lotterier"),
    ("roller coaster operation", "karuselldrift"),
];

pub(crate) async fn seeded_memory_store() -> Result<SeededStore, StoreError> {
    let store = MemoryStore::new();

    let recruiter = store
        .add_person(NewPerson {
            name: "Joelle".to_string(),
            surname: "Wilkinson".to_string(),
            email: "joelle.wilkinson@example.com".to_string(),
            username: "JoelleWilkinson".to_string(),
            role: Role::Recruiter,
        })
        .await?;
    let applicant = store
        .add_person(NewPerson {
            name: "Leroy".to_string(),
            surname: "Crane".to_string(),
            email: "l.crane@example.com".to_string(),
            username: "LeroyCrane".to_string(),
            role: Role::Applicant,
        })
        .await?;

    let mut competences = Vec::with_capacity(COMPETENCES.len());
    for (english, swedish) in COMPETENCES {
        let id = store
            .add_competence(vec![
                CompetenceTranslation {
                    language: "en".to_string(),
                    translation: english.to_string(),
                },
                CompetenceTranslation {
                    language: "sv".to_string(),
                    translation: swedish.to_string(),
                },
            ])
            .await;
        competences.push(id);
    }

    Ok(SeededStore {
        store,
        applicant,
        recruiter,
        competences,
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
