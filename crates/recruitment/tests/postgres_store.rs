//! Store behavior against a live Postgres. Skipped unless `RECRUITMENT_TEST_DATABASE_URL`
//! points at a database the tests may migrate and write to.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use recruitment::applications::{
    ApplicationService, ApplicationStatus, ApplicationStore, ApplicationSubmission,
    AvailabilityPeriod, CompetenceEntry, CompetenceId, Identity, PersonId, PgStore, ReviewPolicy,
    StatusUpdateError, StoreError, SubmissionError,
};
use recruitment::config::DatabaseConfig;

struct Seed {
    username: String,
    person_id: i64,
    competence: CompetenceId,
}

async fn store() -> Option<PgStore> {
    let url = std::env::var("RECRUITMENT_TEST_DATABASE_URL").ok()?;
    let config = DatabaseConfig {
        url: Some(url.clone()),
        max_connections: 8,
        acquire_timeout: Duration::from_secs(5),
        statement_timeout: Duration::from_secs(5),
    };
    let store = PgStore::connect(&url, &config)
        .await
        .expect("test database reachable");
    store.migrate().await.expect("migrations apply");
    Some(store)
}

async fn seed(store: &PgStore) -> Seed {
    let suffix = Utc::now()
        .timestamp_nanos_opt()
        .expect("timestamp in range");
    let username = format!("applicant{suffix}");

    let person_id: i64 = sqlx::query_scalar(
        "INSERT INTO person (name, surname, email, username, role_id) \
         VALUES ('Lo', 'Ek', $1, $2, 2) RETURNING person_id",
    )
    .bind(format!("{username}@example.se"))
    .bind(&username)
    .fetch_one(store.pool())
    .await
    .expect("person seeded");

    let competence: i64 =
        sqlx::query_scalar("INSERT INTO competence DEFAULT VALUES RETURNING competence_id")
            .fetch_one(store.pool())
            .await
            .expect("competence seeded");
    sqlx::query(
        "INSERT INTO competence_translation (competence_id, language, translation) \
         VALUES ($1, 'en', 'ticket sales'), ($1, 'sv', 'biljettförsäljning')",
    )
    .bind(competence)
    .execute(store.pool())
    .await
    .expect("translations seeded");

    Seed {
        username,
        person_id,
        competence: CompetenceId(competence),
    }
}

fn january(competence: CompetenceId, years: f64) -> ApplicationSubmission {
    ApplicationSubmission {
        competencies: vec![CompetenceEntry {
            competence_id: competence,
            years_of_experience: years,
        }],
        periods: vec![AvailabilityPeriod {
            from_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
            to_date: NaiveDate::from_ymd_opt(2024, 2, 1).expect("valid date"),
        }],
    }
}

async fn count(store: &PgStore, sql: &str, person_id: i64) -> i64 {
    sqlx::query_scalar(sql)
        .bind(person_id)
        .fetch_one(store.pool())
        .await
        .expect("count query")
}

#[tokio::test]
async fn submission_review_and_conflict_round_trip() {
    let Some(store) = store().await else {
        return;
    };
    let seed = seed(&store).await;
    let store = Arc::new(store);
    let service = ApplicationService::new(Arc::clone(&store), ReviewPolicy::default());
    let identity = Identity::Username(seed.username.clone());

    service
        .submit(&identity, &january(seed.competence, 2.0))
        .await
        .expect("first submission");
    let receipt = service
        .submit(&identity, &january(seed.competence, 3.0))
        .await
        .expect("resubmission upserts");
    assert_eq!(receipt.profiles_updated, 1);

    let profiles = count(
        &store,
        "SELECT COUNT(*) FROM competence_profile WHERE person_id = $1",
        seed.person_id,
    )
    .await;
    assert_eq!(profiles, 1);

    let id = receipt.applications[0];
    let view = service.get(id).await.expect("lookup").expect("present");
    assert_eq!(view.application_status, ApplicationStatus::Unset);
    assert_eq!(view.applicant.competence_profiles[0].years_of_experience, 3.0);
    assert_eq!(view.applicant.competence_profiles[0].translations.len(), 2);

    let accepted = service
        .update_status(id, "accepted", 0)
        .await
        .expect("first review");
    assert_eq!(accepted.version_number, 1);

    let stale = service
        .update_status(id, "rejected", 0)
        .await
        .expect_err("stale version");
    assert!(matches!(stale, StatusUpdateError::Conflict { current: 1, .. }));

    let record = store
        .fetch_application(id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(record.status, ApplicationStatus::Accepted);
    assert_eq!(record.version, 1);
}

#[tokio::test]
async fn foreign_key_failure_rolls_back_every_row() {
    let Some(store) = store().await else {
        return;
    };
    let seed = seed(&store).await;
    let store = Arc::new(store);
    let service = ApplicationService::new(Arc::clone(&store), ReviewPolicy::default());

    let mut submission = january(seed.competence, 1.0);
    submission.competencies.push(CompetenceEntry {
        competence_id: CompetenceId(i64::MAX),
        years_of_experience: 1.0,
    });

    let err = service
        .submit(&Identity::Person(PersonId(seed.person_id)), &submission)
        .await
        .expect_err("unknown competence");
    assert!(matches!(
        err,
        SubmissionError::Failed(StoreError::Constraint(_))
    ));

    let profiles = count(
        &store,
        "SELECT COUNT(*) FROM competence_profile WHERE person_id = $1",
        seed.person_id,
    )
    .await;
    let applications = count(
        &store,
        "SELECT COUNT(*) FROM availability WHERE person_id = $1",
        seed.person_id,
    )
    .await;
    assert_eq!(profiles, 0);
    assert_eq!(applications, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_reviews_commit_exactly_once() {
    let Some(store) = store().await else {
        return;
    };
    let seed = seed(&store).await;
    let service = Arc::new(ApplicationService::new(
        Arc::new(store),
        ReviewPolicy::default(),
    ));
    let id = service
        .submit(
            &Identity::Username(seed.username.clone()),
            &january(seed.competence, 1.0),
        )
        .await
        .expect("submission")
        .applications[0];

    let mut handles = Vec::new();
    for status in ["accepted", "rejected", "accepted", "rejected", "accepted"] {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service.update_status(id, status, 0).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.expect("task joined") {
            Ok(receipt) => {
                assert_eq!(receipt.version_number, 1);
                winners += 1;
            }
            Err(StatusUpdateError::Conflict { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners, 1);
}
