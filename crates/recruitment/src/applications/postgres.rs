//! Postgres implementation of the application store.
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`) so building the crate never
//! needs a live database.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, AvailabilityPeriod, CompetenceId,
    Identity, Person, PersonId, Role,
};
use super::store::{
    ApplicationRow, ApplicationSnapshot, ApplicationStore, ProfileRow, StatusWrite, StoreError,
    StoreTransaction, TranslationRow,
};
use crate::config::DatabaseConfig;

type PersonTuple = (i64, String, String, String, String, i64);
type ApplicationTuple = (
    i64,
    i64,
    NaiveDate,
    NaiveDate,
    Option<String>,
    i64,
    DateTime<Utc>,
);
type ApplicationRowTuple = (
    i64,
    i64,
    NaiveDate,
    NaiveDate,
    Option<String>,
    i64,
    DateTime<Utc>,
    String,
    String,
);

/// Postgres-backed store wrapping a connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds a pool whose acquire and statement timeouts come from configuration, so a stuck
    /// database surfaces as [`StoreError::Timeout`] instead of a hung request.
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let options = PgConnectOptions::from_str(url)?.options([(
            "statement_timeout",
            config.statement_timeout.as_millis().to_string(),
        )]);
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|err| StoreError::Unavailable(format!("migration failed: {err}")))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn person_from_tuple(row: PersonTuple) -> Result<Person, StoreError> {
    let (id, name, surname, email, username, role_id) = row;
    let role = Role::from_role_id(role_id)
        .ok_or_else(|| StoreError::Decode(format!("unknown role_id {role_id}")))?;
    Ok(Person {
        id: PersonId(id),
        name,
        surname,
        email,
        username,
        role,
    })
}

fn decode_status(value: Option<&str>) -> Result<ApplicationStatus, StoreError> {
    ApplicationStatus::from_column(value).ok_or_else(|| {
        StoreError::Decode(format!(
            "application_status '{}'",
            value.unwrap_or_default()
        ))
    })
}

fn record_from_tuple(row: ApplicationTuple) -> Result<ApplicationRecord, StoreError> {
    let (id, person_id, from_date, to_date, status, version, created_at) = row;
    Ok(ApplicationRecord {
        id: ApplicationId(id),
        person_id: PersonId(person_id),
        period: AvailabilityPeriod { from_date, to_date },
        status: decode_status(status.as_deref())?,
        version,
        created_at,
    })
}

#[async_trait]
impl ApplicationStore for PgStore {
    async fn find_person(&self, identity: &Identity) -> Result<Option<Person>, StoreError> {
        const BY_ID: &str = "SELECT person_id, name, surname, email, username, role_id \
                             FROM person WHERE person_id = $1";
        const BY_USERNAME: &str = "SELECT person_id, name, surname, email, username, role_id \
                                   FROM person WHERE username = $1";
        const BY_EMAIL: &str = "SELECT person_id, name, surname, email, username, role_id \
                                FROM person WHERE email = $1";

        let query = match identity {
            Identity::Person(id) => sqlx::query_as::<_, PersonTuple>(BY_ID).bind(id.0),
            Identity::Username(username) => {
                sqlx::query_as::<_, PersonTuple>(BY_USERNAME).bind(username.as_str())
            }
            Identity::Email(email) => {
                sqlx::query_as::<_, PersonTuple>(BY_EMAIL).bind(email.as_str())
            }
        };

        let row = query.fetch_optional(&self.pool).await?;
        row.map(person_from_tuple).transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn fetch_application(
        &self,
        id: ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let row = sqlx::query_as::<_, ApplicationTuple>(
            r#"
            SELECT availability_id, person_id, from_date, to_date,
                   application_status, version_number, created_at
            FROM availability
            WHERE availability_id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_tuple).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
        expected_version: i64,
    ) -> Result<StatusWrite, StoreError> {
        // The version guard lives in the WHERE clause; row-level locking makes the
        // comparison and the increment one atomic step.
        let applied = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE availability
            SET application_status = $2,
                version_number = version_number + 1
            WHERE availability_id = $1
              AND version_number = $3
            RETURNING version_number
            "#,
        )
        .bind(id.0)
        .bind(status.as_column())
        .bind(expected_version)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(version) = applied {
            return Ok(StatusWrite::Applied { version });
        }

        let current = sqlx::query_scalar::<_, i64>(
            "SELECT version_number FROM availability WHERE availability_id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match current {
            Some(current) => StatusWrite::VersionMismatch { current },
            None => StatusWrite::Missing,
        })
    }

    async fn application_snapshot(
        &self,
        only: Option<ApplicationId>,
    ) -> Result<ApplicationSnapshot, StoreError> {
        let only = only.map(|id| id.0);
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let application_rows = sqlx::query_as::<_, ApplicationRowTuple>(
            r#"
            SELECT a.availability_id, a.person_id, a.from_date, a.to_date,
                   a.application_status, a.version_number, a.created_at,
                   p.name, p.surname
            FROM availability a
            JOIN person p ON p.person_id = a.person_id
            WHERE ($1::BIGINT IS NULL OR a.availability_id = $1)
            ORDER BY a.availability_id
            "#,
        )
        .bind(only)
        .fetch_all(&mut *tx)
        .await?;

        let profile_rows = sqlx::query_as::<_, (i64, i64, f64)>(
            r#"
            SELECT cp.person_id, cp.competence_id, cp.years_of_experience
            FROM competence_profile cp
            WHERE cp.person_id IN (
                SELECT a.person_id FROM availability a
                WHERE ($1::BIGINT IS NULL OR a.availability_id = $1)
            )
            ORDER BY cp.person_id, cp.competence_id
            "#,
        )
        .bind(only)
        .fetch_all(&mut *tx)
        .await?;

        let translation_rows = sqlx::query_as::<_, (i64, String, String)>(
            r#"
            SELECT ct.competence_id, ct.language, ct.translation
            FROM competence_translation ct
            WHERE ct.competence_id IN (
                SELECT cp.competence_id FROM competence_profile cp
                WHERE cp.person_id IN (
                    SELECT a.person_id FROM availability a
                    WHERE ($1::BIGINT IS NULL OR a.availability_id = $1)
                )
            )
            ORDER BY ct.competence_id, ct.translation_id
            "#,
        )
        .bind(only)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut applications = Vec::with_capacity(application_rows.len());
        for (id, person_id, from_date, to_date, status, version, created_at, name, surname) in
            application_rows
        {
            let record =
                record_from_tuple((id, person_id, from_date, to_date, status, version, created_at))?;
            applications.push(ApplicationRow {
                record,
                name,
                surname,
            });
        }

        let profiles = profile_rows
            .into_iter()
            .map(|(person_id, competence_id, years_of_experience)| ProfileRow {
                person_id: PersonId(person_id),
                competence_id: CompetenceId(competence_id),
                years_of_experience,
            })
            .collect();

        let translations = translation_rows
            .into_iter()
            .map(|(competence_id, language, translation)| TranslationRow {
                competence_id: CompetenceId(competence_id),
                language,
                translation,
            })
            .collect();

        Ok(ApplicationSnapshot {
            applications,
            profiles,
            translations,
        })
    }
}

struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn update_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE competence_profile
            SET years_of_experience = $3
            WHERE person_id = $1
              AND competence_id = $2
            "#,
        )
        .bind(person.0)
        .bind(competence.0)
        .bind(years_of_experience)
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_competence_profile(
        &mut self,
        person: PersonId,
        competence: CompetenceId,
        years_of_experience: f64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO competence_profile (person_id, competence_id, years_of_experience)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(person.0)
        .bind(competence.0)
        .bind(years_of_experience)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_availability(
        &mut self,
        person: PersonId,
        period: &AvailabilityPeriod,
    ) -> Result<ApplicationId, StoreError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO availability (person_id, from_date, to_date, application_status, version_number)
            VALUES ($1, $2, $3, NULL, 0)
            RETURNING availability_id
            "#,
        )
        .bind(person.0)
        .bind(period.from_date)
        .bind(period.to_date)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(ApplicationId(id))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        debug!("postgres transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        debug!("postgres transaction rolled back");
        Ok(())
    }
}
