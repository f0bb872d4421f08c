use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Primary key of a person row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub i64);

/// Primary key of a competence (job skill category).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompetenceId(pub i64);

/// Primary key of an availability row; one row is one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CompetenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role classification stored on the person row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Recruiter,
    Applicant,
}

impl Role {
    pub const fn role_id(self) -> i64 {
        match self {
            Role::Recruiter => 1,
            Role::Applicant => 2,
        }
    }

    pub const fn from_role_id(role_id: i64) -> Option<Self> {
        match role_id {
            1 => Some(Role::Recruiter),
            2 => Some(Role::Applicant),
            _ => None,
        }
    }
}

/// Identity record as seen by the application workflow. Credentials stay with the auth layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub surname: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}

/// Fields needed to seed a person row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPerson {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub username: String,
    pub role: Role,
}

/// Caller identity handed over by the authentication layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Username(String),
    Email(String),
    Person(PersonId),
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Username(username) => write!(f, "username:{username}"),
            Identity::Email(email) => write!(f, "email:{email}"),
            Identity::Person(id) => write!(f, "person:{id}"),
        }
    }
}

/// Localized name of a competence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetenceTranslation {
    pub language: String,
    pub translation: String,
}

/// Claimed experience in one competence, as submitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompetenceEntry {
    pub competence_id: CompetenceId,
    pub years_of_experience: f64,
}

/// Inclusive availability window; every period becomes its own application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityPeriod {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
}

/// Everything an applicant submits in one go.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    #[serde(default)]
    pub competencies: Vec<CompetenceEntry>,
    #[serde(default)]
    pub periods: Vec<AvailabilityPeriod>,
}

/// Review state of an application. `Unset` is stored as NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Unset,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Unset => "unset",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "unset" => Some(ApplicationStatus::Unset),
            "accepted" => Some(ApplicationStatus::Accepted),
            "rejected" => Some(ApplicationStatus::Rejected),
            _ => None,
        }
    }

    /// Value written to the `application_status` column.
    pub const fn as_column(self) -> Option<&'static str> {
        match self {
            ApplicationStatus::Unset => None,
            other => Some(other.label()),
        }
    }

    pub fn from_column(value: Option<&str>) -> Option<Self> {
        match value {
            None => Some(ApplicationStatus::Unset),
            Some("accepted") => Some(ApplicationStatus::Accepted),
            Some("rejected") => Some(ApplicationStatus::Rejected),
            Some(_) => None,
        }
    }

    pub const fn is_decided(self) -> bool {
        !matches!(self, ApplicationStatus::Unset)
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stored availability row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub person_id: PersonId,
    pub period: AvailabilityPeriod,
    pub status: ApplicationStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(
            ApplicationStatus::parse(" Accepted "),
            Some(ApplicationStatus::Accepted)
        );
        assert_eq!(
            ApplicationStatus::parse("REJECTED"),
            Some(ApplicationStatus::Rejected)
        );
        assert_eq!(ApplicationStatus::parse("pending"), None);
    }

    #[test]
    fn unset_maps_to_null_column() {
        assert_eq!(ApplicationStatus::Unset.as_column(), None);
        assert_eq!(
            ApplicationStatus::from_column(None),
            Some(ApplicationStatus::Unset)
        );
        assert_eq!(
            ApplicationStatus::from_column(Some("accepted")),
            Some(ApplicationStatus::Accepted)
        );
        assert_eq!(ApplicationStatus::from_column(Some("maybe")), None);
    }

    #[test]
    fn role_ids_follow_seeded_roles() {
        assert_eq!(Role::from_role_id(1), Some(Role::Recruiter));
        assert_eq!(Role::from_role_id(Role::Applicant.role_id()), Some(Role::Applicant));
        assert_eq!(Role::from_role_id(9), None);
    }
}
