use chrono::NaiveDate;

use super::domain::{ApplicationId, ApplicationSubmission, Identity};

/// Input rejected before any write is attempted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} needs to have non-zero length")]
    Empty { field: &'static str },
    #[error("{field} needs to only contain letters and numbers")]
    NotAlphanumeric { field: &'static str },
    #[error("{field} needs to be a valid email address")]
    InvalidEmail { field: &'static str },
    #[error("{field} needs to be a positive integer")]
    NotPositive { field: &'static str },
    #[error("{field} needs to be a non-negative number")]
    Negative { field: &'static str },
    #[error("to_date ({to}) cannot be before from_date ({from})")]
    PeriodReversed { from: NaiveDate, to: NaiveDate },
    #[error("an application needs at least one availability period")]
    NoPeriods,
}

pub(crate) fn validate_identity(identity: &Identity) -> Result<(), ValidationError> {
    match identity {
        Identity::Username(username) => validate_username(username),
        Identity::Email(email) => validate_email(email),
        Identity::Person(id) if id.0 > 0 => Ok(()),
        Identity::Person(_) => Err(ValidationError::NotPositive { field: "person_id" }),
    }
}

pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Empty { field: "username" });
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::NotAlphanumeric { field: "username" });
    }
    Ok(())
}

pub(crate) fn validate_email(email: &str) -> Result<(), ValidationError> {
    const LOCAL_SPECIALS: &str = ".!#$%&'*+/=?^_`{|}~-";

    let invalid = ValidationError::InvalidEmail { field: "email" };
    let Some((local, domain)) = email.split_once('@') else {
        return Err(invalid);
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOCAL_SPECIALS.contains(c));
    let domain_ok = domain.split('.').all(|label| {
        !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });

    if local_ok && domain_ok {
        Ok(())
    } else {
        Err(invalid)
    }
}

pub(crate) fn validate_submission(submission: &ApplicationSubmission) -> Result<(), ValidationError> {
    for entry in &submission.competencies {
        if entry.competence_id.0 <= 0 {
            return Err(ValidationError::NotPositive {
                field: "competence_id",
            });
        }
        if !entry.years_of_experience.is_finite() || entry.years_of_experience < 0.0 {
            return Err(ValidationError::Negative {
                field: "years_of_experience",
            });
        }
    }

    if submission.periods.is_empty() {
        return Err(ValidationError::NoPeriods);
    }
    for period in &submission.periods {
        if period.from_date > period.to_date {
            return Err(ValidationError::PeriodReversed {
                from: period.from_date,
                to: period.to_date,
            });
        }
    }

    Ok(())
}

pub(crate) fn validate_application_id(id: ApplicationId) -> Result<(), ValidationError> {
    if id.0 > 0 {
        Ok(())
    } else {
        Err(ValidationError::NotPositive {
            field: "availability_id",
        })
    }
}

pub(crate) fn validate_version(version: i64) -> Result<(), ValidationError> {
    if version >= 0 {
        Ok(())
    } else {
        Err(ValidationError::Negative {
            field: "version_number",
        })
    }
}
