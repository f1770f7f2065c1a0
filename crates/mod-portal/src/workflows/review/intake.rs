use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::ApplicationSubmission;
use super::error::ReviewError;

const MIN_AGE: u8 = 1;
const MAX_AGE: u8 = 120;
const MAX_CHARACTER_LEVEL: u16 = 9999;

/// Public intake switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationSettings {
    pub applications_enabled: bool,
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationSettings {
    pub fn new(applications_enabled: bool) -> Self {
        Self {
            applications_enabled,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }
}

/// Checks a submission before it is stored.
pub fn validate_submission(submission: &ApplicationSubmission) -> Result<(), ReviewError> {
    let required = [
        ("name", &submission.name),
        ("discord_handle", &submission.discord_handle),
        ("ingame_name", &submission.ingame_name),
        ("server", &submission.server),
    ];
    if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
        return Err(ReviewError::Validation(format!("{field} is required")));
    }

    if let Some(email) = &submission.email {
        let email = email.trim();
        if !email.is_empty() && !email.contains('@') {
            return Err(ReviewError::Validation(format!(
                "'{email}' is not a valid email address"
            )));
        }
    }

    if !(MIN_AGE..=MAX_AGE).contains(&submission.age) {
        return Err(ReviewError::Validation(format!(
            "age must be between {MIN_AGE} and {MAX_AGE}"
        )));
    }

    if let Some(level) = submission.highest_character_level {
        if !(1..=MAX_CHARACTER_LEVEL).contains(&level) {
            return Err(ReviewError::Validation(format!(
                "highest_character_level must be between 1 and {MAX_CHARACTER_LEVEL}"
            )));
        }
    }

    Ok(())
}
