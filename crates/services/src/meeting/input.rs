use bson::DateTime;
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use validator::Validate;

use crate::error::{MeetingError, MeetingResult};

pub const MAX_TITLE_LEN: u64 = 200;

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateMeetingInput {
    #[validate(length(min = 1))]
    pub title: String,
    pub description: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`.
    pub scheduled_for: Option<String>,
    pub max_participants: Option<u32>,
    pub passcode: Option<String>,
    pub is_private: Option<bool>,
}

/// Partial update. For nullable fields an explicit `null` clears the value,
/// an absent key leaves it untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MeetingPatch {
    #[validate(length(min = 1))]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub max_participants: Option<u32>,
    #[serde(default, deserialize_with = "double_option")]
    pub passcode: Option<Option<String>>,
    pub is_private: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_for: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinRequest {
    pub passcode: Option<String>,
    pub display_name: Option<String>,
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

pub(crate) fn validate<T: Validate>(input: &T) -> MeetingResult<()> {
    input
        .validate()
        .map_err(|e| MeetingError::InvalidInput(e.to_string()))
}

pub(crate) fn normalize_title(title: &str) -> MeetingResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(MeetingError::InvalidInput("title must not be empty".into()));
    }
    if trimmed.chars().count() as u64 > MAX_TITLE_LEN {
        return Err(MeetingError::InvalidInput(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn check_max_participants(max: u32, cap: u32) -> MeetingResult<u32> {
    if max == 0 || max > cap {
        return Err(MeetingError::InvalidInput(format!(
            "max_participants must be between 1 and {cap}"
        )));
    }
    Ok(max)
}

/// Parses an RFC 3339 timestamp, falling back to a bare date at midnight UTC.
pub(crate) fn parse_schedule(raw: &str) -> MeetingResult<DateTime> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_rfc3339_str(raw) {
        return Ok(at);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::from_chrono(naive.and_utc()))
        .ok_or_else(|| MeetingError::InvalidInput(format!("unparseable date: {raw}")))
}

/// A schedule must lie strictly in the future.
pub(crate) fn future_schedule(raw: &str, now: DateTime) -> MeetingResult<DateTime> {
    let at = parse_schedule(raw)?;
    if at <= now {
        return Err(MeetingError::InvalidInput(
            "scheduled date must be in the future".into(),
        ));
    }
    Ok(at)
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
