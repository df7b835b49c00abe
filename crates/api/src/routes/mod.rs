pub mod hooks;
pub mod meeting;
pub mod participant;
pub mod recording;

use bson::DateTime;

pub(crate) fn timestamp(at: DateTime) -> String {
    at.try_to_rfc3339_string()
        .unwrap_or_else(|_| at.timestamp_millis().to_string())
}

pub(crate) fn opt_timestamp(at: Option<DateTime>) -> Option<String> {
    at.map(timestamp)
}
