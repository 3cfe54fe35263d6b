use chrono::{DateTime, Local};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Local wall-clock time at second granularity, e.g. `20250314-093015`.
pub fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `{prefix}-{YYYYMMDD-HHMMSS}.png` for the current local time.
///
/// Two calls within the same second with the same prefix return the same
/// name. Callers that need strict uniqueness have to bring their own
/// disambiguator (e.g. put it in the prefix).
pub fn file_name(prefix: &str) -> String {
    file_name_at(prefix, &Local::now())
}

pub fn file_name_at(prefix: &str, at: &DateTime<Local>) -> String {
    format!("{prefix}-{}.png", at.format(TIMESTAMP_FORMAT))
}
