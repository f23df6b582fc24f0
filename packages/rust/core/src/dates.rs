//! Effective dates for ordering notes on the home page.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Date of a note, from its file name when possible, else its mtime.
///
/// In priority order:
/// 1. a `YYYYMMDDHHMMSS` prefix (org-roam's default file naming)
/// 2. a four-digit year right before the extension, as June 1 of that year
/// 3. the file's modification time
pub fn effective_date(path: &Path) -> Option<DateTime<Utc>> {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(date_from_file_name)
        .or_else(|| modified_time(path))
}

/// Date encoded in a file name, if any.
pub fn date_from_file_name(name: &str) -> Option<DateTime<Utc>> {
    static YEAR_SUFFIX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(\d{4})\.[^.]+$").expect("valid regex"));

    if let Some(prefix) = name.get(..14) {
        if prefix.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(naive) = NaiveDateTime::parse_from_str(prefix, "%Y%m%d%H%M%S") {
                return Some(naive.and_utc());
            }
        }
    }

    let year: i32 = YEAR_SUFFIX_RE.captures(name)?[1].parse().ok()?;
    Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).single()
}

fn modified_time(path: &Path) -> Option<DateTime<Utc>> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified))
}
