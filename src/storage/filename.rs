//! Blob file-name grammar.
//!
//! `<timestamp>-<random id>.blob`            committed, readable
//! `<timestamp>-<random id>.blob.tmp`        write in progress
//! `<timestamp>-<random id>.blob@<deadline>.lock`  leased until `<deadline>`
//!
//! Timestamps use `%Y-%m-%dT%H%M%S%.6fZ` (UTC, fixed width), so plain string
//! ordering of file names is chronological.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

pub(crate) const BLOB_EXT: &str = ".blob";
pub(crate) const TMP_EXT: &str = ".tmp";
pub(crate) const LOCK_EXT: &str = ".lock";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H%M%S%.6fZ";

pub(crate) fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// A fresh committed-form blob name for the given creation time.
pub(crate) fn unique_blob_name(created: DateTime<Utc>) -> String {
    format!(
        "{}-{}{}",
        format_timestamp(created),
        Uuid::new_v4().simple(),
        BLOB_EXT
    )
}

/// Creation timestamp encoded in a `.blob` or `.blob.tmp` name.
pub(crate) fn blob_timestamp(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(TMP_EXT).unwrap_or(file_name);
    let stem = stem.strip_suffix(BLOB_EXT)?;
    // The random id holds no '-', so the split before it is the timestamp.
    let (timestamp, _) = stem.rsplit_once('-')?;
    parse_timestamp(timestamp)
}

/// Lease deadline encoded in a `.lock` name.
pub(crate) fn lease_deadline(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = file_name.strip_suffix(LOCK_EXT)?;
    let (_, deadline) = stem.rsplit_once('@')?;
    parse_timestamp(deadline)
}

/// The committed (`.blob`) name with any `@<deadline>.lock` decoration
/// removed, so renewals never accumulate suffixes.
pub(crate) fn strip_lease(file_name: &str) -> &str {
    match file_name
        .strip_suffix(LOCK_EXT)
        .and_then(|stem| stem.rsplit_once('@'))
    {
        Some((committed, _)) => committed,
        None => file_name,
    }
}

/// Leased form of a committed name.
pub(crate) fn lease_name(committed: &str, deadline: DateTime<Utc>) -> String {
    format!("{committed}@{}{}", format_timestamp(deadline), LOCK_EXT)
}
