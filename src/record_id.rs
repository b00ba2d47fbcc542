//! Record identifiers derived from judgement filenames.
//!
//! A filename such as `CRLA1_2345_07-Jan-2023.pdf` carries a diary number in
//! its first two `_`-separated segments and the judgement date in its last.
//! The derived id is `<seg0><seg1>_<yyyy-mm-dd>`; the two diary segments are
//! concatenated without a separator, which existing records depend on.
use chrono::NaiveDate;

use crate::error::IngestError;

const INPUT_DATE_FORMAT: &str = "%d-%b-%Y";
const OUTPUT_DATE_FORMAT: &str = "%Y-%m-%d";
const EXTENSION_LEN: usize = 4;

/// Derive the unique record id for `filename`.
pub fn derive_record_id(filename: &str) -> Result<String, IngestError> {
    let segments: Vec<&str> = filename.split('_').collect();
    if segments.len() < 2 {
        return Err(IngestError::malformed_filename(
            filename,
            "expected at least two '_'-separated segments",
        ));
    }
    let diary_no = format!("{}{}", segments[0], segments[1]);

    let last = segments[segments.len() - 1];
    let date = format_date(strip_extension(last).ok_or_else(|| {
        IngestError::malformed_filename(filename, "date segment shorter than its extension")
    })?)
    .map_err(|reason| IngestError::malformed_filename(filename, reason))?;

    Ok(format!("{diary_no}_{date}"))
}

/// Drop the trailing extension (4 chars, normally `.pdf`).
fn strip_extension(segment: &str) -> Option<&str> {
    let count = segment.chars().count();
    if count < EXTENSION_LEN {
        return None;
    }
    let cut = segment
        .char_indices()
        .nth(count - EXTENSION_LEN)
        .map(|(idx, _)| idx)
        .unwrap_or(segment.len());
    Some(&segment[..cut])
}

/// `07-Jan-2023` -> `2023-01-07`.
pub fn format_date(raw: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(raw, INPUT_DATE_FORMAT)
        .map(|d| d.format(OUTPUT_DATE_FORMAT).to_string())
        .map_err(|e| format!("invalid date {raw:?}: {e}"))
}
