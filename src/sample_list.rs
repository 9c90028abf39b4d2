//! # Sample list
//!
//! The stars of a campaign come from a CSV file with one header row whose first column
//! holds Hipparcos numbers:
//!
//! ```text
//! HIP,Teff,logg,[Fe/H]
//! 1499,5724,4.44,0.20
//! 3311,...
//! ```
//!
//! Each number becomes the star identifier `HIP<number>`. A value already carrying the
//! `HIP` prefix is accepted as well. Unreadable rows are logged and skipped.
use camino::Utf8Path;
use regex::Regex;
use tracing::{info, warn};

use crate::{constants::StarId, snrfetch_errors::SnrFetchError};

/// Selection applied to the rows of a sample list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSelection {
    /// Number of stars skipped at the start of the list
    pub start: usize,
    /// Stars never processed, e.g. known archive problems
    pub exclude: Vec<StarId>,
}

/// Read the star identifiers of a sample list file.
///
/// Arguments
/// -----------------
/// * `path`: the CSV file
/// * `selection`: start offset and excluded stars
///
/// Return
/// ----------
/// * The star identifiers in file order, or [`SnrFetchError::InvalidSampleList`] if the
///   file cannot be read as CSV.
pub fn load_sample_list(
    path: &Utf8Path,
    selection: &SampleSelection,
) -> Result<Vec<StarId>, SnrFetchError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| SnrFetchError::InvalidSampleList(format!("{path}: {err}")))?;
    let stars = parse_sample_list(&content, selection)?;
    info!("{} stars loaded from {path}", stars.len());
    Ok(stars)
}

/// Same as [`load_sample_list`] on the content of the file.
pub fn parse_sample_list(
    content: &str,
    selection: &SampleSelection,
) -> Result<Vec<StarId>, SnrFetchError> {
    let hip_regex = Regex::new(r"^(?i:HIP)?\s*(\d+)$")?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut stars = Vec::new();
    for (line, row) in reader.records().enumerate() {
        // header is line 1
        let line = line + 2;
        let row = row.map_err(|err| SnrFetchError::InvalidSampleList(err.to_string()))?;

        let Some(first) = row.get(0).filter(|v| !v.is_empty()) else {
            warn!("Sample list line {line}: empty first column, skipped");
            continue;
        };

        match hip_regex.captures(first) {
            Some(caps) => stars.push(format!("HIP{}", &caps[1])),
            None => warn!("Sample list line {line}: {first:?} is not a Hipparcos number, skipped"),
        }
    }

    Ok(stars
        .into_iter()
        .skip(selection.start)
        .filter(|star| !selection.exclude.contains(star))
        .collect())
}
