//! # SIMBAD catalog lookup
//!
//! Star identifiers are resolved with the SIMBAD script interface. The script asks for the
//! ICRS coordinates of one object as a single `RA;DEC` line:
//!
//! ```text
//! ::data::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::
//!
//! 03 49 25.1738;+40 28 40.574
//! ```
//!
//! An unknown identifier makes SIMBAD answer with an `::error::` block instead, reported as
//! [`SnrFetchError::StarNotFound`].
use regex::Regex;
use tracing::debug;

use super::{CatalogEntry, CatalogLookup};
use crate::{constants::SIMBAD_SCRIPT_URL, env_state::FetchEnv, snrfetch_errors::SnrFetchError};

/// Star coordinates from the SIMBAD script interface.
#[derive(Debug, Clone)]
pub struct SimbadCatalog {
    env: FetchEnv,
    url: String,
    data_regex: Regex,
}

impl SimbadCatalog {
    pub fn new(env: FetchEnv) -> Result<Self, SnrFetchError> {
        Self::with_url(env, SIMBAD_SCRIPT_URL)
    }

    /// Same as [`SimbadCatalog::new`] against another SIMBAD mirror.
    pub fn with_url(env: FetchEnv, url: &str) -> Result<Self, SnrFetchError> {
        Ok(SimbadCatalog {
            env,
            url: url.to_string(),
            // "%COO(A);%COO(D)" → "03 49 25.1738;+40 28 40.574"
            data_regex: Regex::new(r"(?m)^\s*(\d{1,2}[ :]\d{1,2}(?:[ :][\d.]+)?)\s*;\s*([+-]?\d{1,2}[ :]\d{1,2}(?:[ :][\d.]+)?)\s*$")?,
        })
    }
}

/// Script sent to SIMBAD: one line of sexagesimal coordinates for `star`.
fn simbad_script(star: &str) -> String {
    format!(
        "output console=off script=off\n\
         format object \"%COO(A);%COO(D)\"\n\
         query id {star}\n"
    )
}

/// Extract the coordinates from the raw SIMBAD script response.
///
/// Argument
/// --------
/// * `star`: the queried identifier, used in the error
/// * `response`: the raw text returned by SIMBAD
/// * `data_regex`: the pattern of the coordinate line
///
/// Return
/// ------
/// * the catalog entry, or [`SnrFetchError::StarNotFound`] if SIMBAD returned an error
///   block or no coordinate line
fn parse_simbad_response(
    star: &str,
    response: &str,
    data_regex: &Regex,
) -> Result<CatalogEntry, SnrFetchError> {
    if response.contains("::error::") {
        return Err(SnrFetchError::StarNotFound(star.to_string()));
    }

    let data = response
        .split_once("::data::")
        .map_or(response, |(_, data)| data);

    let captures = data_regex
        .captures(data)
        .ok_or_else(|| SnrFetchError::StarNotFound(star.to_string()))?;

    Ok(CatalogEntry {
        ra: captures[1].trim().to_string(),
        dec: captures[2].trim().to_string(),
    })
}

impl CatalogLookup for SimbadCatalog {
    async fn resolve(&self, star: &str) -> Result<CatalogEntry, SnrFetchError> {
        let script = simbad_script(star);
        let response = self
            .env
            .get_text(&self.url, &[("script", script.as_str())])
            .await?;
        let entry = parse_simbad_response(star, &response, &self.data_regex)?;
        debug!("SIMBAD: {star} at RA {} DEC {}", entry.ra, entry.dec);
        Ok(entry)
    }
}

#[cfg(test)]
mod simbad_test {
    use super::*;
    use crate::retry::RetryPolicy;
    use std::time::Duration;

    fn catalog() -> SimbadCatalog {
        let env = FetchEnv::new(Duration::from_secs(1), RetryPolicy::no_retry(), None).unwrap();
        SimbadCatalog::new(env).unwrap()
    }

    const FOUND: &str = "::script::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::\n\
\n\
output console=off script=off\n\
format object \"%COO(A);%COO(D)\"\n\
query id HIP17378\n\
\n\
::data::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::\n\
\n\
03 43 14.9013;-09 45 48.211\n";

    const NOT_FOUND: &str = "::script::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::\n\
\n\
query id HIP99999999\n\
\n\
::error:::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::::\n\
\n\
[3] Identifier not found in the database : HIP99999999\n";

    #[test]
    fn test_script() {
        let script = simbad_script("HIP17378");
        assert!(script.contains("format object \"%COO(A);%COO(D)\""));
        assert!(script.ends_with("query id HIP17378\n"));
    }

    #[test]
    fn test_parse_found() {
        let catalog = catalog();
        let entry = parse_simbad_response("HIP17378", FOUND, &catalog.data_regex).unwrap();
        assert_eq!(
            entry,
            CatalogEntry {
                ra: "03 43 14.9013".into(),
                dec: "-09 45 48.211".into()
            }
        );
        assert!(entry.position().is_ok());
    }

    #[test]
    fn test_parse_low_precision() {
        let catalog = catalog();
        let entry =
            parse_simbad_response("HIP1", "::data::\n\n12 30;+05 12\n", &catalog.data_regex)
                .unwrap();
        assert_eq!(entry.ra, "12 30");
        assert_eq!(entry.dec, "+05 12");
    }

    #[test]
    fn test_parse_not_found() {
        let catalog = catalog();
        assert_eq!(
            parse_simbad_response("HIP99999999", NOT_FOUND, &catalog.data_regex),
            Err(SnrFetchError::StarNotFound("HIP99999999".into()))
        );
        assert_eq!(
            parse_simbad_response("HIP1", "::data::\n\n", &catalog.data_regex),
            Err(SnrFetchError::StarNotFound("HIP1".into()))
        );
    }
}
