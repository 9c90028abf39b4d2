//! # ESO Phase 3 archive query
//!
//! Spectra are looked up in the `ivoa.ObsCore` table of the ESO TAP service with one
//! synchronous ADQL query per star. The query selects the products whose position falls
//! in a cone around the catalog coordinates of the star, as the archive web form does
//! after resolving a target name. Observers label their targets freely (`HD 10700`,
//! `tau Cet`, ...), so `target_name` is only searched when no position is known.
//!
//! The answer comes as CSV:
//!
//! ```text
//! dp_id,t_min,snr,s_ra,s_dec,em_res_power
//! ADP.2014-09-17T11:20:52.760,55260.13385,112.3,101.28715,-16.71612,115000
//! ```
//!
//! Each row becomes an [`ObservationRecord`]. A missing or unreadable column leaves the
//! corresponding field empty instead of rejecting the row: the candidate filter decides
//! how to deal with it.
use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{ArchiveQuery, ConeSearch};
use crate::{
    constants::ESO_TAP_URL, env_state::FetchEnv, observations::ObservationRecord,
    snrfetch_errors::SnrFetchError, time::mjd_to_iso,
};

/// Spectra of a star from the ESO TAP service.
#[derive(Debug, Clone)]
pub struct EsoTapArchive {
    env: FetchEnv,
    url: String,
}

impl EsoTapArchive {
    pub fn new(env: FetchEnv) -> Self {
        Self::with_url(env, ESO_TAP_URL)
    }

    pub fn with_url(env: FetchEnv, url: &str) -> Self {
        EsoTapArchive {
            env,
            url: url.to_string(),
        }
    }
}

/// Quote a string literal for ADQL.
fn adql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// ADQL constraint selecting the products inside `cone`.
fn cone_constraint(cone: &ConeSearch) -> String {
    format!(
        "CONTAINS(POINT('ICRS', s_ra, s_dec), CIRCLE('ICRS', {:.7}, {:.7}, {:.7})) = 1",
        cone.center.ra, cone.center.dec, cone.radius
    )
}

/// Build the ADQL query listing every spectrum taken with `instruments`.
///
/// Arguments
/// -----------------
/// * `star`: the star identifier, matched against `target_name` when `cone` is `None`
/// * `cone`: the searched region around the catalog position
/// * `instruments`: the accepted instruments, an empty list does not restrict them
fn build_query(star: &str, cone: Option<&ConeSearch>, instruments: &[String]) -> String {
    let location = match cone {
        Some(cone) => cone_constraint(cone),
        None => format!("target_name = {}", adql_literal(star)),
    };
    let mut query = format!(
        "SELECT dp_id, t_min, snr, s_ra, s_dec, em_res_power \
         FROM ivoa.ObsCore \
         WHERE dataproduct_type = 'spectrum' AND {location}"
    );
    if !instruments.is_empty() {
        let list = instruments.iter().map(|i| adql_literal(i)).join(", ");
        query.push_str(&format!(" AND instrument_name IN ({list})"));
    }
    query
}

/// One CSV row as delivered by the TAP service, before any interpretation.
#[derive(Debug, Deserialize)]
struct TapRow {
    dp_id: String,
    #[serde(default)]
    t_min: Option<String>,
    #[serde(default)]
    snr: Option<String>,
    #[serde(default)]
    s_ra: Option<String>,
    #[serde(default)]
    s_dec: Option<String>,
    #[serde(default)]
    em_res_power: Option<String>,
}

fn lenient_f64(field: Option<&String>) -> Option<f64> {
    field
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse::<f64>().ok())
}

impl From<TapRow> for ObservationRecord {
    fn from(row: TapRow) -> Self {
        ObservationRecord {
            arcfile: row.dp_id.trim().to_string(),
            date_obs: lenient_f64(row.t_min.as_ref())
                .filter(|mjd| mjd.is_finite())
                .map(mjd_to_iso),
            snr: lenient_f64(row.snr.as_ref()),
            ra: lenient_f64(row.s_ra.as_ref()),
            dec: lenient_f64(row.s_dec.as_ref()),
            resolution: lenient_f64(row.em_res_power.as_ref()),
        }
    }
}

/// Parse the CSV answer of the TAP service.
///
/// Rows without an archive identifier are dropped with a warning.
///
/// Argument
/// --------
/// * `csv_text`: the raw CSV body, header line included
///
/// Return
/// ------
/// * the raw observation records in archive order, or a CSV error if the header is unusable
fn parse_tap_csv(csv_text: &str) -> Result<Vec<ObservationRecord>, SnrFetchError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(csv_text.as_bytes());
    reader.headers()?;

    let mut records = Vec::new();
    for row in reader.deserialize::<TapRow>() {
        match row {
            Ok(row) if !row.dp_id.trim().is_empty() => records.push(row.into()),
            Ok(_) => warn!("TAP row without dp_id dropped"),
            Err(err) => warn!("Unreadable TAP row dropped: {err}"),
        }
    }
    Ok(records)
}

impl ArchiveQuery for EsoTapArchive {
    async fn query(
        &self,
        star: &str,
        cone: Option<ConeSearch>,
        instruments: &[String],
    ) -> Result<Vec<ObservationRecord>, SnrFetchError> {
        if cone.is_none() {
            warn!("{star}: no catalog position, searching the archive by target name");
        }
        let adql = build_query(star, cone.as_ref(), instruments);
        debug!("ADQL: {adql}");

        let body = self
            .env
            .get_text(
                &self.url,
                &[
                    ("REQUEST", "doQuery"),
                    ("LANG", "ADQL"),
                    ("FORMAT", "csv"),
                    ("QUERY", adql.as_str()),
                ],
            )
            .await
            .map_err(|err| SnrFetchError::ArchiveQueryFailed {
                star: star.to_string(),
                reason: err.to_string(),
            })?;

        let records = parse_tap_csv(&body)?;
        debug!("ESO TAP: {} spectra for {star}", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod eso_tap_test {
    use super::*;
    use crate::observations::SkyPosition;

    fn sirius_cone() -> ConeSearch {
        ConeSearch {
            center: SkyPosition {
                ra: 101.2875,
                dec: -16.7161,
            },
            radius: 0.01,
        }
    }

    #[test]
    fn test_build_query_around_position() {
        let cone = sirius_cone();
        let query = build_query("HIP32349", Some(&cone), &["HARPS".to_string()]);
        assert!(query.contains("FROM ivoa.ObsCore"));
        assert!(query.contains(
            "CONTAINS(POINT('ICRS', s_ra, s_dec), \
             CIRCLE('ICRS', 101.2875000, -16.7161000, 0.0100000)) = 1"
        ));
        assert!(!query.contains("target_name"));
        assert!(query.ends_with("AND instrument_name IN ('HARPS')"));

        let query = build_query(
            "alf CMa",
            Some(&cone),
            &["FEROS".to_string(), "HARPS".to_string(), "ESPRESSO".to_string()],
        );
        assert!(query.contains("instrument_name IN ('FEROS', 'HARPS', 'ESPRESSO')"));

        let query = build_query("HIP1", Some(&cone), &[]);
        assert!(!query.contains("instrument_name"));
    }

    #[test]
    fn test_build_query_by_name_without_position() {
        let query = build_query("HIP32349", None, &["HARPS".to_string()]);
        assert!(query.contains("AND target_name = 'HIP32349'"));
        assert!(!query.contains("CONTAINS"));
    }

    #[test]
    fn test_literal_escaping() {
        assert_eq!(adql_literal("Barnard's star"), "'Barnard''s star'");
    }

    #[test]
    fn test_parse_tap_csv() {
        let csv_text = "dp_id,t_min,snr,s_ra,s_dec,em_res_power\n\
ADP.2014-09-17T11:20:52.760,55260.5,112.3,101.28715,-16.71612,115000\n\
ADP.2016-01-02T10:00:00.000,57176.0,,101.28716,-16.71611,115000\n\
ADP.2017-01-02T10:00:00.000,garbage,48.1,,-16.71611,\n";

        let records = parse_tap_csv(csv_text).unwrap();
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].arcfile, "ADP.2014-09-17T11:20:52.760");
        assert_eq!(
            records[0].date_obs.as_deref(),
            Some("2010-03-05T12:00:00.000")
        );
        assert_eq!(records[0].snr, Some(112.3));
        assert_eq!(records[0].resolution, Some(115000.0));

        assert_eq!(records[1].snr, None);
        assert_eq!(
            records[1].date_obs.as_deref(),
            Some("2015-06-03T00:00:00.000")
        );

        assert_eq!(records[2].date_obs, None);
        assert_eq!(records[2].ra, None);
        assert_eq!(records[2].dec, Some(-16.71611));
        assert_eq!(records[2].resolution, None);
    }

    #[test]
    fn test_parse_tap_csv_missing_columns() {
        let csv_text = "dp_id,snr\nADP.1,50.0\n,12.0\n";
        let records = parse_tap_csv(csv_text).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].snr, Some(50.0));
        assert_eq!(records[0].date_obs, None);
        assert_eq!(records[0].ra, None);
    }

    #[test]
    fn test_parse_tap_csv_empty() {
        let records = parse_tap_csv("dp_id,t_min,snr,s_ra,s_dec,em_res_power\n").unwrap();
        assert!(records.is_empty());
    }
}
