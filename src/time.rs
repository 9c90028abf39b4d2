use hifitime::{Duration, Epoch};
use std::str::FromStr;

use crate::snrfetch_errors::SnrFetchError;

/// Build a UTC epoch at midnight from a `(year, month, day)` triple.
///
/// Argument
/// --------
/// * `date`: the calendar date, e.g. [`HARPS_UPGRADE_DATE`](crate::constants::HARPS_UPGRADE_DATE)
///
/// Return
/// ------
/// * the corresponding epoch in the UTC time scale
pub fn date_to_epoch(date: (i32, u8, u8)) -> Epoch {
    let (year, month, day) = date;
    Epoch::from_gregorian_utc_at_midnight(year, month, day)
}

/// Parse an observation date as delivered by the archive.
///
/// Accepted forms are the ISO 8601 date-time used by ESO (`2010-03-05T03:12:45.123`)
/// and a bare calendar date (`2015-06-03`), read as midnight UTC.
///
/// Argument
/// --------
/// * `date_str`: the raw date string
///
/// Return
/// ------
/// * the parsed epoch, or [`SnrFetchError::InvalidDate`]
pub fn parse_obs_date(date_str: &str) -> Result<Epoch, SnrFetchError> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return Err(SnrFetchError::InvalidDate(date_str.to_string()));
    }

    if let Ok(epoch) = Epoch::from_str(trimmed) {
        return Ok(epoch);
    }

    parse_calendar_date(trimmed).ok_or_else(|| SnrFetchError::InvalidDate(date_str.to_string()))
}

fn parse_calendar_date(date_str: &str) -> Option<Epoch> {
    let mut parts = date_str.splitn(3, '-');
    let year = i32::from_str(parts.next()?).ok()?;
    let month = u8::from_str(parts.next()?).ok()?;
    let day = u8::from_str(parts.next()?).ok()?;
    Epoch::maybe_from_gregorian_utc(year, month, day, 0, 0, 0, 0).ok()
}

/// Transformation from modified julian date (MJD, UTC) to the ISO string used by ESO.
///
/// The epoch is rounded to the millisecond, matching the precision of ESO archive
/// identifiers.
///
/// Argument
/// --------
/// * `mjd`: the modified julian date in the UTC frame
///
/// Return
/// ------
/// * a string in the format `YYYY-MM-DDTHH:MM:SS.sss`
pub fn mjd_to_iso(mjd: f64) -> String {
    let epoch = Epoch::from_mjd_utc(mjd).round(Duration::from_milliseconds(1.0));
    let (y, m, d, hh, mm, ss, ns) = epoch.to_gregorian_utc();
    format!(
        "{y:04}-{m:02}-{d:02}T{hh:02}:{mm:02}:{ss:02}.{:03}",
        ns / 1_000_000
    )
}
