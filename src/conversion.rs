use crate::{
    constants::{Degree, ARCSEC_PER_DEG, DEG_PER_HOUR},
    snrfetch_errors::SnrFetchError,
};

/// Split a sexagesimal string into its three components.
///
/// Both blank-separated (`"06 45 08.917"`) and colon-separated (`"06:45:08.917"`) forms
/// are accepted. SIMBAD drops the seconds field for poorly known positions, so a missing
/// seconds component is read as zero.
fn split_sexagesimal(value: &str) -> Option<(&str, &str, &str)> {
    let parts: Vec<&str> = value
        .split(|c: char| c.is_whitespace() || c == ':')
        .filter(|p| !p.is_empty())
        .collect();
    match parts.as_slice() {
        [a, b, c] => Some((a, b, c)),
        [a, b] => Some((a, b, "0")),
        _ => None,
    }
}

/// Parse a right ascension string to degrees
///
/// Arguments
/// ---------
/// * `ra`: a string representing the right ascension in the format `HH MM SS.SS`
///
/// Returns
/// -------
/// * The right ascension in degrees, or [`SnrFetchError::InvalidCoordinate`] if the
///   input is malformed or out of range.
pub fn parse_ra_to_deg(ra: &str) -> Result<Degree, SnrFetchError> {
    let invalid = || SnrFetchError::InvalidCoordinate(ra.to_string());
    let (h, m, s) = split_sexagesimal(ra).ok_or_else(invalid)?;

    let h: f64 = h.parse().map_err(|_| invalid())?;
    let m: f64 = m.parse().map_err(|_| invalid())?;
    let s: f64 = s.parse().map_err(|_| invalid())?;

    if !(0.0..24.0).contains(&h) || !(0.0..60.0).contains(&m) || !(0.0..60.0).contains(&s) {
        return Err(invalid());
    }

    Ok((h + m / 60.0 + s / ARCSEC_PER_DEG) * DEG_PER_HOUR)
}

/// Parse a declination string to degrees
///
/// Arguments
/// ---------
/// * `dec`: a string representing the declination in the format `±DD MM SS.SS`
///
/// Returns
/// -------
/// * The declination in degrees, or [`SnrFetchError::InvalidCoordinate`] if the input
///   is malformed or out of range.
pub fn parse_dec_to_deg(dec: &str) -> Result<Degree, SnrFetchError> {
    let invalid = || SnrFetchError::InvalidCoordinate(dec.to_string());
    let (d, m, s) = split_sexagesimal(dec).ok_or_else(invalid)?;

    // the sign sits on the degrees field, also for "-00 30 14.2"
    let sign = if d.starts_with('-') { -1.0 } else { 1.0 };
    let d: f64 = d
        .trim_start_matches(&['-', '+'][..])
        .parse()
        .map_err(|_| invalid())?;
    let m: f64 = m.parse().map_err(|_| invalid())?;
    let s: f64 = s.parse().map_err(|_| invalid())?;

    if d > 90.0 || !(0.0..60.0).contains(&m) || !(0.0..60.0).contains(&s) {
        return Err(invalid());
    }

    Ok(sign * (d + m / 60.0 + s / ARCSEC_PER_DEG))
}

/// Convert an angular radius in arcseconds to degrees.
#[inline]
pub fn arcsec_to_deg(radius: f64) -> Degree {
    radius / ARCSEC_PER_DEG
}
