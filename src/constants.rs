//! # Constants and type definitions for snrfetch
//!
//! This module centralizes the **default search parameters**, **service endpoints**, and
//! **common type aliases** used throughout the `snrfetch` library.
//!
//! ## Overview
//!
//! - Default filter values for the ESO Phase 3 search (SNR window, radius, resolution)
//! - Cumulative SNR thresholds used by the accumulator and the epoch selector
//! - Service URLs for SIMBAD, the ESO TAP service, the ESO data portal and DataLink
//! - Unit conversions and type aliases shared across modules

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Arcseconds per degree
pub const ARCSEC_PER_DEG: f64 = 3600.0;

/// Hours of right ascension → degrees
pub const DEG_PER_HOUR: f64 = 15.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;

/// Angle in arcseconds
pub type ArcSec = f64;

/// Signal-to-noise ratio of a single spectrum, or a cumulative one
pub type Snr = f64;

/// Spectral resolving power (λ/δλ)
pub type Resolution = f64;

/// Identifier of a star, e.g. `"HIP1234"`
pub type StarId = String;

/// Archive file identifier (ESO `ARCFILE` / `dp_id`), e.g. `"HARPS.2010-03-05T03:12:45.123"`
pub type ArcFile = String;

// -------------------------------------------------------------------------------------------------
// Search defaults
// -------------------------------------------------------------------------------------------------

/// Date of the HARPS fibre upgrade, splitting the archive into two epochs
pub const HARPS_UPGRADE_DATE: (i32, u8, u8) = (2015, 6, 3);

/// Lower date bound used by the generic "since" search
pub const GENERIC_SEARCH_DATE: (i32, u8, u8) = (1990, 1, 23);

/// Default instrument for the campaign
pub const DEFAULT_INSTRUMENT: &str = "HARPS";

/// Instruments searched when no instrument is given
pub const DEFAULT_INSTRUMENTS: [&str; 3] = ["FEROS", "HARPS", "ESPRESSO"];

/// Lower SNR bound for the generic search
pub const GENERIC_SNR_MIN: Snr = 1.0;

/// Lower SNR bound for the epoch-specific searches
pub const EPOCH_SNR_MIN: Snr = 40.0;

/// Upper SNR bound, shared by every search
pub const SNR_MAX: Snr = 500.0;

/// Maximal angular distance between a spectrum and the catalog position
pub const SEARCH_RADIUS: ArcSec = 30.0;

/// HARPS resolving power
pub const HARPS_RESOLUTION: Resolution = 115_000.0;

/// Cumulative SNR goal for one star and one epoch
pub const TARGET_CUMULATIVE_SNR: Snr = 1000.0;

/// Cumulative SNR above which one epoch alone is worth downloading
pub const GOOD_ENOUGH_SNR: Snr = 400.0;

/// Name of the manifest written next to each downloaded epoch
pub const MANIFEST_FILE_NAME: &str = "info_spectra.txt";

// -------------------------------------------------------------------------------------------------
// Service endpoints
// -------------------------------------------------------------------------------------------------

/// SIMBAD script interface
pub const SIMBAD_SCRIPT_URL: &str = "https://simbad.cds.unistra.fr/simbad/sim-script";

/// ESO TAP service (synchronous ADQL queries on `ivoa.ObsCore`)
pub const ESO_TAP_URL: &str = "https://archive.eso.org/tap_obs/sync";

/// ESO DataLink service
pub const ESO_DATALINK_URL: &str = "https://archive.eso.org/datalink/links";

/// ESO data portal file endpoint
pub const ESO_DATAPORTAL_URL: &str = "https://dataportal.eso.org/dataPortal/file";
