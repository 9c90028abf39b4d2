//! # Candidate filter
//!
//! Reduces the raw answer of the archive to the spectra usable for one star and one
//! [`InstrumentEpoch`]: date on the right side of the upgrade, SNR inside a window,
//! position within a radius of the catalog coordinates, and the expected resolving power.
//!
//! Each criterion is a [`FilterPredicate`] evaluated independently with an
//! *apply-or-skip* outcome:
//!
//! - if the criterion can be evaluated on every remaining record, it is **applied**;
//! - if one record lacks the column (or carries a malformed value), or the catalog
//!   position is unknown, the criterion is **skipped** and the set is left untouched
//!   for it.
//!
//! Skipped criteria are logged and listed in the [`FilterReport`]; filtering itself
//! never fails.
use std::fmt;

use hifitime::Epoch;
use itertools::Itertools;
use tracing::{debug, warn};

use crate::{
    constants::{
        ArcSec, Resolution, Snr, EPOCH_SNR_MIN, GENERIC_SEARCH_DATE, GENERIC_SNR_MIN,
        HARPS_RESOLUTION, HARPS_UPGRADE_DATE, SEARCH_RADIUS, SNR_MAX,
    },
    conversion::arcsec_to_deg,
    observations::{InstrumentEpoch, ObservationRecord, SkyPosition},
    time::date_to_epoch,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterPredicate {
    Date,
    SnrWindow,
    RaWindow,
    DecWindow,
    Resolution,
}

impl fmt::Display for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterPredicate::Date => "date",
            FilterPredicate::SnrWindow => "SNR window",
            FilterPredicate::RaWindow => "RA window",
            FilterPredicate::DecWindow => "DEC window",
            FilterPredicate::Resolution => "resolution",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredicateOutcome {
    Applied { removed: usize },
    Skipped { reason: String },
}

/// What each predicate did to the records of one search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterReport {
    pub outcomes: Vec<(FilterPredicate, PredicateOutcome)>,
    /// Records dropped because their archive identifier was already seen
    pub duplicates: usize,
}

impl FilterReport {
    pub fn skipped(&self) -> impl Iterator<Item = FilterPredicate> + '_ {
        self.outcomes.iter().filter_map(|(pred, outcome)| match outcome {
            PredicateOutcome::Skipped { .. } => Some(*pred),
            PredicateOutcome::Applied { .. } => None,
        })
    }

    pub fn is_skipped(&self, predicate: FilterPredicate) -> bool {
        self.skipped().any(|p| p == predicate)
    }

    /// Number of records removed by `predicate`, `None` if it was skipped or not evaluated.
    pub fn removed_by(&self, predicate: FilterPredicate) -> Option<usize> {
        self.outcomes
            .iter()
            .find(|(p, _)| *p == predicate)
            .and_then(|(_, outcome)| match outcome {
                PredicateOutcome::Applied { removed } => Some(*removed),
                PredicateOutcome::Skipped { .. } => None,
            })
    }
}

/// Search parameters of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParams {
    /// Instrument upgrade date separating the two epochs
    pub date_boundary: Epoch,
    pub snr_min: Snr,
    pub snr_max: Snr,
    /// Maximal distance to the catalog position, on each axis
    pub radius: ArcSec,
    /// Required resolving power, compared exactly
    pub resolution: Resolution,
}

impl Default for FilterParams {
    fn default() -> Self {
        FilterParams {
            date_boundary: date_to_epoch(HARPS_UPGRADE_DATE),
            snr_min: GENERIC_SNR_MIN,
            snr_max: SNR_MAX,
            radius: SEARCH_RADIUS,
            resolution: HARPS_RESOLUTION,
        }
    }
}

impl FilterParams {
    /// Parameters of the per-epoch searches run by the campaign (SNR ≥ 40).
    pub fn epoch_search() -> Self {
        FilterParams {
            snr_min: EPOCH_SNR_MIN,
            ..FilterParams::default()
        }
    }
}

/// Evaluate `test` on every record; retain the accepted ones if all verdicts are known.
fn apply_predicate<F>(
    records: &mut Vec<ObservationRecord>,
    predicate: FilterPredicate,
    test: F,
) -> PredicateOutcome
where
    F: Fn(&ObservationRecord) -> Option<bool>,
{
    let verdicts: Option<Vec<bool>> = records.iter().map(&test).collect();

    let Some(verdicts) = verdicts else {
        let culprit = records
            .iter()
            .find(|rec| test(rec).is_none())
            .map(|rec| rec.arcfile.as_str())
            .unwrap_or("?");
        return PredicateOutcome::Skipped {
            reason: format!("{predicate} cannot be evaluated on {culprit}"),
        };
    };

    let before = records.len();
    let kept: Vec<ObservationRecord> = records
        .drain(..)
        .zip(verdicts)
        .filter_map(|(rec, keep)| keep.then_some(rec))
        .collect();
    *records = kept;
    PredicateOutcome::Applied {
        removed: before - records.len(),
    }
}

fn skipped(reason: &str) -> PredicateOutcome {
    PredicateOutcome::Skipped {
        reason: reason.to_string(),
    }
}

fn log_report(report: &FilterReport, kept: usize) {
    for (predicate, outcome) in &report.outcomes {
        match outcome {
            PredicateOutcome::Applied { removed } => {
                debug!("filter {predicate}: removed {removed}")
            }
            PredicateOutcome::Skipped { reason } => {
                warn!("filter {predicate} skipped: {reason}")
            }
        }
    }
    debug!("{kept} records kept");
}

/// Drop records whose archive identifier was already seen, keeping the first occurrence.
fn dedup_arcfiles(records: Vec<ObservationRecord>) -> (Vec<ObservationRecord>, usize) {
    let before = records.len();
    let unique: Vec<ObservationRecord> = records
        .into_iter()
        .unique_by(|rec| rec.arcfile.clone())
        .collect();
    let duplicates = before - unique.len();
    (unique, duplicates)
}

/// Apply the epoch search criteria to the raw records of one star.
///
/// Arguments
/// -----------------
/// * `records`: the raw answer of the archive
/// * `params`: the search parameters
/// * `center`: the catalog position of the star; `None` skips both coordinate windows
/// * `epoch`: [`InstrumentEpoch::Before`] keeps dates ≤ boundary,
///   [`InstrumentEpoch::After`] keeps dates ≥ boundary
///
/// Return
/// ----------
/// * The surviving records, in archive order, and the per-predicate report.
pub fn filter_candidates(
    records: Vec<ObservationRecord>,
    params: &FilterParams,
    center: Option<SkyPosition>,
    epoch: InstrumentEpoch,
) -> (Vec<ObservationRecord>, FilterReport) {
    let (mut records, duplicates) = dedup_arcfiles(records);
    let mut report = FilterReport {
        outcomes: Vec::with_capacity(5),
        duplicates,
    };

    let boundary = params.date_boundary;
    let date = apply_predicate(&mut records, FilterPredicate::Date, |rec| {
        rec.epoch().map(|date| match epoch {
            InstrumentEpoch::Before => date <= boundary,
            InstrumentEpoch::After => date >= boundary,
        })
    });
    report.outcomes.push((FilterPredicate::Date, date));

    let snr = apply_predicate(&mut records, FilterPredicate::SnrWindow, |rec| {
        rec.snr
            .map(|snr| snr >= params.snr_min && snr <= params.snr_max)
    });
    report.outcomes.push((FilterPredicate::SnrWindow, snr));

    let half_width = arcsec_to_deg(params.radius);
    let (ra, dec) = match center {
        Some(center) => (
            apply_predicate(&mut records, FilterPredicate::RaWindow, |rec| {
                rec.ra.map(|ra| {
                    ra >= center.ra - half_width && ra <= center.ra + half_width
                })
            }),
            apply_predicate(&mut records, FilterPredicate::DecWindow, |rec| {
                rec.dec.map(|dec| {
                    dec >= center.dec - half_width && dec <= center.dec + half_width
                })
            }),
        ),
        None => (
            skipped("catalog position unavailable"),
            skipped("catalog position unavailable"),
        ),
    };
    report.outcomes.push((FilterPredicate::RaWindow, ra));
    report.outcomes.push((FilterPredicate::DecWindow, dec));

    let resolution = apply_predicate(&mut records, FilterPredicate::Resolution, |rec| {
        rec.resolution.map(|r| r == params.resolution)
    });
    report.outcomes.push((FilterPredicate::Resolution, resolution));

    log_report(&report, records.len());
    (records, report)
}

/// Generic search: every spectrum observed since `since` with an SNR of at least `snr_min`.
///
/// Defaults, used when `None` is given: 1990-01-23 and an SNR of 1.
pub fn search_since(
    records: Vec<ObservationRecord>,
    since: Option<Epoch>,
    snr_min: Option<Snr>,
) -> (Vec<ObservationRecord>, FilterReport) {
    let since = since.unwrap_or_else(|| date_to_epoch(GENERIC_SEARCH_DATE));
    let snr_min = snr_min.unwrap_or(GENERIC_SNR_MIN);

    let (mut records, duplicates) = dedup_arcfiles(records);
    let mut report = FilterReport {
        outcomes: Vec::with_capacity(2),
        duplicates,
    };

    let date = apply_predicate(&mut records, FilterPredicate::Date, |rec| {
        rec.epoch().map(|date| date >= since)
    });
    report.outcomes.push((FilterPredicate::Date, date));

    let snr = apply_predicate(&mut records, FilterPredicate::SnrWindow, |rec| {
        rec.snr.map(|snr| snr >= snr_min)
    });
    report.outcomes.push((FilterPredicate::SnrWindow, snr));

    log_report(&report, records.len());
    (records, report)
}
