//! # Observation records and candidate sets
//!
//! An [`ObservationRecord`] is one spectrum of the archive as returned by an
//! [`ArchiveQuery`](crate::archive::ArchiveQuery): an opaque archive identifier plus the
//! metadata the selection relies on (date, SNR, position, resolution). The archive may
//! omit or garble any metadata column, so every field but the identifier is optional;
//! the [`filter`] module decides what to do when a column cannot be evaluated.
//!
//! A [`CandidateSet`] is the filtered list of records for one star and one
//! [`InstrumentEpoch`], sorted by decreasing SNR. It is the input of the SNR accumulator
//! and of the download orchestrator.
pub mod filter;

use std::fmt;

use hifitime::Epoch;

use crate::{
    constants::{ArcFile, Degree, Resolution, Snr},
    time::parse_obs_date,
};

/// Side of the instrument upgrade a spectrum belongs to.
///
/// The label doubles as the name of the output directory (`Before` / `After`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstrumentEpoch {
    Before,
    After,
}

impl InstrumentEpoch {
    pub fn label(&self) -> &'static str {
        match self {
            InstrumentEpoch::Before => "Before",
            InstrumentEpoch::After => "After",
        }
    }
}

impl fmt::Display for InstrumentEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Equatorial position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyPosition {
    pub ra: Degree,
    pub dec: Degree,
}

/// One archive spectrum candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    /// Archive file identifier, unique within a query result
    pub arcfile: ArcFile,
    /// Observation date exactly as delivered by the archive
    pub date_obs: Option<String>,
    pub snr: Option<Snr>,
    pub ra: Option<Degree>,
    pub dec: Option<Degree>,
    pub resolution: Option<Resolution>,
}

impl ObservationRecord {
    pub fn new(arcfile: impl Into<ArcFile>) -> Self {
        ObservationRecord {
            arcfile: arcfile.into(),
            date_obs: None,
            snr: None,
            ra: None,
            dec: None,
            resolution: None,
        }
    }

    pub fn with_date(mut self, date_obs: impl Into<String>) -> Self {
        self.date_obs = Some(date_obs.into());
        self
    }

    pub fn with_snr(mut self, snr: Snr) -> Self {
        self.snr = Some(snr);
        self
    }

    pub fn with_position(mut self, ra: Degree, dec: Degree) -> Self {
        self.ra = Some(ra);
        self.dec = Some(dec);
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Parsed observation date, `None` when missing or malformed.
    pub fn epoch(&self) -> Option<Epoch> {
        self.date_obs
            .as_deref()
            .and_then(|date| parse_obs_date(date).ok())
    }

    /// SNR if present, finite and non-negative.
    pub fn valid_snr(&self) -> Option<Snr> {
        self.snr.filter(|snr| snr.is_finite() && *snr >= 0.0)
    }
}

/// Records of one star and one epoch, sorted by decreasing SNR.
///
/// Records without a usable SNR are left out: they can neither be ranked nor contribute
/// to the cumulative SNR. Equal SNRs keep their archive order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    records: Vec<ObservationRecord>,
}

impl CandidateSet {
    pub fn new(records: Vec<ObservationRecord>) -> Self {
        let mut records: Vec<ObservationRecord> = records
            .into_iter()
            .filter(|rec| rec.valid_snr().is_some())
            .collect();

        // stable: ties keep the archive order
        records.sort_by(|a, b| {
            let (a, b) = (a.valid_snr().unwrap_or(0.0), b.valid_snr().unwrap_or(0.0));
            b.total_cmp(&a)
        });

        CandidateSet { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ObservationRecord] {
        &self.records
    }

    /// The first `count` records, clamped to the size of the set.
    pub fn prefix(&self, count: usize) -> &[ObservationRecord] {
        &self.records[..count.min(self.records.len())]
    }

    /// SNR of each record, in ranking order.
    pub fn snrs(&self) -> impl Iterator<Item = Snr> + '_ {
        self.records.iter().filter_map(ObservationRecord::valid_snr)
    }
}

#[cfg(test)]
mod observations_test {
    use super::*;

    fn rec(id: &str, snr: Option<f64>) -> ObservationRecord {
        let rec = ObservationRecord::new(id);
        match snr {
            Some(snr) => rec.with_snr(snr),
            None => rec,
        }
    }

    #[test]
    fn test_epoch_label() {
        assert_eq!(InstrumentEpoch::Before.label(), "Before");
        assert_eq!(InstrumentEpoch::After.to_string(), "After");
    }

    #[test]
    fn test_candidate_set_sorted_descending() {
        let set = CandidateSet::new(vec![
            rec("a", Some(45.0)),
            rec("b", Some(120.0)),
            rec("c", Some(60.5)),
        ]);
        let ids: Vec<&str> = set.records().iter().map(|r| r.arcfile.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert_eq!(set.snrs().collect::<Vec<_>>(), vec![120.0, 60.5, 45.0]);
    }

    #[test]
    fn test_candidate_set_ties_are_stable() {
        let set = CandidateSet::new(vec![
            rec("first", Some(50.0)),
            rec("top", Some(80.0)),
            rec("second", Some(50.0)),
            rec("third", Some(50.0)),
        ]);
        let ids: Vec<&str> = set.records().iter().map(|r| r.arcfile.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second", "third"]);
    }

    #[test]
    fn test_candidate_set_drops_unusable_snr() {
        let set = CandidateSet::new(vec![
            rec("missing", None),
            rec("nan", Some(f64::NAN)),
            rec("negative", Some(-3.0)),
            rec("ok", Some(42.0)),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.records()[0].arcfile, "ok");
    }

    #[test]
    fn test_prefix_is_clamped() {
        let set = CandidateSet::new(vec![rec("a", Some(1.0)), rec("b", Some(2.0))]);
        assert_eq!(set.prefix(1).len(), 1);
        assert_eq!(set.prefix(5).len(), 2);
        assert!(CandidateSet::default().prefix(3).is_empty());
    }

    #[test]
    fn test_record_epoch() {
        let rec = ObservationRecord::new("HARPS.x").with_date("2012-11-20T05:02:11.123");
        assert!(rec.epoch().is_some());
        assert!(ObservationRecord::new("HARPS.y")
            .with_date("20/11/2012")
            .epoch()
            .is_none());
        assert!(ObservationRecord::new("HARPS.z").epoch().is_none());
    }
}
