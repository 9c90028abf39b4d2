#![allow(dead_code)]
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use snrfetch::{
    archive::{
        ArchiveQuery, CatalogEntry, CatalogLookup, ConeSearch, FileTransfer, TransferReport,
    },
    constants::{ArcFile, HARPS_RESOLUTION},
    observations::ObservationRecord,
    snrfetch_errors::SnrFetchError,
};

pub const RA: &str = "06 45 08.917";
pub const DEC: &str = "-16 42 58.02";
pub const RA_DEG: f64 = 101.287_154_166_666_67;
pub const DEC_DEG: f64 = -16.716_116_666_666_667;

pub const BEFORE_DATE: &str = "2010-03-05T03:12:45.123";
pub const AFTER_DATE: &str = "2018-11-02T01:00:12.551";

/// A HARPS spectrum at the catalog position.
pub fn spectrum(arcfile: &str, date: &str, snr: f64) -> ObservationRecord {
    ObservationRecord::new(arcfile)
        .with_date(date)
        .with_snr(snr)
        .with_position(RA_DEG, DEC_DEG)
        .with_resolution(HARPS_RESOLUTION)
}

/// Spectra named `<star>.<tag><i>` with the given SNRs.
pub fn spectra(star: &str, tag: &str, date: &str, snrs: &[f64]) -> Vec<ObservationRecord> {
    snrs.iter()
        .enumerate()
        .map(|(i, snr)| spectrum(&format!("{star}.{tag}{i}"), date, *snr))
        .collect()
}

#[derive(Default)]
pub struct FakeCatalog {
    pub entries: HashMap<String, CatalogEntry>,
}

impl FakeCatalog {
    pub fn with_star(mut self, star: &str) -> Self {
        self.entries.insert(
            star.to_string(),
            CatalogEntry {
                ra: RA.into(),
                dec: DEC.into(),
            },
        );
        self
    }

    pub fn with_entry(mut self, star: &str, ra: &str, dec: &str) -> Self {
        self.entries.insert(
            star.to_string(),
            CatalogEntry {
                ra: ra.into(),
                dec: dec.into(),
            },
        );
        self
    }
}

impl CatalogLookup for FakeCatalog {
    async fn resolve(&self, star: &str) -> Result<CatalogEntry, SnrFetchError> {
        self.entries
            .get(star)
            .cloned()
            .ok_or_else(|| SnrFetchError::StarNotFound(star.to_string()))
    }
}

#[derive(Default)]
pub struct FakeArchive {
    pub records: HashMap<String, Vec<ObservationRecord>>,
    pub failing: Vec<String>,
    /// Time taken by every query
    pub delay: Duration,
    pub queried: Mutex<Vec<(String, Option<ConeSearch>)>>,
}

impl FakeArchive {
    pub fn with_records(mut self, star: &str, records: Vec<ObservationRecord>) -> Self {
        self.records
            .entry(star.to_string())
            .or_default()
            .extend(records);
        self
    }

    pub fn failing_for(mut self, star: &str) -> Self {
        self.failing.push(star.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn cone_for(&self, star: &str) -> Option<ConeSearch> {
        self.queried
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| s == star)
            .and_then(|(_, cone)| *cone)
    }
}

impl ArchiveQuery for FakeArchive {
    async fn query(
        &self,
        star: &str,
        cone: Option<ConeSearch>,
        _instruments: &[String],
    ) -> Result<Vec<ObservationRecord>, SnrFetchError> {
        self.queried.lock().unwrap().push((star.to_string(), cone));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.failing.iter().any(|s| s == star) {
            return Err(SnrFetchError::ArchiveQueryFailed {
                star: star.to_string(),
                reason: "HTTP status 503".into(),
            });
        }
        Ok(self.records.get(star).cloned().unwrap_or_default())
    }
}

/// Writes a small file per identifier, except for the refused ones.
#[derive(Default)]
pub struct FakeTransfer {
    pub refuse: Vec<ArcFile>,
    pub requested: Mutex<Vec<(ArcFile, Utf8PathBuf)>>,
}

impl FakeTransfer {
    pub fn refusing(ids: &[&str]) -> Self {
        FakeTransfer {
            refuse: ids.iter().map(|id| id.to_string()).collect(),
            ..FakeTransfer::default()
        }
    }

    pub fn requested_ids(&self) -> Vec<ArcFile> {
        self.requested
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl FileTransfer for FakeTransfer {
    async fn fetch(&self, arcfiles: &[ArcFile], dir: &Utf8Path) -> TransferReport {
        let mut report = TransferReport::default();
        for id in arcfiles {
            self.requested
                .lock()
                .unwrap()
                .push((id.clone(), dir.to_path_buf()));
            if self.refuse.contains(id) {
                report.failed.push((id.clone(), "HTTP status 404".into()));
            } else {
                std::fs::write(dir.join(format!("{id}.fits")), b"SIMPLE  =  T").unwrap();
                report.succeeded.push(id.clone());
            }
        }
        report
    }
}

pub fn temp_root() -> (tempfile::TempDir, Utf8PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let root = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf()).unwrap();
    (tmp, root)
}
