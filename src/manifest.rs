//! # Download manifest
//!
//! Each downloaded epoch of a star gets an `info_spectra.txt` next to its spectra:
//!
//! ```text
//! SNRtotal = 73.41
//! 3 spectra downloaded
//! Dates   SNR
//! 2010-03-05T03:12:45.123   50.0
//! 2011-11-02T01:00:12.551   45.2
//! 2009-07-14T23:40:03.010   41.1
//! ```
//!
//! Rows follow the download order (decreasing SNR). A new manifest always replaces the
//! previous one, it is never appended to.
use std::fmt;
use std::fs;
use std::io;

use camino::Utf8Path;
use tracing::debug;

use crate::{
    constants::Snr,
    observations::ObservationRecord,
    selection::accumulate_snrs,
    snrfetch_errors::SnrFetchError,
};

const SNR_TOTAL_PREFIX: &str = "SNRtotal = ";
const COUNT_SUFFIX: &str = " spectra downloaded";
const COLUMN_HEADER: &str = "Dates   SNR";
const DELIMITER: &str = "   ";

/// Date written for a record delivered without one.
const MISSING_DATE: &str = "nan";

#[derive(Debug, Clone, PartialEq)]
pub struct ManifestRow {
    pub date: String,
    pub snr: Snr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub snr_total: Snr,
    pub rows: Vec<ManifestRow>,
}

impl Manifest {
    /// Build the manifest of downloaded records, in download order.
    ///
    /// Arguments
    /// -----------------
    /// * `snr_total`: the cumulative SNR reported in the header
    /// * `records`: the downloaded records
    pub fn from_records(snr_total: Snr, records: &[ObservationRecord]) -> Self {
        let rows = records
            .iter()
            .map(|rec| ManifestRow {
                date: rec
                    .date_obs
                    .clone()
                    .unwrap_or_else(|| MISSING_DATE.to_string()),
                snr: rec.snr.unwrap_or(f64::NAN),
            })
            .collect();
        Manifest { snr_total, rows }
    }

    /// Same as [`Manifest::from_records`], with the header total recomputed from the records.
    pub fn from_downloaded(records: &[ObservationRecord]) -> Self {
        let total = accumulate_snrs(
            records.iter().filter_map(ObservationRecord::valid_snr),
            f64::INFINITY,
        );
        Manifest::from_records(total.achieved_snr, records)
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Write the manifest at `path`, deleting any previous file first.
    ///
    /// Return
    /// ----------
    /// * [`SnrFetchError::ManifestWrite`] if the file cannot be removed or written.
    pub async fn write(&self, path: &Utf8Path) -> Result<(), SnrFetchError> {
        let write_error = |source: io::Error| SnrFetchError::ManifestWrite {
            path: path.to_string(),
            source,
        };

        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed previous manifest {path}"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(write_error(err)),
        }

        tokio::fs::write(path, self.to_string())
            .await
            .map_err(write_error)
    }

    /// Read back a manifest written by [`Manifest::write`].
    pub fn read(path: &Utf8Path) -> Result<Self, SnrFetchError> {
        let content = fs::read_to_string(path)?;
        Manifest::parse(&content)
            .map_err(|reason| SnrFetchError::MalformedManifest(path.to_string(), reason))
    }

    fn parse(content: &str) -> Result<Self, String> {
        let mut lines = content.lines();

        let snr_total = lines
            .next()
            .and_then(|l| l.strip_prefix(SNR_TOTAL_PREFIX))
            .ok_or("missing SNRtotal line")?
            .trim()
            .parse::<Snr>()
            .map_err(|e| format!("invalid SNRtotal: {e}"))?;

        let count = lines
            .next()
            .and_then(|l| l.strip_suffix(COUNT_SUFFIX))
            .ok_or("missing spectra count line")?
            .trim()
            .parse::<usize>()
            .map_err(|e| format!("invalid spectra count: {e}"))?;

        if lines.next().map(str::trim) != Some(COLUMN_HEADER) {
            return Err("missing column header".into());
        }

        let rows = lines
            .filter(|l| !l.trim().is_empty())
            .map(|line| {
                let mut fields = line.split_whitespace();
                match (fields.next(), fields.next(), fields.next()) {
                    (Some(date), Some(snr), None) => Ok(ManifestRow {
                        date: date.to_string(),
                        snr: snr.parse().map_err(|e| format!("invalid SNR {snr}: {e}"))?,
                    }),
                    _ => Err(format!("invalid row: {line}")),
                }
            })
            .collect::<Result<Vec<_>, String>>()?;

        if rows.len() != count {
            return Err(format!(
                "header announces {count} spectra, {} rows found",
                rows.len()
            ));
        }

        Ok(Manifest { snr_total, rows })
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SNR_TOTAL_PREFIX}{:.2}", self.snr_total)?;
        writeln!(f, "{}{COUNT_SUFFIX}", self.count())?;
        writeln!(f, "{COLUMN_HEADER}")?;
        for row in &self.rows {
            // Debug keeps the fractional part of whole values: 50.0, not 50
            writeln!(f, "{}{DELIMITER}{:?}", row.date, row.snr)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod manifest_test {
    use super::*;
    use camino::Utf8PathBuf;

    fn records() -> Vec<ObservationRecord> {
        vec![
            ObservationRecord::new("a")
                .with_date("2010-03-05T03:12:45.123")
                .with_snr(50.0),
            ObservationRecord::new("b")
                .with_date("2011-11-02T01:00:12.551")
                .with_snr(45.2),
            ObservationRecord::new("c")
                .with_date("2009-07-14T23:40:03.010")
                .with_snr(41.1),
        ]
    }

    #[test]
    fn test_manifest_format() {
        let manifest = Manifest::from_records(73.41, &records());
        assert_eq!(
            manifest.to_string(),
            "SNRtotal = 73.41\n\
             3 spectra downloaded\n\
             Dates   SNR\n\
             2010-03-05T03:12:45.123   50.0\n\
             2011-11-02T01:00:12.551   45.2\n\
             2009-07-14T23:40:03.010   41.1\n"
        );
    }

    #[test]
    fn test_snr_total_rounding() {
        let manifest = Manifest::from_records(1000.005_1, &[]);
        assert!(manifest.to_string().starts_with("SNRtotal = 1000.01\n0 spectra downloaded\n"));
    }

    #[test]
    fn test_missing_metadata() {
        let manifest = Manifest::from_records(10.0, &[ObservationRecord::new("x")]);
        assert_eq!(manifest.rows[0].date, "nan");
        assert!(manifest.rows[0].snr.is_nan());
    }

    #[test]
    fn test_from_downloaded_recomputes_total() {
        let manifest = Manifest::from_downloaded(&records()[..2]);
        assert_eq!(manifest.count(), 2);
        let expected = (50.0f64 * 50.0 + 45.2 * 45.2).sqrt();
        assert!((manifest.snr_total - expected).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_write_read_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("info_spectra.txt")).unwrap();

        Manifest::from_records(73.41, &records())
            .write(&path)
            .await
            .unwrap();
        let read = Manifest::read(&path).unwrap();
        assert_eq!(read.count(), 3);
        assert_eq!(read.snr_total, 73.41);
        assert_eq!(read.rows[1].date, "2011-11-02T01:00:12.551");

        Manifest::from_records(50.0, &records()[..1])
            .write(&path)
            .await
            .unwrap();
        let read = Manifest::read(&path).unwrap();
        assert_eq!(read.count(), 1);
        assert_eq!(read.snr_total, 50.0);
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("nope").join("info_spectra.txt"))
            .unwrap();
        let err = Manifest::from_records(1.0, &[])
            .write(&path)
            .await
            .unwrap_err();
        assert!(matches!(err, SnrFetchError::ManifestWrite { .. }));
    }

    #[test]
    fn test_parse_rejects_inconsistent_count() {
        let content = "SNRtotal = 10.00\n2 spectra downloaded\nDates   SNR\n2010-01-01   10.0\n";
        assert!(Manifest::parse(content).is_err());
        assert!(Manifest::parse("garbage").is_err());
    }
}
