//! # Download of one epoch
//!
//! Given the candidates of one star and one epoch and the prefix chosen by the
//! accumulator, [`download_epoch`]:
//!
//! 1. creates `root/<star>/<Before|After>/` if needed,
//! 2. hands the identifiers of the prefix to the [`FileTransfer`] collaborator,
//! 3. writes the manifest of what actually arrived, replacing any previous one.
//!
//! When only part of the prefix could be retrieved, the manifest lists the successes only,
//! with its total SNR and count recomputed from them. When nothing could be retrieved, no
//! manifest is written and the epoch fails with [`SnrFetchError::TransferFailed`].
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::{
    archive::FileTransfer,
    constants::{ArcFile, Snr, MANIFEST_FILE_NAME},
    manifest::Manifest,
    observations::{CandidateSet, InstrumentEpoch, ObservationRecord},
    selection::Accumulation,
    snrfetch_errors::SnrFetchError,
};

/// What was retrieved for one star and one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOutcome {
    pub epoch: InstrumentEpoch,
    pub dir: Utf8PathBuf,
    /// Path of the manifest, `None` when there was nothing to download
    pub manifest: Option<Utf8PathBuf>,
    pub downloaded: Vec<ArcFile>,
    pub failed: Vec<(ArcFile, String)>,
    /// Cumulative SNR written in the manifest
    pub snr_total: Snr,
}

impl DownloadOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Output directory of one star and one epoch.
pub fn epoch_dir(root: &Utf8Path, star: &str, epoch: InstrumentEpoch) -> Utf8PathBuf {
    root.join(star).join(epoch.label())
}

/// Download the selected prefix of one epoch and write its manifest.
///
/// Arguments
/// -----------------
/// * `transfer`: the file transfer collaborator
/// * `star`: the star identifier, also the name of its output directory
/// * `epoch`: the epoch being downloaded
/// * `candidates`: the SNR-sorted candidates of this epoch
/// * `accumulation`: the prefix to download and its cumulative SNR
/// * `root`: the destination root of the campaign
///
/// Return
/// ----------
/// * The outcome of the epoch, [`SnrFetchError::TransferFailed`] if no file could be
///   retrieved, or [`SnrFetchError::ManifestWrite`] if the manifest cannot be written.
pub async fn download_epoch<T: FileTransfer>(
    transfer: &T,
    star: &str,
    epoch: InstrumentEpoch,
    candidates: &CandidateSet,
    accumulation: &Accumulation,
    root: &Utf8Path,
) -> Result<DownloadOutcome, SnrFetchError> {
    let dir = epoch_dir(root, star, epoch);
    let prefix = candidates.prefix(accumulation.count);

    if prefix.is_empty() {
        return Ok(DownloadOutcome {
            epoch,
            dir,
            manifest: None,
            downloaded: Vec::new(),
            failed: Vec::new(),
            snr_total: 0.0,
        });
    }

    tokio::fs::create_dir_all(&dir).await?;

    info!(
        "{star} {epoch}: downloading {} spectra (SNR {:.2})",
        prefix.len(),
        accumulation.achieved_snr
    );
    let arcfiles: Vec<ArcFile> = prefix.iter().map(|rec| rec.arcfile.clone()).collect();
    let report = transfer.fetch(&arcfiles, &dir).await;

    if report.succeeded.is_empty() {
        return Err(SnrFetchError::TransferFailed {
            star: star.to_string(),
            epoch,
        });
    }

    let manifest = if report.is_complete() {
        Manifest::from_records(accumulation.achieved_snr, prefix)
    } else {
        for (arcfile, reason) in &report.failed {
            warn!("{star} {epoch}: {arcfile} left out of the manifest ({reason})");
        }
        let delivered: Vec<ObservationRecord> = prefix
            .iter()
            .filter(|rec| report.has_succeeded(&rec.arcfile))
            .cloned()
            .collect();
        Manifest::from_downloaded(&delivered)
    };

    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    manifest.write(&manifest_path).await?;
    info!(
        "{star} {epoch}: {} spectra, SNRtotal = {:.2}",
        manifest.count(),
        manifest.snr_total
    );

    let downloaded = manifest_order(prefix, &report.succeeded);
    Ok(DownloadOutcome {
        epoch,
        dir,
        manifest: Some(manifest_path),
        downloaded,
        failed: report.failed,
        snr_total: manifest.snr_total,
    })
}

/// Retrieved identifiers in download order.
fn manifest_order(prefix: &[ObservationRecord], succeeded: &[ArcFile]) -> Vec<ArcFile> {
    prefix
        .iter()
        .filter(|rec| succeeded.contains(&rec.arcfile))
        .map(|rec| rec.arcfile.clone())
        .collect()
}
