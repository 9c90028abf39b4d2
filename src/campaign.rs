//! # Download campaign
//!
//! A [`Campaign`] runs the whole pipeline over a list of stars:
//!
//! ```text
//! star ─▶ CatalogLookup::resolve ─▶ ArchiveQuery::query (cone around the position)
//!      ─▶ filter_candidates(Before) ─▶ CandidateSet ─▶ accumulate ─┐
//!      ─▶ filter_candidates(After)  ─▶ CandidateSet ─▶ accumulate ─┴▶ DownloadPlan
//!      ─▶ download_epoch for each selected epoch
//! ```
//!
//! A failing star (unknown to the catalog, archive error, failed transfer, unwritable
//! manifest) is logged and recorded in the [`CampaignReport`]; the campaign goes on with
//! the next star.
//!
//! Stars run one at a time unless `max_concurrent_stars` is raised; each star owns its
//! own output subtree, so concurrent stars never touch the same files. Within a star,
//! epochs and transfers stay sequential.
//!
//! [`Campaign::search`] is the generic lookup: every spectrum of a star since a date,
//! without epochs and without download.
use std::fmt;
use std::time::{Duration, Instant};

use camino::Utf8Path;
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};

use hifitime::Epoch;

use crate::{
    archive::{ArchiveQuery, CatalogLookup, ConeSearch, FileTransfer},
    config::CampaignConfig,
    constants::{Snr, StarId},
    download::{download_epoch, DownloadOutcome},
    observations::{
        filter::{filter_candidates, search_since, FilterReport},
        CandidateSet, InstrumentEpoch, ObservationRecord, SkyPosition,
    },
    progress_bar::{fmt_dur, StarTimer},
    selection::{accumulate, DownloadPlan},
    snrfetch_errors::SnrFetchError,
};

/// Smoothing factor of the per-star average duration
const TIMER_ALPHA: f64 = 0.2;

/// Candidates and filter report of one epoch of a star.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochCandidates {
    pub candidates: CandidateSet,
    pub report: FilterReport,
}

/// Everything known about a star once its pipeline went through.
#[derive(Debug)]
pub struct StarSummary {
    /// Catalog position, `None` when the catalog coordinates could not be parsed
    pub position: Option<SkyPosition>,
    pub before: EpochCandidates,
    pub after: EpochCandidates,
    pub plan: DownloadPlan,
    /// One entry per downloaded epoch, in download order
    pub downloads: Vec<(InstrumentEpoch, Result<DownloadOutcome, SnrFetchError>)>,
}

impl StarSummary {
    pub fn epoch(&self, epoch: InstrumentEpoch) -> &EpochCandidates {
        match epoch {
            InstrumentEpoch::Before => &self.before,
            InstrumentEpoch::After => &self.after,
        }
    }

    pub fn download(
        &self,
        epoch: InstrumentEpoch,
    ) -> Option<&Result<DownloadOutcome, SnrFetchError>> {
        self.downloads
            .iter()
            .find(|(e, _)| *e == epoch)
            .map(|(_, outcome)| outcome)
    }
}

#[derive(Debug)]
pub struct StarReport {
    pub star: StarId,
    pub result: Result<StarSummary, SnrFetchError>,
    /// Wall-clock time spent on this star
    pub elapsed: Duration,
}

impl StarReport {
    /// The star went through and every selected epoch was downloaded.
    pub fn is_success(&self) -> bool {
        self.result
            .as_ref()
            .is_ok_and(|summary| summary.downloads.iter().all(|(_, d)| d.is_ok()))
    }
}

/// Per-star results of a campaign, in star list order.
#[derive(Debug, Default)]
pub struct CampaignReport {
    pub stars: Vec<StarReport>,
}

impl CampaignReport {
    pub fn star(&self, star: &str) -> Option<&StarReport> {
        self.stars.iter().find(|report| report.star == star)
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &StarReport> {
        self.stars.iter().filter(|report| report.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &StarReport> {
        self.stars.iter().filter(|report| !report.is_success())
    }
}

impl fmt::Display for CampaignReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} stars, {} complete, {} with failures",
            self.stars.len(),
            self.succeeded().count(),
            self.failed().count()
        )?;
        for report in self.failed() {
            match &report.result {
                Err(err) => writeln!(f, "  {}: {err}", report.star)?,
                Ok(summary) => {
                    for (epoch, download) in &summary.downloads {
                        if let Err(err) = download {
                            writeln!(f, "  {} {epoch}: {err}", report.star)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// The pipeline of a campaign, generic over its collaborators.
pub struct Campaign<'a, C, A, T> {
    catalog: &'a C,
    archive: &'a A,
    transfer: &'a T,
    config: &'a CampaignConfig,
}

impl<'a, C, A, T> Campaign<'a, C, A, T>
where
    C: CatalogLookup,
    A: ArchiveQuery,
    T: FileTransfer,
{
    pub fn new(
        catalog: &'a C,
        archive: &'a A,
        transfer: &'a T,
        config: &'a CampaignConfig,
    ) -> Self {
        Campaign {
            catalog,
            archive,
            transfer,
            config,
        }
    }

    /// Run the pipeline on every star of `stars`.
    ///
    /// Arguments
    /// -----------------
    /// * `stars`: the star identifiers, processed in order
    ///
    /// Return
    /// ----------
    /// * One [`StarReport`] per star, in the order of `stars`.
    pub async fn run(&self, stars: &[StarId]) -> CampaignReport {
        let total = stars.len();
        let concurrency = self.config.max_concurrent_stars.max(1);
        info!(
            "Campaign over {total} stars into {} ({concurrency} at once)",
            self.config.root
        );

        #[cfg(feature = "progress")]
        let pb = crate::progress_bar::campaign_bar(total as u64);

        let mut timer = StarTimer::new(TIMER_ALPHA);
        let mut pending = stream::iter(stars)
            .map(|star| self.process_star(star))
            .buffered(concurrency);

        let mut report = CampaignReport {
            stars: Vec::with_capacity(total),
        };
        while let Some(star_report) = pending.next().await {
            let last = star_report.elapsed;
            timer.record(last);
            let avg = timer.avg();
            info!(
                "[{}/{total}] {} done in {} (avg {})",
                timer.count(),
                star_report.star,
                fmt_dur(last),
                fmt_dur(avg)
            );

            #[cfg(feature = "progress")]
            {
                pb.set_message(format!("last: {}, avg: {}", fmt_dur(last), fmt_dur(avg)));
                pb.inc(1);
            }

            report.stars.push(star_report);
        }

        #[cfg(feature = "progress")]
        pb.finish_and_clear();

        info!(
            "FINISHED: {} of {total} stars complete",
            report.succeeded().count()
        );
        report
    }

    /// Run the pipeline on one star; never fails, the error is part of the report.
    pub async fn process_star(&self, star: &str) -> StarReport {
        info!("*** {star} ***");
        let started = Instant::now();
        let result = self.try_process_star(star).await;
        if let Err(err) = &result {
            error!("{star} skipped: {err}");
        }
        StarReport {
            star: star.to_string(),
            result,
            elapsed: started.elapsed(),
        }
    }

    /// Every archive spectrum of `star` observed since `since` with an SNR of at least
    /// `snr_min`, in archive order.
    ///
    /// Arguments
    /// -----------------
    /// * `star`: the star identifier
    /// * `since`: earliest observation date, 1990-01-23 when `None`
    /// * `snr_min`: lowest accepted SNR, 1 when `None`
    ///
    /// Return
    /// ----------
    /// * The matching records and the filter report, or the catalog or archive error.
    pub async fn search(
        &self,
        star: &str,
        since: Option<Epoch>,
        snr_min: Option<Snr>,
    ) -> Result<(Vec<ObservationRecord>, FilterReport), SnrFetchError> {
        let (_, records) = self.locate_and_query(star).await?;
        Ok(search_since(records, since, snr_min))
    }

    /// Resolve `star` and query the archive around its catalog position.
    async fn locate_and_query(
        &self,
        star: &str,
    ) -> Result<(Option<SkyPosition>, Vec<ObservationRecord>), SnrFetchError> {
        let entry = self.catalog.resolve(star).await?;
        let position = match entry.position() {
            Ok(position) => Some(position),
            Err(err) => {
                warn!("{star}: unusable catalog position ({err}), coordinate windows skipped");
                None
            }
        };

        let cone = position
            .map(|center| ConeSearch::covering_window(center, self.config.filter.radius));
        let records = self
            .archive
            .query(star, cone, &self.config.instruments)
            .await?;
        info!("{star}: {} spectra in the archive", records.len());
        Ok((position, records))
    }

    async fn try_process_star(&self, star: &str) -> Result<StarSummary, SnrFetchError> {
        let (position, records) = self.locate_and_query(star).await?;

        let select = |epoch: InstrumentEpoch, records: Vec<ObservationRecord>| {
            let (kept, report) = filter_candidates(records, &self.config.filter, position, epoch);
            EpochCandidates {
                candidates: CandidateSet::new(kept),
                report,
            }
        };
        let before = select(InstrumentEpoch::Before, records.clone());
        let after = select(InstrumentEpoch::After, records);

        let plan = DownloadPlan::new(
            accumulate(&before.candidates, self.config.target_snr),
            accumulate(&after.candidates, self.config.target_snr),
            self.config.good_enough_snr,
        );
        info!(
            "{star}: Before {} spectra (SNR {:.2}), After {} spectra (SNR {:.2}) → {:?}",
            plan.before.count,
            plan.before.achieved_snr,
            plan.after.count,
            plan.after.achieved_snr,
            plan.selection
        );

        let mut summary = StarSummary {
            position,
            before,
            after,
            plan,
            downloads: Vec::new(),
        };

        if self.config.dry_run {
            return Ok(summary);
        }

        for (epoch, accumulation) in plan.downloads() {
            let outcome = download_epoch(
                self.transfer,
                star,
                epoch,
                &summary.epoch(epoch).candidates,
                &accumulation,
                self.root(),
            )
            .await;
            if let Err(err) = &outcome {
                error!("{star} {epoch}: {err}");
            }
            summary.downloads.push((epoch, outcome));
        }

        Ok(summary)
    }

    fn root(&self) -> &Utf8Path {
        &self.config.root
    }
}
