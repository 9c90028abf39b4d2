//! # SNR-budgeted selection
//!
//! Two decisions are taken for every star:
//!
//! 1. **How many spectra** of one epoch to download: [`accumulate`] walks the candidates
//!    in decreasing SNR order and stops as soon as the cumulative SNR reaches the target.
//!    SNRs combine in quadrature (`SNR_tot = sqrt(Σ SNR²)`), so taking the brightest
//!    spectra first gives the smallest prefix crossing any threshold.
//! 2. **Which epoch(s)** to download: [`select_epochs`] compares the two accumulations
//!    against a "good enough" threshold (400 by default). One epoch alone is fetched when
//!    it clears the threshold; both are fetched only when neither does.
//!
//! ```text
//! after empty                         → Before
//! before empty                        → After
//! before ≥ 400 and before > after     → Before
//! before ≥ 400 and before ≤ after     → After
//! after ≥ 400                         → After
//! otherwise                           → Both
//! ```
use crate::{
    constants::Snr,
    observations::{CandidateSet, InstrumentEpoch},
};

/// Cumulative SNR reached by the first `count` candidates of a set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulation {
    pub achieved_snr: Snr,
    pub count: usize,
}

impl Accumulation {
    pub const EMPTY: Accumulation = Accumulation {
        achieved_snr: 0.0,
        count: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Whether the cumulative SNR reached `target`.
    pub fn reached(&self, target: Snr) -> bool {
        self.achieved_snr >= target
    }
}

/// Smallest prefix of an SNR-descending sequence reaching `target`.
///
/// At least one spectrum is taken from a non-empty sequence. When the target cannot be
/// reached the whole sequence is taken.
///
/// Arguments
/// -----------------
/// * `snrs`: the SNR of each candidate, sorted in decreasing order
/// * `target`: the cumulative SNR goal
///
/// Return
/// ----------
/// * The achieved cumulative SNR and the prefix length; `(0, 0)` for an empty sequence.
pub fn accumulate_snrs<I>(snrs: I, target: Snr) -> Accumulation
where
    I: IntoIterator<Item = Snr>,
{
    let target_squared = target * target;
    let mut sum_squared = 0.0;
    let mut count = 0;

    for snr in snrs {
        sum_squared += snr * snr;
        count += 1;
        if sum_squared >= target_squared {
            break;
        }
    }

    Accumulation {
        achieved_snr: sum_squared.sqrt(),
        count,
    }
}

/// [`accumulate_snrs`] over a candidate set.
pub fn accumulate(candidates: &CandidateSet, target: Snr) -> Accumulation {
    accumulate_snrs(candidates.snrs(), target)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochSelection {
    DownloadBefore,
    DownloadAfter,
    DownloadBoth,
}

impl EpochSelection {
    pub fn epochs(&self) -> &'static [InstrumentEpoch] {
        match self {
            EpochSelection::DownloadBefore => &[InstrumentEpoch::Before],
            EpochSelection::DownloadAfter => &[InstrumentEpoch::After],
            EpochSelection::DownloadBoth => &[InstrumentEpoch::Before, InstrumentEpoch::After],
        }
    }
}

/// Decide which epoch(s) to download.
///
/// Arguments
/// -----------------
/// * `before`, `after`: the accumulations of the two epochs of one star
/// * `good_enough`: cumulative SNR above which one epoch alone suffices
pub fn select_epochs(
    before: &Accumulation,
    after: &Accumulation,
    good_enough: Snr,
) -> EpochSelection {
    if after.is_empty() {
        EpochSelection::DownloadBefore
    } else if before.is_empty() {
        EpochSelection::DownloadAfter
    } else if before.achieved_snr >= good_enough {
        if before.achieved_snr > after.achieved_snr {
            EpochSelection::DownloadBefore
        } else {
            EpochSelection::DownloadAfter
        }
    } else if after.achieved_snr >= good_enough {
        EpochSelection::DownloadAfter
    } else {
        EpochSelection::DownloadBoth
    }
}

/// The selection for one star together with the accumulation of each epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadPlan {
    pub selection: EpochSelection,
    pub before: Accumulation,
    pub after: Accumulation,
}

impl DownloadPlan {
    pub fn new(before: Accumulation, after: Accumulation, good_enough: Snr) -> Self {
        DownloadPlan {
            selection: select_epochs(&before, &after, good_enough),
            before,
            after,
        }
    }

    pub fn accumulation(&self, epoch: InstrumentEpoch) -> &Accumulation {
        match epoch {
            InstrumentEpoch::Before => &self.before,
            InstrumentEpoch::After => &self.after,
        }
    }

    /// Selected epochs with a non-empty prefix, in download order.
    pub fn downloads(&self) -> impl Iterator<Item = (InstrumentEpoch, Accumulation)> + '_ {
        self.selection
            .epochs()
            .iter()
            .map(|epoch| (*epoch, *self.accumulation(*epoch)))
            .filter(|(_, acc)| !acc.is_empty())
    }
}
