//! # Archive collaborators
//!
//! The campaign talks to the outside world through three narrow traits:
//!
//! | Trait              | Role                                              | Default implementation          |
//! |--------------------|---------------------------------------------------|---------------------------------|
//! | [`CatalogLookup`]  | star name → sexagesimal coordinates               | [`simbad::SimbadCatalog`]       |
//! | [`ArchiveQuery`]   | sky cone (or star name) → raw [`ObservationRecord`]s | [`eso_tap::EsoTapArchive`]   |
//! | [`FileTransfer`]   | archive identifiers → files in a directory        | [`transfer::EsoTransfer`]       |
//!
//! The default implementations share one [`FetchEnv`](crate::env_state::FetchEnv) (HTTP
//! client, retry policy, token). Tests substitute in-memory fakes, so the selection and
//! download logic never needs the network.
pub mod eso_tap;
pub mod simbad;
pub mod transfer;

use std::future::Future;

use camino::Utf8Path;

use crate::{
    constants::{ArcFile, ArcSec, Degree},
    conversion::{arcsec_to_deg, parse_dec_to_deg, parse_ra_to_deg},
    observations::{ObservationRecord, SkyPosition},
    snrfetch_errors::SnrFetchError,
};

/// Catalog coordinates of a star, as sexagesimal strings (`"03 49 25.17"`, `"+40 28 40.5"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub ra: String,
    pub dec: String,
}

impl CatalogEntry {
    /// Parse the coordinates into degrees.
    pub fn position(&self) -> Result<SkyPosition, SnrFetchError> {
        Ok(SkyPosition {
            ra: parse_ra_to_deg(&self.ra)?,
            dec: parse_dec_to_deg(&self.dec)?,
        })
    }
}

/// Circular region of the sky searched around a star.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConeSearch {
    pub center: SkyPosition,
    pub radius: Degree,
}

impl ConeSearch {
    /// Smallest cone holding the square window `center ± half_width` of the candidate
    /// filter, with `half_width` in arcseconds.
    pub fn covering_window(center: SkyPosition, half_width: ArcSec) -> Self {
        ConeSearch {
            center,
            radius: arcsec_to_deg(half_width) * std::f64::consts::SQRT_2,
        }
    }
}

/// Per-identifier result of a transfer batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferReport {
    pub succeeded: Vec<ArcFile>,
    /// Failed identifiers with the reason of the failure
    pub failed: Vec<(ArcFile, String)>,
}

impl TransferReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn has_succeeded(&self, arcfile: &str) -> bool {
        self.succeeded.iter().any(|id| id == arcfile)
    }
}

pub trait CatalogLookup {
    /// Resolve a star identifier into catalog coordinates.
    ///
    /// Return
    /// ----------
    /// * [`SnrFetchError::StarNotFound`] when the catalog does not know the star.
    fn resolve(&self, star: &str)
        -> impl Future<Output = Result<CatalogEntry, SnrFetchError>> + Send;
}

pub trait ArchiveQuery {
    /// Every archive spectrum taken with one of `instruments` inside `cone`, unfiltered.
    ///
    /// Without a cone (catalog position unusable), the archive is searched by the target
    /// name `star` instead.
    fn query(
        &self,
        star: &str,
        cone: Option<ConeSearch>,
        instruments: &[String],
    ) -> impl Future<Output = Result<Vec<ObservationRecord>, SnrFetchError>> + Send;
}

pub trait FileTransfer {
    /// Retrieve each identifier into `dir`.
    ///
    /// A failing identifier does not stop the batch; it is listed in
    /// [`TransferReport::failed`].
    fn fetch(
        &self,
        arcfiles: &[ArcFile],
        dir: &Utf8Path,
    ) -> impl Future<Output = TransferReport> + Send;
}
