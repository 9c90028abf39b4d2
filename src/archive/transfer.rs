//! # ESO file transfer
//!
//! For each archive identifier, [`EsoTransfer`] retrieves:
//!
//! 1. the primary product from the data portal, saved as `<arcfile>.fits`;
//! 2. the ancillary bundle: the ESO DataLink service lists the files attached to the
//!    product, the row whose `semantics` is `#auxiliary` (or `#progenitor` for older
//!    products) names the bundle, saved as `<bundle>.tar`.
//!
//! The DataLink answer is a JSON table:
//!
//! ```json
//! {
//!   "fields": [{"name": "ID"}, {"name": "access_url"}, {"name": "semantics"}, ...],
//!   "data": [["ivo://eso.org/ID?ADP...", "https://dataportal.eso.org/dataPortal/file/ADP...", "#auxiliary", ...]]
//! }
//! ```
//!
//! Columns are located by name, never by position. `:` is not portable in file names and
//! is replaced by `_`, as the ESO download scripts do.
//!
//! Transfers run sequentially; a failing identifier is reported and the batch goes on.
use camino::{Utf8Path, Utf8PathBuf};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{FileTransfer, TransferReport};
use crate::{
    constants::{ArcFile, ESO_DATALINK_URL, ESO_DATAPORTAL_URL},
    env_state::FetchEnv,
    snrfetch_errors::SnrFetchError,
};

const ANCILLARY_SEMANTICS: [&str; 2] = ["#auxiliary", "#progenitor"];

#[derive(Debug, Clone)]
pub struct EsoTransfer {
    env: FetchEnv,
    dataportal_url: String,
    datalink_url: String,
    with_ancillary: bool,
}

impl EsoTransfer {
    pub fn new(env: FetchEnv) -> Self {
        EsoTransfer {
            env,
            dataportal_url: ESO_DATAPORTAL_URL.to_string(),
            datalink_url: ESO_DATALINK_URL.to_string(),
            with_ancillary: true,
        }
    }

    /// Point the transfer at other data portal and DataLink endpoints.
    pub fn with_urls(mut self, dataportal_url: &str, datalink_url: &str) -> Self {
        self.dataportal_url = dataportal_url.trim_end_matches('/').to_string();
        self.datalink_url = datalink_url.to_string();
        self
    }

    /// Whether the ancillary bundle is retrieved along with each primary file.
    pub fn with_ancillary(mut self, with_ancillary: bool) -> Self {
        self.with_ancillary = with_ancillary;
        self
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/{name}", self.dataportal_url)
    }

    /// Name of the ancillary bundle of `arcfile`, `None` if the product has none.
    async fn ancillary_name(&self, arcfile: &str) -> Result<Option<String>, SnrFetchError> {
        let id = format!("ivo://eso.org/ID?{arcfile}");
        let body = self
            .env
            .get_text(
                &self.datalink_url,
                &[("ID", id.as_str()), ("RESPONSEFORMAT", "json")],
            )
            .await?;
        parse_datalink(arcfile, &body)
    }

    /// Retrieve one identifier: primary file, then its bundle.
    async fn fetch_one(&self, arcfile: &str, dir: &Utf8Path) -> Result<(), SnrFetchError> {
        let primary = dir.join(format!("{}.fits", file_stem(arcfile)));
        let bytes = self.env.download_to(&self.file_url(arcfile), &primary).await?;
        debug!("{arcfile}: primary file {primary} ({bytes} bytes)");

        if !self.with_ancillary {
            return Ok(());
        }

        match self.ancillary_name(arcfile).await? {
            Some(bundle) => {
                let bundle_path = bundle_path(dir, &bundle);
                let bytes = self
                    .env
                    .download_to(&self.file_url(&bundle), &bundle_path)
                    .await?;
                debug!("{arcfile}: ancillary bundle {bundle_path} ({bytes} bytes)");
            }
            None => warn!("{arcfile}: no ancillary bundle listed by DataLink"),
        }
        Ok(())
    }
}

/// File name of an archive identifier, `:` replaced by `_`.
pub fn file_stem(arcfile: &str) -> String {
    arcfile.trim().replace(':', "_")
}

fn bundle_path(dir: &Utf8Path, bundle: &str) -> Utf8PathBuf {
    dir.join(format!("{}.tar", file_stem(bundle)))
}

/// Index of the column `name` in the `fields` (or `columns`) header of a DataLink table.
fn column_index(header: &[Value], name: &str) -> Option<usize> {
    header.iter().position(|field| {
        field
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| field.as_str())
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    })
}

/// Find the ancillary bundle in a DataLink JSON answer.
///
/// Arguments
/// -----------------
/// * `arcfile`: the queried identifier, used in the errors
/// * `body`: the raw JSON answer
///
/// Return
/// ----------
/// * The bundle name (last path segment of its `access_url`), `None` if no row has an
///   ancillary semantics, or [`SnrFetchError::MalformedDataLink`] if the table cannot be read.
pub fn parse_datalink(arcfile: &str, body: &str) -> Result<Option<String>, SnrFetchError> {
    let malformed =
        |reason: &str| SnrFetchError::MalformedDataLink(arcfile.to_string(), reason.to_string());

    let table: Value = serde_json::from_str(body)?;
    let header = table
        .get("fields")
        .or_else(|| table.get("columns"))
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("no column header"))?;
    let rows = table
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("no data rows"))?;

    let semantics_idx =
        column_index(header, "semantics").ok_or_else(|| malformed("no semantics column"))?;
    let url_idx =
        column_index(header, "access_url").ok_or_else(|| malformed("no access_url column"))?;

    let access_url = ANCILLARY_SEMANTICS.iter().find_map(|wanted| {
        rows.iter().find_map(|row| {
            let row = row.as_array()?;
            let semantics = row.get(semantics_idx)?.as_str()?;
            (semantics == *wanted)
                .then(|| row.get(url_idx).and_then(Value::as_str))
                .flatten()
        })
    });

    let Some(access_url) = access_url else {
        return Ok(None);
    };

    let path = access_url.split(['?', '#']).next().unwrap_or(access_url);
    match path.rsplit('/').next().filter(|name| !name.is_empty()) {
        Some(name) => Ok(Some(name.to_string())),
        None => Err(malformed(&format!("no file name in {access_url}"))),
    }
}

impl FileTransfer for EsoTransfer {
    async fn fetch(&self, arcfiles: &[ArcFile], dir: &Utf8Path) -> TransferReport {
        let mut report = TransferReport::default();

        for (i, arcfile) in arcfiles.iter().enumerate() {
            match self.fetch_one(arcfile, dir).await {
                Ok(()) => {
                    info!("[{}/{}] {arcfile} downloaded", i + 1, arcfiles.len());
                    report.succeeded.push(arcfile.clone());
                }
                Err(err) => {
                    warn!("[{}/{}] {arcfile} failed: {err}", i + 1, arcfiles.len());
                    report.failed.push((arcfile.clone(), err.to_string()));
                }
            }
        }

        report
    }
}
