//! # snrfetch environment state
//!
//! This module defines [`FetchEnv`], the **shared environment object** handed to every
//! network-facing collaborator of the campaign (catalog lookup, archive query, file
//! transfer). It bundles:
//!
//! - A persistent async **HTTP client** ([`reqwest::Client`]) with a global timeout.
//! - The [`RetryPolicy`] wrapping every call to the archive services.
//! - An optional ESO **bearer token**, required for proprietary data.
//!
//! ## Structure
//!
//! ```text
//! FetchEnv
//! ├── http_client  (reqwest::Client, timeout)
//! ├── retry        (RetryPolicy)
//! └── token        (Option<String>)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use snrfetch::env_state::FetchEnv;
//! use snrfetch::retry::RetryPolicy;
//!
//! # async fn demo() -> Result<(), snrfetch::snrfetch_errors::SnrFetchError> {
//! let env = FetchEnv::new(Duration::from_secs(60), RetryPolicy::default(), None)?;
//! let page = env
//!     .get_text("https://simbad.cds.unistra.fr/simbad/sim-script", &[("script", "HIP1234")])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Notes
//!
//! - The environment is passed explicitly to the collaborators, never stored in a
//!   global, so tests can run the campaign against fakes without any network access.
//! - `FetchEnv` is cheap to clone: [`reqwest::Client`] is reference counted.
use std::time::Duration;

use camino::Utf8Path;
use reqwest::{Client, RequestBuilder, Response};
use tokio::{fs::File, io::AsyncWriteExt};
use tokio_stream::StreamExt;
use tracing::debug;

use crate::{retry::RetryPolicy, snrfetch_errors::SnrFetchError};

/// This object is passed to the network collaborators of the library
///
/// # Fields
///
/// * `http_client` - The reqwest client used for every HTTP request
/// * `retry` - The retry policy wrapping each request
/// * `token` - An optional ESO bearer token
#[derive(Debug, Clone)]
pub struct FetchEnv {
    pub http_client: Client,
    pub retry: RetryPolicy,
    token: Option<String>,
}

impl FetchEnv {
    /// Create a new environment
    ///
    /// Arguments
    /// ---------
    /// * `timeout`: timeout applied to each request, connection and body included
    /// * `retry`: the retry policy for every call
    /// * `token`: optional ESO bearer token
    ///
    /// Return
    /// ------
    /// * A new environment, or an error if the TLS backend cannot be initialized
    pub fn new(
        timeout: Duration,
        retry: RetryPolicy,
        token: Option<String>,
    ) -> Result<Self, SnrFetchError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("snrfetch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(FetchEnv {
            http_client,
            retry,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_checked(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Response, SnrFetchError> {
        let request = self.authorized(self.http_client.get(url).query(query));
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SnrFetchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    /// Perform a GET request and read the body as text, with retries.
    ///
    /// Arguments
    /// ---------
    /// * `url`: the endpoint
    /// * `query`: the query-string parameters, url-encoded by reqwest
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<String, SnrFetchError> {
        self.retry
            .run(url, move || async move {
                let response = self.send_checked(url, query).await?;
                Ok(response.text().await?)
            })
            .await
    }

    /// Stream the body of a GET request into a file, with retries.
    ///
    /// The body is written to `<path>.part` and renamed once complete, so an interrupted
    /// transfer never leaves a truncated file under the final name.
    ///
    /// Arguments
    /// ---------
    /// * `url`: the file URL
    /// * `path`: the final destination of the file
    ///
    /// Return
    /// ------
    /// * The number of bytes written
    pub async fn download_to(&self, url: &str, path: &Utf8Path) -> Result<u64, SnrFetchError> {
        let part_buf = path.with_extension(match path.extension() {
            Some(ext) => format!("{ext}.part"),
            None => "part".to_string(),
        });
        let part_path = part_buf.as_path();

        let written = self
            .retry
            .run(url, move || async move {
                let response = self.send_checked(url, &[]).await?;
                let mut file = File::create(part_path).await?;
                let mut stream = response.bytes_stream();
                let mut written = 0u64;

                while let Some(chunk_result) = stream.next().await {
                    let chunk = chunk_result?;
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }

                file.flush().await?;
                Ok(written)
            })
            .await;

        match written {
            Ok(written) => {
                tokio::fs::rename(part_path, path).await?;
                debug!("Downloaded {url} → {path} ({written} bytes)");
                Ok(written)
            }
            Err(err) => {
                let _ = tokio::fs::remove_file(part_path).await;
                Err(err)
            }
        }
    }
}
