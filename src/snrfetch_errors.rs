use thiserror::Error;

use crate::observations::InstrumentEpoch;

#[derive(Error, Debug)]
pub enum SnrFetchError {
    #[error("Star not found in the catalog: {0}")]
    StarNotFound(String),

    #[error("Invalid sexagesimal coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("HTTP reqwest error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid pattern: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Archive query failed for {star}: {reason}")]
    ArchiveQueryFailed { star: String, reason: String },

    #[error("Malformed DataLink response for {0}: {1}")]
    MalformedDataLink(String, String),

    #[error("Every transfer failed for the {epoch} epoch of {star}")]
    TransferFailed { star: String, epoch: InstrumentEpoch },

    #[error("Unable to write manifest {path}: {source}")]
    ManifestWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest {0}: {1}")]
    MalformedManifest(String, String),

    #[error("Invalid sample list: {0}")]
    InvalidSampleList(String),

    #[error("Retry budget exhausted after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: Box<SnrFetchError> },
}

impl SnrFetchError {
    /// Whether a failed request is worth another attempt.
    ///
    /// Client errors (4xx) and local parsing failures are permanent; timeouts, connection
    /// failures and server errors (5xx) are transient.
    pub fn is_transient(&self) -> bool {
        match self {
            SnrFetchError::ReqwestError(err) => {
                err.is_timeout()
                    || err.is_connect()
                    || err.is_request()
                    || err.is_body()
                    || err.status().is_some_and(|s| s.is_server_error())
            }
            SnrFetchError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            SnrFetchError::IoError(err) => matches!(
                err.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

impl PartialEq for SnrFetchError {
    fn eq(&self, other: &Self) -> bool {
        use SnrFetchError::*;
        match (self, other) {
            (StarNotFound(a), StarNotFound(b)) => a == b,
            (InvalidCoordinate(a), InvalidCoordinate(b)) => a == b,
            (InvalidDate(a), InvalidDate(b)) => a == b,

            // Wrapped foreign errors are not comparable: same variant means equal
            (ReqwestError(_), ReqwestError(_)) => true,
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (JsonError(_), JsonError(_)) => true,
            (RegexError(_), RegexError(_)) => true,

            (
                HttpStatus {
                    status: s1,
                    url: u1,
                },
                HttpStatus {
                    status: s2,
                    url: u2,
                },
            ) => s1 == s2 && u1 == u2,
            (
                ArchiveQueryFailed {
                    star: s1,
                    reason: r1,
                },
                ArchiveQueryFailed {
                    star: s2,
                    reason: r2,
                },
            ) => s1 == s2 && r1 == r2,
            (MalformedDataLink(a1, b1), MalformedDataLink(a2, b2)) => a1 == a2 && b1 == b2,
            (
                TransferFailed {
                    star: s1,
                    epoch: e1,
                },
                TransferFailed {
                    star: s2,
                    epoch: e2,
                },
            ) => s1 == s2 && e1 == e2,
            (ManifestWrite { path: a, .. }, ManifestWrite { path: b, .. }) => a == b,
            (MalformedManifest(a1, b1), MalformedManifest(a2, b2)) => a1 == a2 && b1 == b2,
            (InvalidSampleList(a), InvalidSampleList(b)) => a == b,
            (
                RetryExhausted {
                    attempts: a1,
                    last: l1,
                },
                RetryExhausted {
                    attempts: a2,
                    last: l2,
                },
            ) => a1 == a2 && l1 == l2,

            _ => false,
        }
    }
}
