use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the cloud client.
///
/// Transport failures are never retried; a job that was already accepted is
/// only ever re-polled. Service-reported query failures and malformed status
/// documents come back as [`Error::RemoteQuery`] and [`Error::Protocol`]
/// instead of panics or bare strings.
#[derive(Debug, Error)]
pub enum Error {
    #[error("authentication failed: {reason}")]
    Auth { reason: String },

    #[error("upload table not supported: {0}")]
    UnsupportedUpload(String),

    #[error("upload table has {rows} rows, the service accepts at most {limit}")]
    UploadTooLarge { rows: usize, limit: usize },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected service response: {diagnostic}")]
    Protocol { diagnostic: String },

    #[error("query failed on the service: {message}")]
    RemoteQuery { message: String },

    #[error("job did not reach a terminal phase after waiting {waited:?}")]
    DeadlineExceeded { waited: Duration },

    #[error("failed to read FITS result: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("failed to decode result: {reason}")]
    Decode { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
