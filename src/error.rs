use crate::date_chunks::DateChunk;
use chrono::NaiveDate;
use thiserror::Error;

/// Failure of a single call to the remote service.
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service responded with {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid endpoint: {0}")]
    Url(#[from] url::ParseError),
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("file name {0:?} is not a plain relative path")]
    UnsafeFileName(String),
}

impl RemoteError {
    /// The service answered 404 for the resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

#[derive(Error, Debug)]
#[error("authentication failed: {0}")]
pub struct AuthError(#[from] pub RemoteError);

#[derive(Error, Debug)]
#[error("submission for {chunk} rejected: {source}")]
pub struct SubmissionError {
    pub chunk: DateChunk,
    #[source]
    pub source: RemoteError,
}

#[derive(Error, Debug)]
#[error("status query for task {task_id} failed: {source}")]
pub struct PollError {
    pub task_id: String,
    #[source]
    pub source: RemoteError,
}

#[derive(Error, Debug)]
#[error("unable to list bundle for task {task_id}: {source}")]
pub struct BundleError {
    pub task_id: String,
    #[source]
    pub source: RemoteError,
}

#[derive(Error, Debug)]
#[error("download of {file_name} failed: {source}")]
pub struct DownloadError {
    pub file_name: String,
    #[source]
    pub source: RemoteError,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DateRangeError {
    #[error("start date {start} is after end date {end}")]
    Inverted { start: NaiveDate, end: NaiveDate },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CatalogError {
    #[error("no catalog entry named '{0}'")]
    UnknownProduct(String),
    #[error("catalog entry '{key}' has malformed product id '{product}'")]
    InvalidProductId { key: String, product: String },
    #[error("catalog entry '{0}' lists no layers")]
    NoLayers(String),
    #[error("catalog entry '{0}' is defined more than once")]
    DuplicateKey(String),
    #[error("no products selected")]
    EmptySelection,
}

/// Errors that stop a whole run.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("unable to prepare output directory: {0}")]
    Output(#[from] std::io::Error),
}
