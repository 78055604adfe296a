//! Operations the orchestrator needs from the processing service.
use crate::error::RemoteError;
use crate::submit::TaskRequest;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer token obtained from the service login.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(****)")
    }
}

/// Status report for a task, as returned by the status endpoint.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct RemoteStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// One entry of a completed task's bundle.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct BundleFile {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Streamed body of a bundle file.
pub struct FileBody {
    pub content_length: Option<u64>,
    pub chunks: BoxStream<'static, Result<Vec<u8>, RemoteError>>,
}

pub trait AppeearsOps {
    /// Creates a task and returns the id the service assigned to it.
    async fn submit_task(&self, request: &TaskRequest, token: &Token)
        -> Result<String, RemoteError>;

    async fn task_status(&self, task_id: &str, token: &Token) -> Result<RemoteStatus, RemoteError>;

    async fn list_bundle(&self, task_id: &str, token: &Token)
        -> Result<Vec<BundleFile>, RemoteError>;

    async fn fetch_file(
        &self,
        task_id: &str,
        file_id: &str,
        token: &Token,
    ) -> Result<FileBody, RemoteError>;
}
