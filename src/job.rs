use crate::date_chunks::DateChunk;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a remote task as seen by the poller.
///
/// A failed status query is not a state: the job keeps its last known status
/// and counts the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobStatus {
    Submitted,
    Processing,
    Packaging,
    Done,
    Failed,
    /// Polling gave up after too many consecutive poll errors.
    Abandoned,
}

impl JobStatus {
    /// Maps a status string reported by the service.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status {
            "submitted" | "pending" | "queued" => Some(Self::Submitted),
            "processing" => Some(Self::Processing),
            "packaging" => Some(Self::Packaging),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Abandoned)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Processing => "processing",
            Self::Packaging => "packaging",
            Self::Done => "done",
            Self::Failed => "failed",
            Self::Abandoned => "abandoned",
        };
        f.write_str(s)
    }
}

/// A submitted remote task for one region and one date window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    remote_id: String,
    region: String,
    chunk: DateChunk,
    status: JobStatus,
    failure_reason: Option<String>,
    #[serde(skip)]
    poll_errors: u32,
}

impl Job {
    pub fn submitted(remote_id: String, region: &str, chunk: DateChunk) -> Self {
        Self {
            remote_id,
            region: region.to_string(),
            chunk,
            status: JobStatus::Submitted,
            failure_reason: None,
            poll_errors: 0,
        }
    }

    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn chunk(&self) -> &DateChunk {
        &self.chunk
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Consecutive failed status queries since the last successful one.
    pub fn poll_errors(&self) -> u32 {
        self.poll_errors
    }

    pub(crate) fn observe(&mut self, status: JobStatus, message: Option<String>) {
        self.status = status;
        self.poll_errors = 0;
        if status == JobStatus::Failed {
            self.failure_reason = Some(message.unwrap_or_else(|| "no details".to_string()));
        }
    }

    /// Records a failed status query. Returns the new consecutive error count.
    pub(crate) fn record_poll_error(&mut self) -> u32 {
        self.poll_errors += 1;
        self.poll_errors
    }

    pub(crate) fn abandon(&mut self, reason: String) {
        self.status = JobStatus::Abandoned;
        self.failure_reason = Some(reason);
    }
}
