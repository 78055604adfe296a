use crate::date_chunks::DateChunk;
use crate::download::DownloadReport;
use crate::error::{BundleError, SubmissionError};
use crate::job::Job;
use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize, Debug, Default)]
pub struct RunReport {
    pub regions: Vec<RegionReport>,
}

#[derive(Serialize, Debug, Default)]
pub struct RegionReport {
    pub region: String,
    pub chunks: usize,
    pub submitted: usize,
    pub poll_cycles: u32,
    pub submission_failures: Vec<ChunkFailure>,
    pub completed: Vec<CompletedJob>,
    pub failed: Vec<Job>,
    pub abandoned: Vec<Job>,
}

#[derive(Serialize, Debug)]
pub struct ChunkFailure {
    pub chunk: DateChunk,
    pub reason: String,
}

#[derive(Serialize, Debug)]
pub struct CompletedJob {
    pub job: Job,
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed_files: Vec<FileFailure>,
    pub bundle_error: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct FileFailure {
    pub file_name: String,
    pub reason: String,
}

impl From<SubmissionError> for ChunkFailure {
    fn from(e: SubmissionError) -> Self {
        Self {
            chunk: e.chunk,
            reason: e.source.to_string(),
        }
    }
}

impl CompletedJob {
    pub fn new(job: Job, result: Result<DownloadReport, BundleError>) -> Self {
        match result {
            Ok(report) => Self {
                job,
                downloaded: report.downloaded,
                skipped: report.skipped,
                failed_files: report
                    .failed
                    .into_iter()
                    .map(|e| FileFailure {
                        file_name: e.file_name,
                        reason: e.source.to_string(),
                    })
                    .collect(),
                bundle_error: None,
            },
            Err(e) => Self {
                job,
                downloaded: vec![],
                skipped: vec![],
                failed_files: vec![],
                bundle_error: Some(e.source.to_string()),
            },
        }
    }
}

impl RegionReport {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Default::default()
        }
    }
}

impl RunReport {
    pub fn files_downloaded(&self) -> usize {
        self.completed().map(|c| c.downloaded.len()).sum()
    }

    pub fn files_failed(&self) -> usize {
        self.completed().map(|c| c.failed_files.len()).sum()
    }

    pub fn jobs_completed(&self) -> usize {
        self.completed().count()
    }

    pub fn jobs_failed(&self) -> usize {
        self.regions
            .iter()
            .map(|r| r.failed.len() + r.abandoned.len())
            .sum()
    }

    fn completed(&self) -> impl Iterator<Item = &CompletedJob> {
        self.regions.iter().flat_map(|r| r.completed.iter())
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
