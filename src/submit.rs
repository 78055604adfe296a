use crate::catalog::LayerRequest;
use crate::date_chunks::DateChunk;
use crate::error::SubmissionError;
use crate::job::Job;
use crate::remote::{AppeearsOps, Token};
use serde::{Deserialize, Serialize};

/// Date format the task endpoint expects.
const API_DATE_FORMAT: &str = "%m-%d-%Y";

/// A named region with the geometry used as the spatial filter of its tasks.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct AreaOfInterest {
    pub name: String,
    /// GeoJSON passed through to the service untouched.
    pub geometry: serde_json::Value,
}

/// Body of a task creation request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskRequest {
    pub task_type: String,
    pub task_name: String,
    pub params: TaskParams,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskParams {
    pub dates: Vec<TaskDates>,
    pub layers: Vec<LayerRequest>,
    pub output: TaskOutput,
    pub geo: serde_json::Value,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskDates {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskOutput {
    pub format: OutputFormat,
    pub projection: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OutputFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

impl TaskRequest {
    pub fn area(
        prefix: &str,
        region: &AreaOfInterest,
        chunk: &DateChunk,
        layers: &[LayerRequest],
    ) -> Self {
        Self {
            task_type: "area".to_string(),
            task_name: format!("{}_{}_{}", prefix, region.name, chunk.period_label()),
            params: TaskParams {
                dates: vec![TaskDates {
                    start_date: chunk.start().format(API_DATE_FORMAT).to_string(),
                    end_date: chunk.end().format(API_DATE_FORMAT).to_string(),
                }],
                layers: layers.to_vec(),
                output: TaskOutput {
                    format: OutputFormat {
                        kind: "geotiff".to_string(),
                    },
                    projection: "geographic".to_string(),
                },
                geo: region.geometry.clone(),
            },
        }
    }
}

/// Outcome of submitting every chunk of one region.
#[derive(Debug, Default)]
pub struct SubmissionBatch {
    pub jobs: Vec<Job>,
    pub failures: Vec<SubmissionError>,
}

/// Creates one remote task per date chunk. Never retries.
pub struct Submitter<'a, R> {
    remote: &'a R,
    task_prefix: String,
}

impl<'a, R: AppeearsOps> Submitter<'a, R> {
    pub fn new(remote: &'a R, task_prefix: &str) -> Self {
        Self {
            remote,
            task_prefix: task_prefix.to_string(),
        }
    }

    pub async fn submit(
        &self,
        region: &AreaOfInterest,
        chunk: &DateChunk,
        layers: &[LayerRequest],
        token: &Token,
    ) -> Result<Job, SubmissionError> {
        let request = TaskRequest::area(&self.task_prefix, region, chunk, layers);
        match self.remote.submit_task(&request, token).await {
            Ok(task_id) => {
                tracing::info!(region = %region.name, %chunk, %task_id, "task submitted");
                Ok(Job::submitted(task_id, &region.name, *chunk))
            }
            Err(source) => Err(SubmissionError {
                chunk: *chunk,
                source,
            }),
        }
    }

    /// Submits every chunk in order. A rejected chunk is reported and skipped.
    pub async fn submit_all(
        &self,
        region: &AreaOfInterest,
        chunks: &[DateChunk],
        layers: &[LayerRequest],
        token: &Token,
    ) -> SubmissionBatch {
        let mut batch = SubmissionBatch::default();
        for chunk in chunks {
            match self.submit(region, chunk, layers, token).await {
                Ok(job) => batch.jobs.push(job),
                Err(e) => {
                    tracing::warn!(region = %region.name, error = %e, "skipping chunk");
                    batch.failures.push(e);
                }
            }
        }
        batch
    }
}
