//! Drives chunking, submission, polling and download for each region in turn.
use crate::catalog::{LayerRequest, ProductCatalog};
use crate::config::Settings;
use crate::date_chunks::{chunk_range, DateChunk};
use crate::download::Downloader;
use crate::error::RunError;
use crate::poller::Poller;
use crate::registry::JobRegistry;
use crate::remote::{AppeearsOps, Token};
use crate::report::{ChunkFailure, RegionReport, RunReport};
use crate::request::HarvestRequest;
use crate::submit::{AreaOfInterest, Submitter};
use std::path::{Path, PathBuf};
use tracing::Instrument;

pub struct Orchestrator<'a, R> {
    remote: &'a R,
    catalog: &'a ProductCatalog,
    settings: &'a Settings,
    output_dir: PathBuf,
}

impl<'a, R: AppeearsOps> Orchestrator<'a, R> {
    pub fn new(remote: &'a R, catalog: &'a ProductCatalog, settings: &'a Settings) -> Self {
        Self {
            remote,
            catalog,
            settings,
            output_dir: settings.output_dir.clone(),
        }
    }

    pub fn with_output_dir(mut self, output_dir: &Path) -> Self {
        self.output_dir = output_dir.to_path_buf();
        self
    }

    /// Harvests every region of `request`, one region at a time.
    ///
    /// Only an unusable product selection or output directory aborts the run;
    /// every other failure is recorded in the returned report.
    pub async fn run(
        &self,
        request: &HarvestRequest,
        token: &Token,
    ) -> Result<RunReport, RunError> {
        let layers = self.catalog.layers_for(&request.products)?;
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let chunks = chunk_range(&request.range, self.settings.chunking.months);
        tracing::info!(
            range = %request.range,
            chunks = chunks.len(),
            regions = request.regions.len(),
            "starting harvest"
        );

        let poller = Poller::new(self.remote, token, self.settings.polling.clone());
        let downloader = Downloader::new(
            self.remote,
            token,
            &self.output_dir,
            self.settings.download.clone(),
        );

        let mut report = RunReport::default();
        for region in &request.regions {
            let span = tracing::info_span!("region", name = %region.name);
            let region_report = self
                .run_region(region, &chunks, &layers, token, &poller, &downloader)
                .instrument(span)
                .await;
            report.regions.push(region_report);
        }
        Ok(report)
    }

    async fn run_region(
        &self,
        region: &AreaOfInterest,
        chunks: &[DateChunk],
        layers: &[LayerRequest],
        token: &Token,
        poller: &Poller<'_, R>,
        downloader: &Downloader<'_, R>,
    ) -> RegionReport {
        let mut report = RegionReport::new(&region.name);
        report.chunks = chunks.len();

        let submitter = Submitter::new(self.remote, &self.settings.task_prefix);
        let batch = submitter.submit_all(region, chunks, layers, token).await;
        report.submitted = batch.jobs.len();
        report.submission_failures = batch
            .failures
            .into_iter()
            .map(ChunkFailure::from)
            .collect();

        if batch.jobs.is_empty() {
            tracing::warn!("no task was accepted, skipping region");
            return report;
        }

        tracing::info!(tasks = batch.jobs.len(), "all chunks submitted, monitoring");
        let mut registry = JobRegistry::new(batch.jobs);
        poller
            .run_until_empty(&mut registry, downloader, &mut report)
            .await;

        tracing::info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            abandoned = report.abandoned.len(),
            "region finished"
        );
        report
    }
}
