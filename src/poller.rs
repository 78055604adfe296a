use crate::config::PollSettings;
use crate::download::Downloader;
use crate::error::PollError;
use crate::job::{Job, JobStatus};
use crate::registry::JobRegistry;
use crate::remote::{AppeearsOps, Token};
use crate::report::{CompletedJob, RegionReport};
use futures_util::stream::{self, StreamExt};

/// Jobs that left the registry during one poll cycle.
#[derive(Debug, Default)]
pub struct CycleOutcome {
    pub done: Vec<Job>,
    pub failed: Vec<Job>,
    pub abandoned: Vec<Job>,
    /// Jobs still registered after the cycle.
    pub pending: usize,
}

pub struct Poller<'a, R> {
    remote: &'a R,
    token: &'a Token,
    settings: PollSettings,
}

impl<'a, R: AppeearsOps> Poller<'a, R> {
    pub fn new(remote: &'a R, token: &'a Token, settings: PollSettings) -> Self {
        Self {
            remote,
            token,
            settings,
        }
    }

    /// Queries every registered job once and removes those that became terminal.
    ///
    /// The registry is emptied for the duration of the cycle and the polled
    /// jobs are written back together at the end.
    pub async fn run_cycle(&self, registry: &mut JobRegistry) -> CycleOutcome {
        let snapshot = registry.take();
        let polled: Vec<Job> = stream::iter(snapshot)
            .map(|job| self.poll_job(job))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut outcome = CycleOutcome::default();
        for job in registry.replace(polled) {
            match job.status() {
                JobStatus::Done => outcome.done.push(job),
                JobStatus::Failed => outcome.failed.push(job),
                _ => outcome.abandoned.push(job),
            }
        }
        outcome.pending = registry.len();
        outcome
    }

    async fn poll_job(&self, mut job: Job) -> Job {
        let task_id = job.remote_id().to_string();
        match self.remote.task_status(&task_id, self.token).await {
            Ok(report) => match JobStatus::from_remote(&report.status) {
                Some(status) => {
                    if status != job.status() {
                        tracing::info!(
                            %task_id,
                            from = %job.status(),
                            to = %status,
                            "status changed"
                        );
                    }
                    job.observe(status, report.message);
                }
                None => {
                    let reason = format!("unrecognized status '{}'", report.status);
                    self.poll_failed(&mut job, reason);
                }
            },
            Err(source) => {
                let reason = if source.is_not_found() {
                    format!("task {task_id} not found")
                } else {
                    PollError { task_id: task_id.clone(), source }.to_string()
                };
                self.poll_failed(&mut job, reason);
            }
        }
        job
    }

    fn poll_failed(&self, job: &mut Job, reason: String) {
        let errors = job.record_poll_error();
        let max = self.settings.max_poll_errors;
        if max > 0 && errors >= max {
            tracing::error!(task_id = %job.remote_id(), errors, %reason, "giving up on task");
            job.abandon(format!("{errors} consecutive poll errors, last: {reason}"));
        } else {
            tracing::warn!(
                task_id = %job.remote_id(),
                errors,
                %reason,
                "will check again next cycle"
            );
        }
    }

    /// Polls until the registry is empty, downloading each job that completes.
    pub async fn run_until_empty(
        &self,
        registry: &mut JobRegistry,
        downloader: &Downloader<'_, R>,
        report: &mut RegionReport,
    ) {
        while !registry.is_empty() {
            tracing::info!(pending = registry.len(), "checking task status");
            let outcome = self.run_cycle(registry).await;
            report.poll_cycles += 1;

            for job in outcome.done {
                tracing::info!(task_id = %job.remote_id(), period = %job.chunk(), "task done");
                let result = downloader.download(&job).await;
                if let Err(e) = &result {
                    tracing::error!(error = %e, "bundle not downloaded");
                }
                report.completed.push(CompletedJob::new(job, result));
            }
            for job in outcome.failed {
                tracing::error!(
                    task_id = %job.remote_id(),
                    period = %job.chunk(),
                    reason = job.failure_reason().unwrap_or_default(),
                    "task failed on the service"
                );
                report.failed.push(job);
            }
            report.abandoned.extend(outcome.abandoned);

            if !registry.is_empty() {
                tracing::info!(
                    pending = outcome.pending,
                    "next check in {}s",
                    self.settings.interval_secs
                );
                tokio::time::sleep(self.settings.interval()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DownloadSettings;
    use crate::date_chunks::DateRange;
    use crate::fake::FakeAppeears;
    use chrono::NaiveDate;

    fn job(id: &str) -> Job {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2018, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2018, 6, 30).unwrap(),
        )
        .unwrap();
        Job::submitted(id.to_string(), "atto", range)
    }

    fn settings(max_poll_errors: u32) -> PollSettings {
        PollSettings {
            interval_secs: 0,
            max_poll_errors,
            concurrency: 1,
        }
    }

    #[tokio::test]
    async fn test_terminal_jobs_leave_on_the_same_cycle() {
        let remote = FakeAppeears::new();
        remote.push_status("a", "done");
        remote.push_status("b", "processing");
        remote.push_status("b", "done");
        remote.push_failed("c", "Task exceeded the size limit");
        let token = remote.token();
        let poller = Poller::new(&remote, &token, settings(0));
        let mut registry = JobRegistry::new(vec![job("a"), job("b"), job("c")]);

        let outcome = poller.run_cycle(&mut registry).await;
        assert_eq!(outcome.done.len(), 1);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(
            outcome.failed[0].failure_reason(),
            Some("Task exceeded the size limit")
        );
        assert_eq!(outcome.pending, 1);
        assert!(registry.get("a").is_none());
        assert!(registry.get("c").is_none());

        let outcome = poller.run_cycle(&mut registry).await;
        assert_eq!(outcome.done[0].remote_id(), "b");
        assert!(registry.is_empty());
        assert_eq!(remote.status_calls(), vec!["a", "b", "c", "b"]);
    }

    #[tokio::test]
    async fn test_poll_error_keeps_job_registered() {
        let remote = FakeAppeears::new();
        remote.push_status("a", "processing");
        remote.push_status_error("a", 502);
        remote.push_status("a", "packaging");
        let token = remote.token();
        let poller = Poller::new(&remote, &token, settings(30));
        let mut registry = JobRegistry::new(vec![job("a")]);

        poller.run_cycle(&mut registry).await;
        assert_eq!(registry.get("a").unwrap().status(), JobStatus::Processing);

        let outcome = poller.run_cycle(&mut registry).await;
        assert_eq!(outcome.pending, 1);
        let polled = registry.get("a").unwrap();
        assert_eq!(polled.status(), JobStatus::Processing);
        assert_eq!(polled.poll_errors(), 1);

        poller.run_cycle(&mut registry).await;
        assert_eq!(registry.get("a").unwrap().status(), JobStatus::Packaging);
        assert_eq!(remote.status_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_and_unknown_status_are_poll_errors() {
        let remote = FakeAppeears::new();
        remote.push_status("odd", "exploded");
        let token = remote.token();
        let poller = Poller::new(&remote, &token, settings(0));
        let mut registry = JobRegistry::new(vec![job("missing"), job("odd")]);

        for _ in 0..5 {
            let outcome = poller.run_cycle(&mut registry).await;
            assert_eq!(outcome.pending, 2);
        }
        assert_eq!(registry.get("missing").unwrap().poll_errors(), 5);
        assert_eq!(registry.get("odd").unwrap().status(), JobStatus::Submitted);
    }

    #[tokio::test]
    async fn test_job_abandoned_after_max_poll_errors() {
        let remote = FakeAppeears::new();
        remote.push_status_error("a", 500);
        let token = remote.token();
        let poller = Poller::new(&remote, &token, settings(3));
        let mut registry = JobRegistry::new(vec![job("a")]);

        assert_eq!(poller.run_cycle(&mut registry).await.pending, 1);
        assert_eq!(poller.run_cycle(&mut registry).await.pending, 1);
        let outcome = poller.run_cycle(&mut registry).await;
        assert_eq!(outcome.abandoned.len(), 1);
        assert_eq!(outcome.abandoned[0].status(), JobStatus::Abandoned);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_cycle_queries_each_job_once() {
        let remote = FakeAppeears::new();
        for id in ["a", "b", "c", "d"] {
            remote.push_status(id, "processing");
        }
        let token = remote.token();
        let mut poll_settings = settings(0);
        poll_settings.concurrency = 3;
        let poller = Poller::new(&remote, &token, poll_settings);
        let mut registry = JobRegistry::new(vec![job("a"), job("b"), job("c"), job("d")]);

        poller.run_cycle(&mut registry).await;
        let mut calls = remote.status_calls();
        calls.sort();
        assert_eq!(calls, vec!["a", "b", "c", "d"]);
        let order: Vec<_> = registry.iter().map(|j| j.remote_id()).collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_run_until_empty_downloads_completed_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let remote = FakeAppeears::new();
        remote.push_status("a", "processing");
        remote.push_status("a", "done");
        remote.push_failed("b", "No data for the requested dates");
        remote.set_bundle("a", &["a.tif"], b"raster");
        let token = remote.token();
        let poller = Poller::new(&remote, &token, settings(0));
        let downloader = Downloader::new(&remote, &token, dir.path(), DownloadSettings::default());
        let mut registry = JobRegistry::new(vec![job("a"), job("b")]);
        let mut report = RegionReport::new("atto");

        poller
            .run_until_empty(&mut registry, &downloader, &mut report)
            .await;
        assert!(registry.is_empty());
        assert_eq!(report.poll_cycles, 2);
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].downloaded, vec!["a.tif"]);
        assert_eq!(report.failed.len(), 1);
        assert!(downloader.destination(&job("a"), "a.tif").unwrap().exists());
    }
}
