use crate::config::DownloadSettings;
use crate::error::{BundleError, DownloadError, RemoteError};
use crate::job::Job;
use crate::remote::{AppeearsOps, BundleFile, Token};
use futures_util::TryStreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Files handled while downloading one task's bundle.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<DownloadError>,
}

/// Retrieves the raster files of completed tasks into the output tree.
pub struct Downloader<'a, R> {
    remote: &'a R,
    token: &'a Token,
    root: PathBuf,
    settings: DownloadSettings,
}

impl<'a, R: AppeearsOps> Downloader<'a, R> {
    pub fn new(
        remote: &'a R,
        token: &'a Token,
        root: &Path,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            remote,
            token,
            root: root.to_path_buf(),
            settings,
        }
    }

    /// `root/{region}/{product_group}/{period}/{file_name}`
    ///
    /// `None` when `file_name` is empty, absolute or climbs out of the period
    /// folder.
    pub fn destination(&self, job: &Job, file_name: &str) -> Option<PathBuf> {
        let name = Path::new(file_name);
        let plain = name
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !plain || name.as_os_str().is_empty() {
            return None;
        }
        Some(
            self.root
                .join(job.region())
                .join(&self.settings.product_group)
                .join(job.chunk().period_label())
                .join(name),
        )
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        let wanted = self.settings.extension.trim_start_matches('.');
        Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext == wanted)
    }

    /// Downloads every accepted file of the job's bundle that is not on disk yet.
    ///
    /// Failed files are collected in the report; only a failure to list the
    /// bundle is returned as an error.
    pub async fn download(&self, job: &Job) -> Result<DownloadReport, BundleError> {
        let task_id = job.remote_id();
        let files = self
            .remote
            .list_bundle(task_id, self.token)
            .await
            .map_err(|source| BundleError {
                task_id: task_id.to_string(),
                source,
            })?;

        let mut report = DownloadReport::default();
        let wanted: Vec<BundleFile> = files
            .into_iter()
            .filter(|f| self.accepts(&f.file_name))
            .collect();
        if wanted.is_empty() {
            tracing::warn!(
                %task_id,
                extension = %self.settings.extension,
                "bundle holds no files to download"
            );
            return Ok(report);
        }

        tracing::info!(
            %task_id,
            files = wanted.len(),
            period = %job.chunk(),
            "downloading bundle"
        );
        for file in &wanted {
            let Some(dst) = self.destination(job, &file.file_name) else {
                let e = DownloadError {
                    file_name: file.file_name.clone(),
                    source: RemoteError::UnsafeFileName(file.file_name.clone()),
                };
                tracing::error!(%task_id, error = %e, "refusing file");
                report.failed.push(e);
                continue;
            };
            if dst.exists() {
                tracing::info!(file = %file.file_name, "already present");
                report.skipped.push(file.file_name.clone());
                continue;
            }

            match self.try_download(task_id, file, &dst).await {
                Ok(bytes) => {
                    tracing::info!(file = %file.file_name, bytes, "downloaded");
                    report.downloaded.push(file.file_name.clone());
                }
                Err(source) => {
                    let _ = fs::remove_file(partial_path(&dst)).await;
                    let e = DownloadError {
                        file_name: file.file_name.clone(),
                        source,
                    };
                    tracing::error!(%task_id, error = %e, "continuing with remaining files");
                    report.failed.push(e);
                }
            }
        }
        Ok(report)
    }

    async fn try_download(
        &self,
        task_id: &str,
        file: &BundleFile,
        dst: &Path,
    ) -> Result<u64, RemoteError> {
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut body = self
            .remote
            .fetch_file(task_id, &file.file_id, self.token)
            .await?;
        let total = body.content_length.or(file.file_size);

        // Written under a temporary name so an interrupted transfer never
        // leaves a file at the destination path
        let partial = partial_path(dst);
        let out = fs::File::create(&partial).await?;
        let mut writer = BufWriter::with_capacity(self.settings.chunk_bytes, out);

        let mut written = 0_u64;
        let mut next_mark = 10_u64;
        while let Some(bytes) = body.chunks.try_next().await? {
            writer.write_all(&bytes).await?;
            written += bytes.len() as u64;

            if let Some(total) = total.filter(|t| *t > 0) {
                let percent = written * 100 / total;
                if percent >= next_mark {
                    tracing::debug!(file = %file.file_name, percent, "progress");
                    next_mark = percent / 10 * 10 + 10;
                }
            }
        }
        writer.flush().await?;
        drop(writer);

        fs::rename(&partial, dst).await?;
        Ok(written)
    }
}

fn partial_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dst.with_file_name(name)
}
