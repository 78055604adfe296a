use crate::appeears::DEFAULT_API_URL;
use crate::date_chunks::{DEFAULT_CHUNK_MONTHS, MAX_CHUNK_MONTHS};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "slow-appeears.toml";

/// Settings loaded from `slow-appeears.toml`. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: Url,
    /// Root of the `{region}/{product_group}/{period}/` output tree.
    pub output_dir: PathBuf,
    /// Product catalog to use instead of the built-in ECOSTRESS table.
    pub catalog_path: Option<PathBuf>,
    /// Task names are `{task_prefix}_{region}_{start}_to_{end}`.
    pub task_prefix: String,
    pub chunking: ChunkSettings,
    pub polling: PollSettings,
    pub download: DownloadSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkSettings {
    /// Longest window submitted as a single task.
    pub months: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_secs: u64,
    /// Consecutive failed status queries after which a job is abandoned.
    /// Zero means poll forever.
    pub max_poll_errors: u32,
    /// Status queries in flight at once during a cycle.
    pub concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSettings {
    pub product_group: String,
    /// Only bundle files with this extension are downloaded.
    pub extension: String,
    /// Write buffer size used while streaming a file to disk.
    pub chunk_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("Default API url should always parse"),
            output_dir: PathBuf::from("outputs"),
            catalog_path: None,
            task_prefix: "ECOSTRESS".to_string(),
            chunking: ChunkSettings::default(),
            polling: PollSettings::default(),
            download: DownloadSettings::default(),
        }
    }
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            months: DEFAULT_CHUNK_MONTHS,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: 120,
            max_poll_errors: 30,
            concurrency: 1,
        }
    }
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            product_group: "ECOSTRESS_AppEEARS".to_string(),
            extension: "tif".to_string(),
            chunk_bytes: 1024 * 1024,
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Settings {
    /// Reads settings from `path`, falling back to defaults if the file is absent.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        // Endpoints are joined onto the base, which drops a last segment without '/'
        if !self.api_url.path().ends_with('/') {
            bail!("api_url must end with '/'");
        }
        if !(1..=MAX_CHUNK_MONTHS).contains(&self.chunking.months) {
            bail!("chunking.months must be between 1 and {MAX_CHUNK_MONTHS}");
        }
        if self.polling.concurrency == 0 {
            bail!("polling.concurrency must be at least 1");
        }
        if self.download.chunk_bytes == 0 {
            bail!("download.chunk_bytes must be at least 1");
        }
        if self.download.extension.trim_start_matches('.').is_empty() {
            bail!("download.extension must not be empty");
        }
        Ok(())
    }
}
