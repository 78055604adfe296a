use crate::date_chunks::DateRange;
use crate::submit::AreaOfInterest;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything the orchestrator needs to run, resolved from a request file.
#[derive(Clone, Debug, PartialEq)]
pub struct HarvestRequest {
    pub regions: Vec<AreaOfInterest>,
    pub range: DateRange,
    /// Catalog keys of the products to request.
    pub products: Vec<String>,
}

/// On-disk form of a request, e.g.
///
/// ```toml
/// start_date = "2018-01-01"
/// end_date = "2018-12-31"
/// products = ["ECOSTRESS_LST_Daily_70m (ECO_L2T_LSTE.002)"]
///
/// [[regions]]
/// name = "buffer-ATTO"
/// geometry = "aois/buffer-ATTO.geojson"
/// ```
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RequestFile {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub products: Vec<String>,
    pub regions: Vec<RegionEntry>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RegionEntry {
    pub name: String,
    /// GeoJSON file, relative to the request file.
    pub geometry: PathBuf,
}

impl RequestFile {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let request: Self = toml::from_str(&content)?;
        Ok(request)
    }

    /// Loads the region geometries and checks the date range.
    pub fn resolve(&self, base_dir: &Path) -> Result<HarvestRequest> {
        let range = DateRange::new(self.start_date, self.end_date)?;
        if self.regions.is_empty() {
            return Err(anyhow!("No regions in request"));
        }

        let mut regions = vec![];
        for entry in &self.regions {
            let path = base_dir.join(&entry.geometry);
            let content = fs::read_to_string(&path).with_context(|| {
                format!("reading geometry of {} from {}", entry.name, path.display())
            })?;
            let geometry: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("{} is not valid JSON", path.display()))?;
            regions.push(AreaOfInterest {
                name: entry.name.clone(),
                geometry,
            });
        }

        Ok(HarvestRequest {
            regions,
            range,
            products: self.products.clone(),
        })
    }
}

impl HarvestRequest {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        RequestFile::read(path)?.resolve(base_dir)
    }
}
