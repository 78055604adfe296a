use crate::error::CatalogError;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use toml;

/// Products offered for selection, keyed by a human readable name.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ProductCatalog {
    products: Vec<CatalogEntry>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CatalogEntry {
    pub key: String,
    /// Service product id, e.g. `ECO_L2T_LSTE.002`.
    pub product: String,
    pub layers: Vec<String>,
}

/// One product layer as the service expects it in a task request.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LayerRequest {
    pub product: String,
    pub layer: String,
}

pub fn ecostress_catalog_toml() -> toml::Table {
    toml::toml! {
        [[products]]
        key = "ECOSTRESS_LST_Daily_70m (ECO_L2T_LSTE.002)"
        product = "ECO_L2T_LSTE.002"
        layers = ["LST"]

        [[products]]
        key = "ECOSTRESS_ET_Instantaneous_70m (ECO_L3T_JET.002)"
        product = "ECO_L3T_JET.002"
        layers = ["ETdaily"]

        [[products]]
        key = "ECOSTRESS_BESSinst_Instantaneous_70m (ECO_L3T_JET.002)"
        product = "ECO_L3T_JET.002"
        layers = ["BESSinst"]

        [[products]]
        key = "ECOSTRESS_water_mask_Instantaneous_70m (ECO_L3T_JET.002)"
        product = "ECO_L3T_JET.002"
        layers = ["water"]

        [[products]]
        key = "ECOSTRESS_cloud_mask_Instantaneous_70m (ECO_L3T_JET.002)"
        product = "ECO_L3T_JET.002"
        layers = ["cloud"]

        [[products]]
        key = "ECOSTRESS_ESI_Instantaneous_70m (ECO_L4T_ESI.002)"
        product = "ECO_L4T_ESI.002"
        layers = ["ESI"]

        [[products]]
        key = "ECOSTRESS_PET_Instantaneous_70m (ECO_L4T_ESI.002)"
        product = "ECO_L4T_ESI.002"
        layers = ["PET"]

        [[products]]
        key = "ECOSTRESS_GPP_Instantaneous_70m (ECO_L4T_WUE.002)"
        product = "ECO_L4T_WUE.002"
        layers = ["GPP"]

        [[products]]
        key = "ECOSTRESS_WUE_Instantaneous_70m (ECO_L4T_WUE.002)"
        product = "ECO_L4T_WUE.002"
        layers = ["WUE"]

        [[products]]
        key = "ECOSTRESS_NDVI_70m (ECO_L2T_STARS.002)"
        product = "ECO_L2T_STARS.002"
        layers = ["NDVI"]

        [[products]]
        key = "ECOSTRESS_SM_Instantaneous_70m (ECO_L3T_SM.002)"
        product = "ECO_L3T_SM.002"
        layers = ["SM"]
    }
}

impl ProductCatalog {
    pub fn new(products: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let catalog = Self { products };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The built-in ECOSTRESS collection.
    pub fn ecostress() -> Self {
        Self::from_template(&ecostress_catalog_toml()).expect("Built-in catalog should be valid")
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let catalog: Self = toml::from_str(&table.to_string())?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let catalog: Self = toml::from_str(&content)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.products
    }

    pub fn get(&self, key: &str) -> Option<&CatalogEntry> {
        self.products.iter().find(|p| p.key == key)
    }

    /// Resolves selected catalog keys into the layer list of a task request.
    ///
    /// Layers shared by several keys are requested once.
    pub fn layers_for(&self, selection: &[String]) -> Result<Vec<LayerRequest>, CatalogError> {
        if selection.is_empty() {
            return Err(CatalogError::EmptySelection);
        }

        let mut layers: Vec<LayerRequest> = vec![];
        for key in selection {
            let entry = self
                .get(key)
                .ok_or_else(|| CatalogError::UnknownProduct(key.clone()))?;
            for layer in &entry.layers {
                let request = LayerRequest {
                    product: entry.product.clone(),
                    layer: layer.clone(),
                };
                if !layers.contains(&request) {
                    layers.push(request);
                }
            }
        }
        Ok(layers)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let product_id = Regex::new(r"^[A-Za-z0-9_]+\.\d{3}$")
            .expect("Regex pattern should always compile");

        let mut seen = HashSet::new();
        for entry in &self.products {
            if !seen.insert(entry.key.as_str()) {
                return Err(CatalogError::DuplicateKey(entry.key.clone()));
            }
            if !product_id.is_match(&entry.product) {
                return Err(CatalogError::InvalidProductId {
                    key: entry.key.clone(),
                    product: entry.product.clone(),
                });
            }
            if entry.layers.is_empty() {
                return Err(CatalogError::NoLayers(entry.key.clone()));
            }
        }
        Ok(())
    }
}
