use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DeveloperError;

/// Tunable parameters of the developer model.
///
/// Missing keys in a serialized config fall back to the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeveloperConfig {
    /// Average square feet per job for non-residential buildings.
    pub bldg_sqft_per_job: f64,
    /// Floor applied to the average unit size series.
    pub min_unit_size: f64,
    /// Parcels this large or larger are never developed.
    pub max_parcel_size: f64,
    /// Remove built parcels from the pool so they are not built twice.
    pub drop_after_build: bool,
    /// Count residential units (true) or job spaces (false) as net units.
    pub residential: bool,
    /// Keep every proposal per parcel; the pool must then be a long table.
    pub keep_suboptimal: bool,
}

impl Default for DeveloperConfig {
    fn default() -> Self {
        Self {
            bldg_sqft_per_job: 400.0,
            min_unit_size: 400.0,
            max_parcel_size: 200_000.0,
            drop_after_build: true,
            residential: true,
            keep_suboptimal: false,
        }
    }
}

impl DeveloperConfig {
    pub fn from_json_str(json: &str) -> Result<Self, DeveloperError> {
        let cfg: Self = serde_json::from_str(json)?;
        tracing::debug!("loaded developer config from JSON");
        Ok(cfg)
    }

    pub fn to_json_string(&self) -> Result<String, DeveloperError> {
        tracing::debug!("serializing developer config to JSON");
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeveloperError> {
        let raw = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), DeveloperError> {
        fs::write(path.as_ref(), self.to_json_string()?)?;
        Ok(())
    }
}
