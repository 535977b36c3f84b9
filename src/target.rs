use polars::prelude::*;

use crate::error::DeveloperError;
use crate::schema::target;

/// How many net units the developer should produce this step.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Total(f64),
    /// Separate demand streams sampled from one pool; the goal is their sum.
    Breakdown(Vec<f64>),
}

impl Target {
    pub fn units(&self) -> f64 {
        match self {
            Target::Total(units) => *units,
            Target::Breakdown(parts) => parts.iter().sum(),
        }
    }

    /// Read sub-targets from the `target_units` column of `df`.
    pub fn from_frame(df: &DataFrame) -> Result<Self, DeveloperError> {
        let column = df
            .column(target::TARGET_UNITS)
            .map_err(|_| DeveloperError::MissingColumn(target::TARGET_UNITS.into()))?
            .cast(&DataType::Float64)?;
        let parts = column
            .f64()?
            .into_iter()
            .map(|v| {
                v.ok_or_else(|| DeveloperError::InvalidData("Null target_units".into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Target::Breakdown(parts))
    }
}

impl From<f64> for Target {
    fn from(units: f64) -> Self {
        Target::Total(units)
    }
}

impl From<i64> for Target {
    fn from(units: i64) -> Self {
        Target::Total(units as f64)
    }
}
