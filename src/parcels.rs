use std::collections::HashMap;

use polars::prelude::*;

use crate::error::DeveloperError;
use crate::schema::{parcel, proposal};

/// A numeric value per parcel, looked up by `parcel_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParcelSeries {
    values: HashMap<i64, f64>,
}

impl ParcelSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a frame with a `parcel_id` column and one value column.
    ///
    /// Rows with a null id or value are skipped; lookups for those parcels
    /// then fail when a surviving proposal needs them.
    pub fn from_frame(df: &DataFrame, value_column: &str) -> Result<Self, DeveloperError> {
        let ids = df
            .column(proposal::PARCEL_ID)
            .map_err(|_| DeveloperError::MissingColumn(proposal::PARCEL_ID.into()))?
            .cast(&DataType::Int64)?;
        let values = df
            .column(value_column)
            .map_err(|_| DeveloperError::MissingColumn(value_column.to_string()))?
            .cast(&DataType::Float64)?;

        let series = ids
            .i64()?
            .into_iter()
            .zip(values.f64()?.into_iter())
            .filter_map(|(id, v)| Some((id?, v?)))
            .collect();
        Ok(series)
    }

    pub fn get(&self, parcel_id: i64) -> Option<f64> {
        self.values.get(&parcel_id).copied()
    }

    pub fn insert(&mut self, parcel_id: i64, value: f64) {
        self.values.insert(parcel_id, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raise every value below `floor` to `floor`.
    pub fn clamp_min(&mut self, floor: f64) {
        for v in self.values.values_mut() {
            if *v < floor {
                *v = floor;
            }
        }
    }
}

impl FromIterator<(i64, f64)> for ParcelSeries {
    fn from_iter<I: IntoIterator<Item = (i64, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// The per-parcel series the reducer attaches to every proposal.
#[derive(Debug, Clone, Default)]
pub struct ParcelData {
    pub parcel_size: ParcelSeries,
    pub ave_unit_size: ParcelSeries,
    pub current_units: ParcelSeries,
}

impl ParcelData {
    pub fn new(
        parcel_size: ParcelSeries,
        ave_unit_size: ParcelSeries,
        current_units: ParcelSeries,
    ) -> Self {
        Self {
            parcel_size,
            ave_unit_size,
            current_units,
        }
    }

    /// Read all three series from one frame keyed by `parcel_id`.
    pub fn from_frame(df: &DataFrame) -> Result<Self, DeveloperError> {
        Ok(Self {
            parcel_size: ParcelSeries::from_frame(df, parcel::PARCEL_SIZE)?,
            ave_unit_size: ParcelSeries::from_frame(df, parcel::AVE_UNIT_SIZE)?,
            current_units: ParcelSeries::from_frame(df, parcel::CURRENT_UNITS)?,
        })
    }

    pub(crate) fn parcel_size(&self, parcel_id: i64) -> Result<f64, DeveloperError> {
        lookup(&self.parcel_size, parcel::PARCEL_SIZE, parcel_id)
    }

    pub(crate) fn ave_unit_size(&self, parcel_id: i64) -> Result<f64, DeveloperError> {
        lookup(&self.ave_unit_size, parcel::AVE_UNIT_SIZE, parcel_id)
    }

    pub(crate) fn current_units(&self, parcel_id: i64) -> Result<f64, DeveloperError> {
        lookup(&self.current_units, parcel::CURRENT_UNITS, parcel_id)
    }
}

fn lookup(
    series: &ParcelSeries,
    name: &'static str,
    parcel_id: i64,
) -> Result<f64, DeveloperError> {
    series
        .get(parcel_id)
        .ok_or(DeveloperError::MissingParcelValue {
            series: name,
            parcel_id,
        })
}
