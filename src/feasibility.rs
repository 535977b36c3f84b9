use std::collections::HashSet;

use polars::prelude::*;

use crate::error::DeveloperError;
use crate::schema::{self, proposal};

/// Which building forms take part in a pick.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Forms {
    /// Every form present in the pool competes.
    #[default]
    All,
    /// One form only; built proposals are stamped with the form.
    Single(String),
    /// The listed forms compete; list order breaks profit ties.
    Many(Vec<String>),
}

impl Forms {
    pub fn single(&self) -> Option<&str> {
        match self {
            Forms::Single(form) => Some(form),
            _ => None,
        }
    }
}

impl From<&str> for Forms {
    fn from(form: &str) -> Self {
        Forms::Single(form.to_string())
    }
}

impl From<String> for Forms {
    fn from(form: String) -> Self {
        Forms::Single(form)
    }
}

impl From<Vec<String>> for Forms {
    fn from(forms: Vec<String>) -> Self {
        if forms.is_empty() {
            Forms::All
        } else {
            Forms::Many(forms)
        }
    }
}

impl From<Vec<&str>> for Forms {
    fn from(forms: Vec<&str>) -> Self {
        forms
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into()
    }
}

/// The pool of financially feasible proposals for one simulation step.
#[derive(Debug, Clone)]
pub enum Feasibility {
    /// One frame per form, in insertion order, each keyed by `parcel_id`.
    Wide(Vec<(String, DataFrame)>),
    /// One row per parcel x form proposal with explicit `parcel_id` and `form`.
    Long(DataFrame),
}

impl Feasibility {
    pub fn wide<I, S>(forms: I) -> Self
    where
        I: IntoIterator<Item = (S, DataFrame)>,
        S: Into<String>,
    {
        Feasibility::Wide(
            forms
                .into_iter()
                .map(|(form, df)| (form.into(), df))
                .collect(),
        )
    }

    pub fn long(df: DataFrame) -> Self {
        Feasibility::Long(df)
    }

    /// Number of proposal rows across all frames.
    pub fn height(&self) -> usize {
        match self {
            Feasibility::Wide(frames) => frames.iter().map(|(_, df)| df.height()).sum(),
            Feasibility::Long(df) => df.height(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn form_frame(&self, form: &str) -> Option<&DataFrame> {
        match self {
            Feasibility::Wide(frames) => frames
                .iter()
                .find(|(name, _)| name == form)
                .map(|(_, df)| df),
            Feasibility::Long(_) => None,
        }
    }

    /// Remove every proposal belonging to one of `parcel_ids`.
    pub(crate) fn drop_parcels(&mut self, parcel_ids: &[i64]) -> Result<(), DeveloperError> {
        if parcel_ids.is_empty() {
            return Ok(());
        }
        let built: HashSet<i64> = parcel_ids.iter().copied().collect();
        match self {
            Feasibility::Wide(frames) => {
                for (_, df) in frames.iter_mut() {
                    *df = without_parcels(df, &built)?;
                }
            }
            Feasibility::Long(df) => *df = without_parcels(df, &built)?,
        }
        tracing::debug!(
            parcels = built.len(),
            remaining = self.height(),
            "dropped built parcels from feasibility pool"
        );
        Ok(())
    }
}

fn without_parcels(df: &DataFrame, built: &HashSet<i64>) -> Result<DataFrame, DeveloperError> {
    let ids = parcel_ids(df)?;
    let keep: BooleanChunked = ids
        .into_iter()
        .map(|id| id.map_or(true, |id| !built.contains(&id)))
        .collect();
    Ok(df.filter(&keep)?)
}

/// One (parcel, form) proposal read from the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub parcel_id: i64,
    pub form: String,
    pub max_profit: f64,
    pub max_profit_far: f64,
    pub residential_sqft: f64,
    pub non_residential_sqft: f64,
    pub stories: f64,
    /// Pass-through numeric attributes, aligned with the table's extra columns.
    pub extras: Vec<f64>,
}

/// Numeric columns outside the schema that every frame carries.
pub(crate) fn common_extra_columns(frames: &[&DataFrame]) -> Vec<String> {
    let Some((first, rest)) = frames.split_first() else {
        return Vec::new();
    };
    first
        .get_columns()
        .iter()
        .filter(|c| is_numeric(c.dtype()) && !schema::is_known_column(c.name().as_str()))
        .map(|c| c.name().to_string())
        .filter(|name| {
            rest.iter().all(|df| {
                df.column(name)
                    .map(|c| is_numeric(c.dtype()))
                    .unwrap_or(false)
            })
        })
        .collect()
}

fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::UInt64
            | DataType::UInt32
    )
}

/// Read every row of `df` as a proposal.
///
/// `form` labels the rows of a per-form frame; when `None` the frame must
/// carry its own `form` column. Rows with a null or NaN `max_profit` do not
/// offer a proposal and are skipped.
pub(crate) fn read_proposals(
    df: &DataFrame,
    form: Option<&str>,
    extra_columns: &[String],
) -> Result<Vec<Proposal>, DeveloperError> {
    let ids = parcel_ids(df)?;
    let forms = match form {
        Some(form) => vec![Some(form.to_string()); df.height()],
        None => string_values(df, proposal::FORM)?,
    };
    let max_profit = f64_values(df, proposal::MAX_PROFIT)?;
    let max_profit_far = f64_values(df, proposal::MAX_PROFIT_FAR)?;
    let residential_sqft = f64_values(df, proposal::RESIDENTIAL_SQFT)?;
    let non_residential_sqft = f64_values(df, proposal::NON_RESIDENTIAL_SQFT)?;
    let stories = f64_values(df, proposal::STORIES)?;
    let extras = extra_columns
        .iter()
        .map(|name| f64_values(df, name))
        .collect::<Result<Vec<_>, _>>()?;

    let mut proposals = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let Some(profit) = max_profit[i].filter(|p| !p.is_nan()) else {
            continue;
        };
        let parcel_id = ids[i]
            .ok_or_else(|| DeveloperError::InvalidData(format!("Null parcel_id at row {i}")))?;
        let required = |values: &Vec<Option<f64>>, name: &str| {
            values[i].ok_or_else(|| {
                DeveloperError::InvalidData(format!("Null {name} for parcel {parcel_id}"))
            })
        };
        proposals.push(Proposal {
            parcel_id,
            form: forms[i].clone().ok_or_else(|| {
                DeveloperError::InvalidData(format!("Null form for parcel {parcel_id}"))
            })?,
            max_profit: profit,
            max_profit_far: required(&max_profit_far, proposal::MAX_PROFIT_FAR)?,
            residential_sqft: required(&residential_sqft, proposal::RESIDENTIAL_SQFT)?,
            non_residential_sqft: required(&non_residential_sqft, proposal::NON_RESIDENTIAL_SQFT)?,
            stories: required(&stories, proposal::STORIES)?,
            extras: extras
                .iter()
                .zip(extra_columns)
                .map(|(values, name)| required(values, name))
                .collect::<Result<_, _>>()?,
        });
    }
    Ok(proposals)
}

fn parcel_ids(df: &DataFrame) -> Result<Vec<Option<i64>>, DeveloperError> {
    let column = df
        .column(proposal::PARCEL_ID)
        .map_err(|_| DeveloperError::MissingColumn(proposal::PARCEL_ID.into()))?
        .cast(&DataType::Int64)?;
    Ok(column.i64()?.into_iter().collect())
}

fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, DeveloperError> {
    let column = df
        .column(name)
        .map_err(|_| DeveloperError::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)?;
    Ok(column.f64()?.into_iter().collect())
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>, DeveloperError> {
    let column = df
        .column(name)
        .map_err(|_| DeveloperError::MissingColumn(name.to_string()))?
        .cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}
