use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};
use pyo3_polars::PyDataFrame;

use crate::config::DeveloperConfig;
use crate::developer::Developer;
use crate::error::DeveloperError;
use crate::feasibility::{Feasibility, Forms};
use crate::parcels::ParcelData;
use crate::probability::ProfitToProbability;
use crate::reducer::CandidateTable;
use crate::sampler::SelectionStrategy;
use crate::target::Target;

/// Python callable `f(candidates: DataFrame) -> list[float]`.
struct PyProfitToProbability {
    callable: PyObject,
}

impl ProfitToProbability for PyProfitToProbability {
    fn probabilities(&self, candidates: &CandidateTable) -> Result<Vec<f64>, DeveloperError> {
        let frame = PyDataFrame(candidates.to_frame()?);
        Python::with_gil(|py| -> PyResult<Vec<f64>> {
            self.callable.call1(py, (frame,))?.extract(py)
        })
        .map_err(DeveloperError::from)
    }
}

/// Python callable `f(candidates: DataFrame, p: list[float], target: float) -> list[int]`.
struct PySelection {
    callable: PyObject,
}

impl SelectionStrategy for PySelection {
    fn select(
        &mut self,
        candidates: &CandidateTable,
        probabilities: &[f64],
        target: &Target,
    ) -> Result<Vec<usize>, DeveloperError> {
        let frame = PyDataFrame(candidates.to_frame()?);
        let p = probabilities.to_vec();
        let units = target.units();
        Python::with_gil(|py| -> PyResult<Vec<usize>> {
            self.callable.call1(py, (frame, p, units))?.extract(py)
        })
        .map_err(DeveloperError::from)
    }
}

#[pyclass(name = "Developer", unsendable)]
pub struct PyDeveloper {
    inner: Developer,
}

#[pymethods]
impl PyDeveloper {
    /// Create a developer model.
    ///
    /// Args:
    ///     feasibility: dict of form name -> DataFrame (one row per parcel),
    ///                  or a single long DataFrame with a `form` column
    ///     forms: a form name, a list of competing forms, or None for all
    ///     target_units: number of net units, or a DataFrame with `target_units`
    ///     parcels: DataFrame with parcel_id, parcel_size, ave_unit_size, current_units
    ///     year: stamped on built proposals as `year_built`
    ///     config_json: JSON object with any of the config keys
    ///     seed: seed for the weighted draw
    #[new]
    #[pyo3(signature = (feasibility, forms, target_units, parcels, year=None, config_json=None, seed=None))]
    fn new(
        feasibility: &Bound<'_, PyAny>,
        forms: Option<&Bound<'_, PyAny>>,
        target_units: &Bound<'_, PyAny>,
        parcels: PyDataFrame,
        year: Option<i32>,
        config_json: Option<&str>,
        seed: Option<u64>,
    ) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => DeveloperConfig::from_json_str(json)?,
            None => DeveloperConfig::default(),
        };
        let mut inner = Developer::new(
            extract_feasibility(feasibility)?,
            extract_forms(forms)?,
            extract_target(target_units)?,
            ParcelData::from_frame(&parcels.0)?,
            config,
        );
        if let Some(year) = year {
            inner = inner.with_year(year);
        }
        if let Some(seed) = seed {
            inner = inner.with_seed(seed);
        }
        Ok(Self { inner })
    }

    /// Choose buildings to build. Returns None when nothing is feasible.
    #[pyo3(signature = (profit_to_prob_func=None, custom_selection_func=None))]
    fn pick(
        &mut self,
        profit_to_prob_func: Option<PyObject>,
        custom_selection_func: Option<PyObject>,
    ) -> PyResult<Option<PyDataFrame>> {
        let rule = profit_to_prob_func.map(|callable| PyProfitToProbability { callable });
        let mut strategy = custom_selection_func.map(|callable| PySelection { callable });
        let built = self.inner.pick_with(
            rule.as_ref().map(|r| r as &dyn ProfitToProbability),
            strategy.as_mut().map(|s| s as &mut dyn SelectionStrategy),
        )?;
        Ok(built.map(PyDataFrame))
    }

    /// Filtered candidates for the current pool, without drawing.
    fn candidates(&mut self) -> PyResult<Option<PyDataFrame>> {
        match self.inner.candidates()? {
            Some(table) => Ok(Some(PyDataFrame(table.to_frame()?))),
            None => Ok(None),
        }
    }

    /// Replace the pool for the next simulation step.
    fn set_feasibility(&mut self, feasibility: &Bound<'_, PyAny>) -> PyResult<()> {
        self.inner.set_feasibility(extract_feasibility(feasibility)?);
        Ok(())
    }

    fn set_target(&mut self, target_units: &Bound<'_, PyAny>) -> PyResult<()> {
        self.inner.set_target(extract_target(target_units)?);
        Ok(())
    }

    #[pyo3(signature = (year=None))]
    fn set_year(&mut self, year: Option<i32>) {
        self.inner.set_year(year);
    }

    fn to_config_json(&self) -> PyResult<String> {
        Ok(self.inner.to_config()?)
    }

    // ── Properties ──────────────────────────────────────────────────────────

    #[getter]
    fn feasible_proposals(&self) -> usize {
        self.inner.feasibility().height()
    }

    #[getter]
    fn target_units(&self) -> f64 {
        self.inner.target().units()
    }
}

fn extract_feasibility(obj: &Bound<'_, PyAny>) -> PyResult<Feasibility> {
    if let Ok(dict) = obj.downcast::<PyDict>() {
        let mut frames = Vec::with_capacity(dict.len());
        for (key, value) in dict.iter() {
            let form: String = key.extract()?;
            let df: PyDataFrame = value.extract()?;
            frames.push((form, df.0));
        }
        return Ok(Feasibility::Wide(frames));
    }
    let df: PyDataFrame = obj.extract().map_err(|_| {
        PyValueError::new_err("feasibility must be a dict of DataFrames or a DataFrame")
    })?;
    Ok(Feasibility::Long(df.0))
}

fn extract_forms(obj: Option<&Bound<'_, PyAny>>) -> PyResult<Forms> {
    let Some(obj) = obj.filter(|o| !o.is_none()) else {
        return Ok(Forms::All);
    };
    if let Ok(form) = obj.extract::<String>() {
        return Ok(Forms::Single(form));
    }
    if obj.downcast::<PyList>().is_ok() {
        return Ok(obj.extract::<Vec<String>>()?.into());
    }
    Err(PyValueError::new_err(
        "forms must be a string, a list of strings, or None",
    ))
}

fn extract_target(obj: &Bound<'_, PyAny>) -> PyResult<Target> {
    if let Ok(units) = obj.extract::<f64>() {
        return Ok(Target::Total(units));
    }
    let df: PyDataFrame = obj.extract().map_err(|_| {
        PyValueError::new_err("target_units must be a number or a DataFrame")
    })?;
    Ok(Target::from_frame(&df.0)?)
}
