//! Developer model: choose which feasible building proposals get built on
//! which parcels so new construction tracks a demand target.

pub mod config;
pub mod developer;
pub mod error;
pub mod feasibility;
pub mod parcels;
pub mod probability;
pub mod reducer;
pub mod sampler;
pub mod schema;
pub mod target;

#[cfg(feature = "python")]
mod python;

pub use config::DeveloperConfig;
pub use developer::Developer;
pub use error::DeveloperError;
pub use feasibility::{Feasibility, Forms, Proposal};
pub use parcels::{ParcelData, ParcelSeries};
pub use probability::{ProfitDensity, ProfitToProbability};
pub use reducer::{reduce_and_filter, Candidate, CandidateTable};
pub use sampler::{select, weighted_random_choice, SelectionStrategy, WeightedSampler};
pub use target::Target;

#[cfg(feature = "python")]
use pyo3::prelude::*;
#[cfg(feature = "python")]
use pyo3::types::PyModule;

/// Export schema constants as Python submodules
#[cfg(feature = "python")]
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Proposal
    let proposal = PyModule::new(m.py(), "proposal")?;
    proposal.add("PARCEL_ID", schema::proposal::PARCEL_ID)?;
    proposal.add("FORM", schema::proposal::FORM)?;
    proposal.add("MAX_PROFIT", schema::proposal::MAX_PROFIT)?;
    proposal.add("MAX_PROFIT_FAR", schema::proposal::MAX_PROFIT_FAR)?;
    proposal.add("RESIDENTIAL_SQFT", schema::proposal::RESIDENTIAL_SQFT)?;
    proposal.add(
        "NON_RESIDENTIAL_SQFT",
        schema::proposal::NON_RESIDENTIAL_SQFT,
    )?;
    proposal.add("STORIES", schema::proposal::STORIES)?;
    m.add_submodule(&proposal)?;

    // Parcel series
    let parcel = PyModule::new(m.py(), "parcel")?;
    parcel.add("PARCEL_SIZE", schema::parcel::PARCEL_SIZE)?;
    parcel.add("AVE_UNIT_SIZE", schema::parcel::AVE_UNIT_SIZE)?;
    parcel.add("CURRENT_UNITS", schema::parcel::CURRENT_UNITS)?;
    m.add_submodule(&parcel)?;

    // Derived
    let derived = PyModule::new(m.py(), "derived")?;
    derived.add("RESIDENTIAL_UNITS", schema::derived::RESIDENTIAL_UNITS)?;
    derived.add("JOB_SPACES", schema::derived::JOB_SPACES)?;
    derived.add("NET_UNITS", schema::derived::NET_UNITS)?;
    derived.add("MAX_PROFIT_PER_SIZE", schema::derived::MAX_PROFIT_PER_SIZE)?;
    m.add_submodule(&derived)?;

    // Output
    let output = PyModule::new(m.py(), "output")?;
    output.add("YEAR_BUILT", schema::output::YEAR_BUILT)?;
    m.add_submodule(&output)?;

    // Target
    let target = PyModule::new(m.py(), "target")?;
    target.add("TARGET_UNITS", schema::target::TARGET_UNITS)?;
    m.add_submodule(&target)?;

    Ok(())
}

#[cfg(feature = "python")]
#[pymodule]
#[pyo3(name = "developer")]
fn developer_module(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<python::PyDeveloper>()?;
    add_schema_exports(m)?;
    Ok(())
}
