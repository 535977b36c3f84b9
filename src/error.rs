#[cfg(feature = "python")]
use pyo3::exceptions::PyRuntimeError;
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeveloperError {
    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("No {series} value for parcel {parcel_id}")]
    MissingParcelValue { series: &'static str, parcel_id: i64 },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sampling error: {0}")]
    Sampling(#[from] rand::distributions::WeightedError),

    #[error("{0}")]
    General(String),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

#[cfg(feature = "python")]
impl From<DeveloperError> for PyErr {
    fn from(err: DeveloperError) -> PyErr {
        PyRuntimeError::new_err(err.to_string())
    }
}

#[cfg(feature = "python")]
impl From<PyErr> for DeveloperError {
    fn from(err: PyErr) -> Self {
        DeveloperError::General(err.to_string())
    }
}
