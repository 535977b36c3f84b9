use crate::error::DeveloperError;
use crate::reducer::CandidateTable;

/// Turns candidate profitability into per-row selection probabilities.
///
/// Implementations must return one value per candidate row, in row order.
/// The output is used as-is; it is not renormalized.
pub trait ProfitToProbability {
    fn probabilities(&self, candidates: &CandidateTable) -> Result<Vec<f64>, DeveloperError>;
}

impl<F> ProfitToProbability for F
where
    F: Fn(&CandidateTable) -> Result<Vec<f64>, DeveloperError>,
{
    fn probabilities(&self, candidates: &CandidateTable) -> Result<Vec<f64>, DeveloperError> {
        self(candidates)
    }
}

/// Default rule: probability proportional to profit per unit of parcel area.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfitDensity;

impl ProfitToProbability for ProfitDensity {
    fn probabilities(&self, candidates: &CandidateTable) -> Result<Vec<f64>, DeveloperError> {
        normalize(&candidates.profit_density())
    }
}

pub(crate) fn normalize(weights: &[f64]) -> Result<Vec<f64>, DeveloperError> {
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(DeveloperError::InvalidData(format!(
            "profit weights must have a positive finite sum, got {total}"
        )));
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Evaluate `rule` and check the result lines up with the candidate rows.
pub(crate) fn aligned_probabilities(
    rule: &dyn ProfitToProbability,
    candidates: &CandidateTable,
) -> Result<Vec<f64>, DeveloperError> {
    let p = rule.probabilities(candidates)?;
    if p.len() != candidates.len() {
        return Err(DeveloperError::Validation(format!(
            "probability function returned {} values for {} candidates",
            p.len(),
            candidates.len()
        )));
    }
    Ok(p)
}
