use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::DeveloperError;
use crate::probability::{aligned_probabilities, normalize, ProfitToProbability};
use crate::reducer::CandidateTable;
use crate::target::Target;

/// Source of weighted random draws.
pub trait WeightedSampler {
    /// Draw one index with probability proportional to `weights[index]`.
    ///
    /// Callers guarantee at least one weight is positive.
    fn sample(&mut self, weights: &[f64]) -> Result<usize, DeveloperError>;
}

impl<R: Rng> WeightedSampler for R {
    fn sample(&mut self, weights: &[f64]) -> Result<usize, DeveloperError> {
        let dist = WeightedIndex::new(weights)?;
        Ok(dist.sample(self))
    }
}

/// Replaces the built-in draw entirely.
///
/// Returns row positions into `candidates`; they are used without further
/// checks beyond being in range.
pub trait SelectionStrategy {
    fn select(
        &mut self,
        candidates: &CandidateTable,
        probabilities: &[f64],
        target: &Target,
    ) -> Result<Vec<usize>, DeveloperError>;
}

impl<F> SelectionStrategy for F
where
    F: FnMut(&CandidateTable, &[f64], &Target) -> Result<Vec<usize>, DeveloperError>,
{
    fn select(
        &mut self,
        candidates: &CandidateTable,
        probabilities: &[f64],
        target: &Target,
    ) -> Result<Vec<usize>, DeveloperError> {
        self(candidates, probabilities, target)
    }
}

pub(crate) const NOT_ENOUGH_UNITS: &str = "there are not enough profitable units to match demand";

/// Choose which candidate rows get built.
///
/// Without a custom `rule` the candidate table records `max_profit_per_size`
/// and probabilities follow profit density.
pub fn select(
    candidates: &mut CandidateTable,
    target: &Target,
    rule: Option<&dyn ProfitToProbability>,
    strategy: Option<&mut dyn SelectionStrategy>,
    sampler: &mut dyn WeightedSampler,
) -> Result<Vec<usize>, DeveloperError> {
    let p = match rule {
        Some(rule) => aligned_probabilities(rule, candidates)?,
        None => {
            let density = candidates.profit_density();
            let p = normalize(&density)?;
            candidates.set_max_profit_per_size(density);
            p
        }
    };

    let target_units = target.units();
    let supply = candidates.total_net_units();
    let insufficient = supply < target_units;
    if insufficient {
        tracing::warn!(supply, target = target_units, "{NOT_ENOUGH_UNITS}");
    }

    if let Some(strategy) = strategy {
        let rows = strategy.select(candidates, &p, target)?;
        if let Some(bad) = rows.iter().find(|&&i| i >= candidates.len()) {
            return Err(DeveloperError::Validation(format!(
                "selection returned row {bad} for {} candidates",
                candidates.len()
            )));
        }
        return Ok(rows);
    }

    if target_units <= 0.0 {
        return Ok(Vec::new());
    }
    if insufficient && !candidates.is_long() {
        return Ok((0..candidates.len()).collect());
    }
    weighted_random_choice(candidates, &p, target_units, sampler)
}

/// Draw rows one at a time without replacement until their `net_units`
/// reach `target_units` or no weight is left.
///
/// In long mode a drawn row takes its whole parcel out of the pool, so at
/// most one proposal per parcel is returned.
pub fn weighted_random_choice(
    candidates: &CandidateTable,
    p: &[f64],
    target_units: f64,
    sampler: &mut dyn WeightedSampler,
) -> Result<Vec<usize>, DeveloperError> {
    let rows = candidates.rows();
    let mut weights = p.to_vec();
    let mut chosen = Vec::new();
    let mut built = 0.0;

    while built < target_units && weights.iter().any(|&w| w > 0.0) {
        let pick = sampler.sample(&weights)?;
        match weights.get(pick) {
            Some(&w) if w > 0.0 => {}
            _ => {
                return Err(DeveloperError::Validation(format!(
                    "sampler drew row {pick}, which is not available"
                )))
            }
        }
        chosen.push(pick);
        built += rows[pick].net_units;

        if candidates.is_long() {
            let parcel_id = rows[pick].parcel_id();
            for (w, row) in weights.iter_mut().zip(rows) {
                if row.parcel_id() == parcel_id {
                    *w = 0.0;
                }
            }
        } else {
            weights[pick] = 0.0;
        }
    }
    Ok(chosen)
}
