use polars::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::DeveloperConfig;
use crate::error::DeveloperError;
use crate::feasibility::{Feasibility, Forms};
use crate::parcels::{ParcelData, ParcelSeries};
use crate::probability::ProfitToProbability;
use crate::reducer::{reduce_and_filter, CandidateTable};
use crate::sampler::{self, SelectionStrategy, WeightedSampler};
use crate::schema::output;
use crate::target::Target;

/// Default seed used when no explicit seed or sampler is provided.
const DEFAULT_SEED: u64 = 42;

/// Picks which feasible proposals get built in one simulation step.
///
/// The engine owns the feasibility pool. Every `pick` may shrink it (when
/// `drop_after_build` is set) and clamps the shared `ave_unit_size` series,
/// so picks for successive years must run one after another on the same
/// instance.
pub struct Developer {
    feasibility: Feasibility,
    forms: Forms,
    target: Target,
    parcels: ParcelData,
    year: Option<i32>,
    config: DeveloperConfig,
    sampler: Box<dyn WeightedSampler>,
}

impl Developer {
    pub fn new(
        feasibility: Feasibility,
        forms: impl Into<Forms>,
        target: impl Into<Target>,
        parcels: ParcelData,
        config: DeveloperConfig,
    ) -> Self {
        Self {
            feasibility,
            forms: forms.into(),
            target: target.into(),
            parcels,
            year: None,
            config,
            sampler: Box::new(ChaCha8Rng::seed_from_u64(DEFAULT_SEED)),
        }
    }

    /// Build from a JSON config; missing keys take their defaults.
    pub fn from_config(
        feasibility: Feasibility,
        forms: impl Into<Forms>,
        target: impl Into<Target>,
        parcels: ParcelData,
        json: &str,
    ) -> Result<Self, DeveloperError> {
        let config = DeveloperConfig::from_json_str(json)?;
        tracing::debug!("loaded developer model from config");
        Ok(Self::new(feasibility, forms, target, parcels, config))
    }

    /// Stamp built proposals with this `year_built`.
    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampler = Box::new(ChaCha8Rng::seed_from_u64(seed));
        self
    }

    pub fn with_sampler(mut self, sampler: impl WeightedSampler + 'static) -> Self {
        self.sampler = Box::new(sampler);
        self
    }

    pub fn config(&self) -> &DeveloperConfig {
        &self.config
    }

    pub fn to_config(&self) -> Result<String, DeveloperError> {
        self.config.to_json_string()
    }

    pub fn feasibility(&self) -> &Feasibility {
        &self.feasibility
    }

    /// Replace the pool, typically with the next step's feasibility results.
    pub fn set_feasibility(&mut self, feasibility: Feasibility) {
        self.feasibility = feasibility;
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn set_target(&mut self, target: impl Into<Target>) {
        self.target = target.into();
    }

    pub fn set_year(&mut self, year: Option<i32>) {
        self.year = year;
    }

    /// The unit-size series, as clamped by the last pick.
    pub fn ave_unit_size(&self) -> &ParcelSeries {
        &self.parcels.ave_unit_size
    }

    /// Reduce and filter the current pool without drawing anything.
    pub fn candidates(&mut self) -> Result<Option<CandidateTable>, DeveloperError> {
        reduce_and_filter(
            &self.feasibility,
            &self.forms,
            &mut self.parcels,
            &self.config,
        )
    }

    /// Pick buildings with the default profit-density rule and draw.
    pub fn pick(&mut self) -> Result<Option<DataFrame>, DeveloperError> {
        self.pick_with(None, None)
    }

    /// Choose the proposals to build so that their net units match the target.
    ///
    /// `rule` replaces the default profit-to-probability conversion and
    /// `strategy` replaces the weighted draw. Returns `Ok(None)` when no
    /// feasible proposal exists, otherwise the built proposals (possibly
    /// none) as a frame.
    pub fn pick_with(
        &mut self,
        rule: Option<&dyn ProfitToProbability>,
        strategy: Option<&mut dyn SelectionStrategy>,
    ) -> Result<Option<DataFrame>, DeveloperError> {
        let Some(mut candidates) = self.candidates()? else {
            return Ok(None);
        };

        let rows = sampler::select(
            &mut candidates,
            &self.target,
            rule,
            strategy,
            self.sampler.as_mut(),
        )?;

        let mut built = candidates.subset(&rows)?;
        if self.config.drop_after_build {
            let parcel_ids: Vec<i64> = built.rows().iter().map(|r| r.parcel_id()).collect();
            self.feasibility.drop_parcels(&parcel_ids)?;
        }

        tracing::info!(
            built = built.len(),
            net_units = built.total_net_units(),
            "picked proposals to build"
        );
        self.prepare_new_buildings(&mut built).map(Some)
    }

    fn prepare_new_buildings(&self, built: &mut CandidateTable) -> Result<DataFrame, DeveloperError> {
        let form = self.forms.single();
        for row in built.rows_mut() {
            if let Some(form) = form {
                row.proposal.form = form.to_string();
            }
            row.proposal.stories = row.proposal.stories.ceil();
        }

        let mut df = built.to_frame()?;
        if let Some(year) = self.year {
            df.with_column(Column::new(
                output::YEAR_BUILT.into(),
                vec![year; df.height()],
            ))?;
        }
        Ok(df)
    }
}
