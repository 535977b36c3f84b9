use std::collections::HashMap;

use polars::prelude::*;

use crate::config::DeveloperConfig;
use crate::error::DeveloperError;
use crate::feasibility::{common_extra_columns, read_proposals, Feasibility, Forms, Proposal};
use crate::parcels::ParcelData;
use crate::schema::{derived, parcel, proposal};

pub(crate) const NO_FEASIBLE_BUILDINGS: &str = "there are no feasible buildings to choose from";

/// A proposal that survived filtering, with its parcel attributes attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub proposal: Proposal,
    pub ave_unit_size: f64,
    pub parcel_size: f64,
    pub current_units: f64,
    pub residential_units: f64,
    pub job_spaces: f64,
    pub net_units: f64,
}

impl Candidate {
    pub fn parcel_id(&self) -> i64 {
        self.proposal.parcel_id
    }

    pub fn form(&self) -> &str {
        &self.proposal.form
    }
}

/// Clean, filtered proposals ready for sampling.
///
/// In long mode several rows may share a `parcel_id`; otherwise every row is
/// a distinct parcel.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateTable {
    rows: Vec<Candidate>,
    extra_columns: Vec<String>,
    long: bool,
    max_profit_per_size: Option<Vec<f64>>,
}

impl CandidateTable {
    /// Every row must carry one value per name in `extra_columns`.
    pub(crate) fn new(
        rows: Vec<Candidate>,
        extra_columns: Vec<String>,
        long: bool,
    ) -> Result<Self, DeveloperError> {
        if let Some(r) = rows.iter().find(|r| r.proposal.extras.len() != extra_columns.len()) {
            return Err(DeveloperError::Validation(format!(
                "parcel {} carries {} extra values for {} extra columns",
                r.parcel_id(),
                r.proposal.extras.len(),
                extra_columns.len()
            )));
        }
        Ok(Self {
            rows,
            extra_columns,
            long,
            max_profit_per_size: None,
        })
    }

    pub fn rows(&self) -> &[Candidate] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Candidate] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_long(&self) -> bool {
        self.long
    }

    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    pub fn total_net_units(&self) -> f64 {
        self.rows.iter().map(|r| r.net_units).sum()
    }

    /// `max_profit / parcel_size` per row.
    pub fn profit_density(&self) -> Vec<f64> {
        self.rows
            .iter()
            .map(|r| r.proposal.max_profit / r.parcel_size)
            .collect()
    }

    pub fn max_profit_per_size(&self) -> Option<&[f64]> {
        self.max_profit_per_size.as_deref()
    }

    pub(crate) fn set_max_profit_per_size(&mut self, values: Vec<f64>) {
        self.max_profit_per_size = Some(values);
    }

    /// The rows at `positions`, in that order.
    pub fn subset(&self, positions: &[usize]) -> Result<CandidateTable, DeveloperError> {
        let rows = positions
            .iter()
            .map(|&i| self.row(i).cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let max_profit_per_size = self
            .max_profit_per_size
            .as_ref()
            .map(|values| positions.iter().map(|&i| values[i]).collect());
        Ok(CandidateTable {
            rows,
            extra_columns: self.extra_columns.clone(),
            long: self.long,
            max_profit_per_size,
        })
    }

    fn row(&self, position: usize) -> Result<&Candidate, DeveloperError> {
        self.rows.get(position).ok_or_else(|| {
            DeveloperError::Validation(format!(
                "row {position} is out of range for {} candidates",
                self.rows.len()
            ))
        })
    }

    /// Materialize as a polars frame with `parcel_id` and `form` as columns.
    pub fn to_frame(&self) -> Result<DataFrame, DeveloperError> {
        let pick = |f: fn(&Candidate) -> f64| self.rows.iter().map(f).collect::<Vec<f64>>();

        let ids: Vec<i64> = self.rows.iter().map(Candidate::parcel_id).collect();
        let forms: Vec<&str> = self.rows.iter().map(Candidate::form).collect();

        let mut columns = vec![
            Column::new(proposal::PARCEL_ID.into(), ids),
            Column::new(proposal::FORM.into(), forms),
            Column::new(proposal::MAX_PROFIT.into(), pick(|r| r.proposal.max_profit)),
            Column::new(
                proposal::MAX_PROFIT_FAR.into(),
                pick(|r| r.proposal.max_profit_far),
            ),
            Column::new(
                proposal::RESIDENTIAL_SQFT.into(),
                pick(|r| r.proposal.residential_sqft),
            ),
            Column::new(
                proposal::NON_RESIDENTIAL_SQFT.into(),
                pick(|r| r.proposal.non_residential_sqft),
            ),
            Column::new(proposal::STORIES.into(), pick(|r| r.proposal.stories)),
        ];
        for (j, name) in self.extra_columns.iter().enumerate() {
            let values: Vec<f64> = self.rows.iter().map(|r| r.proposal.extras[j]).collect();
            columns.push(Column::new(name.as_str().into(), values));
        }
        columns.extend([
            Column::new(parcel::AVE_UNIT_SIZE.into(), pick(|r| r.ave_unit_size)),
            Column::new(parcel::PARCEL_SIZE.into(), pick(|r| r.parcel_size)),
            Column::new(parcel::CURRENT_UNITS.into(), pick(|r| r.current_units)),
            Column::new(derived::RESIDENTIAL_UNITS.into(), pick(|r| r.residential_units)),
            Column::new(derived::JOB_SPACES.into(), pick(|r| r.job_spaces)),
            Column::new(derived::NET_UNITS.into(), pick(|r| r.net_units)),
        ]);
        if let Some(values) = &self.max_profit_per_size {
            columns.push(Column::new(
                derived::MAX_PROFIT_PER_SIZE.into(),
                values.as_slice(),
            ));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Turn the feasibility pool into a candidate table.
///
/// Returns `Ok(None)` when nothing feasible is left to build. As a side
/// effect the `ave_unit_size` series in `parcels` is clamped to the
/// configured minimum.
pub fn reduce_and_filter(
    feasibility: &Feasibility,
    forms: &Forms,
    parcels: &mut ParcelData,
    config: &DeveloperConfig,
) -> Result<Option<CandidateTable>, DeveloperError> {
    if feasibility.is_empty() {
        tracing::warn!("{NO_FEASIBLE_BUILDINGS}");
        return Ok(None);
    }

    let (proposals, extra_columns) = match (config.keep_suboptimal, feasibility) {
        (false, Feasibility::Wide(frames)) => {
            keep_form_with_max_profit(&competing_frames(frames, forms)?)?
        }
        (true, Feasibility::Long(df)) => {
            let df = restrict_to_forms(df, forms)?;
            let extras = common_extra_columns(&[&df]);
            (read_proposals(&df, forms.single(), &extras)?, extras)
        }
        (false, Feasibility::Long(_)) => {
            return Err(DeveloperError::Validation(
                "a long feasibility table requires keep_suboptimal".into(),
            ))
        }
        (true, Feasibility::Wide(_)) => {
            return Err(DeveloperError::Validation(
                "keep_suboptimal requires a long feasibility table".into(),
            ))
        }
    };

    let rows = remove_infeasible(proposals, parcels, config)?;
    if rows.is_empty() {
        tracing::warn!("{NO_FEASIBLE_BUILDINGS}");
        return Ok(None);
    }

    let table = CandidateTable::new(rows, extra_columns, config.keep_suboptimal)?;
    tracing::info!(
        net_units = table.total_net_units(),
        candidates = table.len(),
        "sum of net units that are profitable"
    );
    Ok(Some(table))
}

/// The per-form frames taking part in a wide-mode pick, in visiting order.
fn competing_frames<'a>(
    frames: &'a [(String, DataFrame)],
    forms: &Forms,
) -> Result<Vec<(&'a str, &'a DataFrame)>, DeveloperError> {
    let find = |name: &str| {
        frames
            .iter()
            .find(|(form, _)| form == name)
            .map(|(form, df)| (form.as_str(), df))
            .ok_or_else(|| DeveloperError::InvalidData(format!("Unknown form: {name}")))
    };
    match forms {
        Forms::All => Ok(frames.iter().map(|(form, df)| (form.as_str(), df)).collect()),
        Forms::Single(name) => Ok(vec![find(name)?]),
        Forms::Many(names) => names.iter().map(|name| find(name.as_str())).collect(),
    }
}

/// Keep only the most profitable proposal on each parcel.
///
/// Forms are visited in list order (or pool order for `Forms::All`) and a
/// later row only replaces the incumbent when strictly more profitable, so
/// on a tie the first row visited wins. A per-form frame listing a parcel
/// twice is collapsed the same way.
fn keep_form_with_max_profit(
    selected: &[(&str, &DataFrame)],
) -> Result<(Vec<Proposal>, Vec<String>), DeveloperError> {
    let dfs: Vec<&DataFrame> = selected.iter().map(|(_, df)| *df).collect();
    let extras = common_extra_columns(&dfs);

    let mut best: Vec<Proposal> = Vec::new();
    let mut slot: HashMap<i64, usize> = HashMap::new();
    for &(form, df) in selected {
        for candidate in read_proposals(df, Some(form), &extras)? {
            match slot.get(&candidate.parcel_id) {
                Some(&i) => {
                    if candidate.max_profit > best[i].max_profit {
                        best[i] = candidate;
                    }
                }
                None => {
                    slot.insert(candidate.parcel_id, best.len());
                    best.push(candidate);
                }
            }
        }
    }
    Ok((best, extras))
}

fn restrict_to_forms(df: &DataFrame, forms: &Forms) -> Result<DataFrame, DeveloperError> {
    let allowed: Vec<&String> = match forms {
        Forms::All => return Ok(df.clone()),
        // A single form may be given for a long table without a form column.
        Forms::Single(_) if df.column(proposal::FORM).is_err() => return Ok(df.clone()),
        Forms::Single(form) => vec![form],
        Forms::Many(names) => names.iter().collect(),
    };
    let predicate = allowed
        .into_iter()
        .map(|form| col(proposal::FORM).eq(lit(form.as_str())))
        .reduce(|acc, e| acc.or(e))
        .unwrap_or_else(|| lit(false));
    Ok(df.clone().lazy().filter(predicate).collect()?)
}

fn remove_infeasible(
    proposals: Vec<Proposal>,
    parcels: &mut ParcelData,
    config: &DeveloperConfig,
) -> Result<Vec<Candidate>, DeveloperError> {
    parcels.ave_unit_size.clamp_min(config.min_unit_size);

    let mut rows = Vec::with_capacity(proposals.len());
    for p in proposals {
        if p.max_profit_far <= 0.0 {
            continue;
        }
        let parcel_size = parcels.parcel_size(p.parcel_id)?;
        if parcel_size >= config.max_parcel_size {
            continue;
        }
        let ave_unit_size = parcels.ave_unit_size(p.parcel_id)?;
        let current_units = parcels.current_units(p.parcel_id)?;

        let residential_units = (p.residential_sqft / ave_unit_size).round_ties_even();
        let job_spaces = (p.non_residential_sqft / config.bldg_sqft_per_job).round_ties_even();
        let net_units = if config.residential {
            residential_units
        } else {
            job_spaces
        } - current_units;
        if net_units <= 0.0 {
            continue;
        }

        rows.push(Candidate {
            proposal: p,
            ave_unit_size,
            parcel_size,
            current_units,
            residential_units,
            job_spaces,
            net_units,
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcels::ParcelSeries;

    fn form_frame(ids: &[i64], profits: &[f64], res_sqft: &[f64]) -> DataFrame {
        let n = ids.len();
        DataFrame::new(vec![
            Column::new(proposal::PARCEL_ID.into(), ids),
            Column::new(proposal::MAX_PROFIT.into(), profits),
            Column::new(proposal::MAX_PROFIT_FAR.into(), vec![1.0; n]),
            Column::new(proposal::RESIDENTIAL_SQFT.into(), res_sqft),
            Column::new(proposal::NON_RESIDENTIAL_SQFT.into(), vec![4000.0; n]),
            Column::new(proposal::STORIES.into(), vec![3.0; n]),
        ])
        .unwrap()
    }

    fn parcels(ids: &[i64]) -> ParcelData {
        ParcelData::new(
            ids.iter().map(|&id| (id, 1000.0)).collect(),
            ids.iter().map(|&id| (id, 100.0)).collect(),
            ids.iter().map(|&id| (id, 0.0)).collect(),
        )
    }

    #[test]
    fn most_profitable_form_wins() {
        let pool = Feasibility::wide([
            ("residential", form_frame(&[1, 2], &[50.0, 90.0], &[4000.0, 4000.0])),
            ("office", form_frame(&[1, 2], &[80.0, 10.0], &[4000.0, 4000.0])),
        ]);
        let table = reduce_and_filter(
            &pool,
            &Forms::All,
            &mut parcels(&[1, 2]),
            &DeveloperConfig::default(),
        )
        .unwrap()
        .unwrap();

        let forms: Vec<(i64, &str)> = table.rows().iter().map(|r| (r.parcel_id(), r.form())).collect();
        assert_eq!(forms, vec![(1, "office"), (2, "residential")]);
    }

    #[test]
    fn nan_profit_does_not_block_a_later_form() {
        let pool = Feasibility::wide([
            ("residential", form_frame(&[1, 2], &[f64::NAN, 50.0], &[4000.0, 4000.0])),
            ("office", form_frame(&[1, 2], &[80.0, 10.0], &[4000.0, 4000.0])),
        ]);
        let table = reduce_and_filter(
            &pool,
            &Forms::All,
            &mut parcels(&[1, 2]),
            &DeveloperConfig::default(),
        )
        .unwrap()
        .unwrap();

        // parcel 1 first appears under office
        let forms: Vec<(i64, &str)> = table.rows().iter().map(|r| (r.parcel_id(), r.form())).collect();
        assert_eq!(forms, vec![(2, "residential"), (1, "office")]);
        assert!(table.profit_density().iter().all(|d| d.is_finite()));
    }

    #[test]
    fn single_form_keeps_one_proposal_per_parcel() {
        let pool = Feasibility::wide([(
            "residential",
            form_frame(&[1, 1, 2], &[100.0, 90.0, 10.0], &[4000.0; 3]),
        )]);
        let table = reduce_and_filter(
            &pool,
            &Forms::from("residential"),
            &mut parcels(&[1, 2]),
            &DeveloperConfig::default(),
        )
        .unwrap()
        .unwrap();

        let best: Vec<(i64, f64)> = table
            .rows()
            .iter()
            .map(|r| (r.parcel_id(), r.proposal.max_profit))
            .collect();
        assert_eq!(best, vec![(1, 100.0), (2, 10.0)]);
    }

    #[test]
    fn unknown_single_form_is_an_error() {
        let pool = Feasibility::wide([("residential", form_frame(&[1], &[10.0], &[4000.0]))]);
        let err = reduce_and_filter(
            &pool,
            &Forms::from("office"),
            &mut parcels(&[1]),
            &DeveloperConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DeveloperError::InvalidData(_)));
    }

    #[test]
    fn profit_tie_keeps_first_listed_form() {
        let pool = Feasibility::wide([
            ("residential", form_frame(&[1], &[70.0], &[4000.0])),
            ("office", form_frame(&[1], &[70.0], &[4000.0])),
        ]);
        let cfg = DeveloperConfig::default();

        let table = reduce_and_filter(&pool, &Forms::All, &mut parcels(&[1]), &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(table.rows()[0].form(), "residential");

        let reordered = Forms::from(vec!["office", "residential"]);
        let table = reduce_and_filter(&pool, &reordered, &mut parcels(&[1]), &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(table.rows()[0].form(), "office");
    }

    #[test]
    fn filters_far_size_and_net_units() {
        let mut df = form_frame(&[1, 2, 3, 4], &[10.0; 4], &[4000.0, 4000.0, 4000.0, 100.0]);
        df.with_column(Column::new(
            proposal::MAX_PROFIT_FAR.into(),
            &[0.0, 1.0, 1.0, 1.0],
        ))
        .unwrap();
        let pool = Feasibility::wide([("residential", df)]);

        let mut data = parcels(&[1, 2, 3, 4]);
        data.parcel_size.insert(3, 200_000.0);

        let table = reduce_and_filter(&pool, &Forms::All, &mut data, &DeveloperConfig {
            min_unit_size: 100.0,
            ..DeveloperConfig::default()
        })
        .unwrap()
        .unwrap();

        // 1: far 0; 3: parcel too big; 4: 100 sqft rounds to 1 unit - 0 current = 1, kept
        let ids: Vec<i64> = table.rows().iter().map(Candidate::parcel_id).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(table.rows()[0].residential_units, 40.0);
        assert_eq!(table.rows()[1].net_units, 1.0);
    }

    #[test]
    fn unit_size_series_is_clamped_in_place() {
        let pool = Feasibility::wide([("residential", form_frame(&[1], &[10.0], &[4000.0]))]);
        let mut data = parcels(&[1]);
        let table = reduce_and_filter(&pool, &Forms::All, &mut data, &DeveloperConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(data.ave_unit_size.get(1), Some(400.0));
        assert_eq!(table.rows()[0].residential_units, 10.0);
    }

    #[test]
    fn job_spaces_drive_net_units_for_non_residential() {
        let pool = Feasibility::wide([("office", form_frame(&[1], &[10.0], &[0.0]))]);
        let mut data = parcels(&[1]);
        data.current_units.insert(1, 4.0);
        let cfg = DeveloperConfig {
            residential: false,
            ..DeveloperConfig::default()
        };
        let table = reduce_and_filter(&pool, &Forms::from("office"), &mut data, &cfg)
            .unwrap()
            .unwrap();
        assert_eq!(table.rows()[0].job_spaces, 10.0);
        assert_eq!(table.rows()[0].net_units, 6.0);
    }

    #[test]
    fn rounding_is_half_to_even() {
        // 1000 / 400 = 2.5 -> 2, 1400 / 400 = 3.5 -> 4
        let pool = Feasibility::wide([(
            "residential",
            form_frame(&[1, 2], &[10.0, 10.0], &[1000.0, 1400.0]),
        )]);
        let table = reduce_and_filter(
            &pool,
            &Forms::All,
            &mut parcels(&[1, 2]),
            &DeveloperConfig::default(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(table.rows()[0].residential_units, 2.0);
        assert_eq!(table.rows()[1].residential_units, 4.0);
    }

    #[test]
    fn nothing_feasible_is_not_an_error() {
        let pool = Feasibility::wide([("residential", form_frame(&[1], &[10.0], &[0.0]))]);
        let result = reduce_and_filter(
            &pool,
            &Forms::All,
            &mut parcels(&[1]),
            &DeveloperConfig::default(),
        )
        .unwrap();
        assert!(result.is_none());

        let empty = Feasibility::wide([("residential", form_frame(&[], &[], &[]))]);
        let result = reduce_and_filter(
            &empty,
            &Forms::All,
            &mut ParcelData::default(),
            &DeveloperConfig::default(),
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn missing_parcel_size_is_fatal() {
        let pool = Feasibility::wide([("residential", form_frame(&[7], &[10.0], &[4000.0]))]);
        let mut data = ParcelData::new(
            ParcelSeries::new(),
            [(7, 100.0)].into_iter().collect(),
            [(7, 0.0)].into_iter().collect(),
        );
        let err = reduce_and_filter(&pool, &Forms::All, &mut data, &DeveloperConfig::default())
            .unwrap_err();
        assert!(matches!(
            err,
            DeveloperError::MissingParcelValue { parcel_id: 7, .. }
        ));
    }

    #[test]
    fn long_table_keeps_every_allowed_proposal() {
        let mut df = form_frame(&[1, 1, 2], &[50.0, 80.0, 20.0], &[4000.0; 3]);
        df.with_column(Column::new(
            proposal::FORM.into(),
            &["residential", "office", "retail"],
        ))
        .unwrap();
        let pool = Feasibility::long(df);
        let cfg = DeveloperConfig {
            keep_suboptimal: true,
            ..DeveloperConfig::default()
        };

        let table = reduce_and_filter(&pool, &Forms::All, &mut parcels(&[1, 2]), &cfg)
            .unwrap()
            .unwrap();
        assert!(table.is_long());
        assert_eq!(table.len(), 3);

        let only = Forms::from(vec!["residential", "office"]);
        let table = reduce_and_filter(&pool, &only, &mut parcels(&[1, 2]), &cfg)
            .unwrap()
            .unwrap();
        let ids: Vec<i64> = table.rows().iter().map(Candidate::parcel_id).collect();
        assert_eq!(ids, vec![1, 1]);
    }

    #[test]
    fn mode_and_pool_shape_must_agree() {
        let pool = Feasibility::wide([("residential", form_frame(&[1], &[10.0], &[4000.0]))]);
        let cfg = DeveloperConfig {
            keep_suboptimal: true,
            ..DeveloperConfig::default()
        };
        let err = reduce_and_filter(&pool, &Forms::All, &mut parcels(&[1]), &cfg).unwrap_err();
        assert!(matches!(err, DeveloperError::Validation(_)));
    }

    #[test]
    fn to_frame_exposes_parcel_id_column() {
        let pool = Feasibility::wide([("residential", form_frame(&[3, 5], &[10.0, 20.0], &[4000.0; 2]))]);
        let table = reduce_and_filter(
            &pool,
            &Forms::All,
            &mut parcels(&[3, 5]),
            &DeveloperConfig::default(),
        )
        .unwrap()
        .unwrap();
        let df = table.to_frame().unwrap();
        assert_eq!(df.height(), 2);
        let ids: Vec<Option<i64>> = df
            .column(proposal::PARCEL_ID)
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(ids, vec![Some(3), Some(5)]);
        assert!(df.column(derived::NET_UNITS).is_ok());
    }

    #[test]
    fn extra_values_must_match_extra_columns() {
        let pool = Feasibility::wide([("residential", form_frame(&[1], &[10.0], &[4000.0]))]);
        let table = reduce_and_filter(
            &pool,
            &Forms::All,
            &mut parcels(&[1]),
            &DeveloperConfig::default(),
        )
        .unwrap()
        .unwrap();

        let err = CandidateTable::new(table.rows().to_vec(), vec!["building_cost".into()], false)
            .unwrap_err();
        assert!(matches!(err, DeveloperError::Validation(_)));
    }
}
