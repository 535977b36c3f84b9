/// Column-name constants for developer tables.
/// Single source of truth - exported to Python via PyO3.

// ── Proposal columns (feasibility input) ────────────────────────────────────
pub mod proposal {
    pub const PARCEL_ID: &str = "parcel_id";
    pub const FORM: &str = "form";
    pub const MAX_PROFIT: &str = "max_profit";
    pub const MAX_PROFIT_FAR: &str = "max_profit_far";
    pub const RESIDENTIAL_SQFT: &str = "residential_sqft";
    pub const NON_RESIDENTIAL_SQFT: &str = "non_residential_sqft";
    pub const STORIES: &str = "stories";

    /// Numeric attributes every proposal must carry.
    pub const REQUIRED: [&str; 5] = [
        MAX_PROFIT_FAR,
        RESIDENTIAL_SQFT,
        NON_RESIDENTIAL_SQFT,
        STORIES,
        MAX_PROFIT,
    ];
}

// ── Per-parcel series ───────────────────────────────────────────────────────
pub mod parcel {
    pub const PARCEL_SIZE: &str = "parcel_size";
    pub const AVE_UNIT_SIZE: &str = "ave_unit_size";
    pub const CURRENT_UNITS: &str = "current_units";
}

// ── Derived candidate columns ───────────────────────────────────────────────
pub mod derived {
    pub const RESIDENTIAL_UNITS: &str = "residential_units";
    pub const JOB_SPACES: &str = "job_spaces";
    pub const NET_UNITS: &str = "net_units";
    pub const MAX_PROFIT_PER_SIZE: &str = "max_profit_per_size";
}

// ── Output-only columns ─────────────────────────────────────────────────────
pub mod output {
    pub const YEAR_BUILT: &str = "year_built";
}

// ── Target table ────────────────────────────────────────────────────────────
pub mod target {
    pub const TARGET_UNITS: &str = "target_units";
}

/// Columns the reducer interprets itself; everything else numeric passes through.
pub fn is_known_column(name: &str) -> bool {
    name == proposal::PARCEL_ID
        || name == proposal::FORM
        || proposal::REQUIRED.contains(&name)
        || name == parcel::PARCEL_SIZE
        || name == parcel::AVE_UNIT_SIZE
        || name == parcel::CURRENT_UNITS
        || name == derived::RESIDENTIAL_UNITS
        || name == derived::JOB_SPACES
        || name == derived::NET_UNITS
        || name == derived::MAX_PROFIT_PER_SIZE
        || name == output::YEAR_BUILT
}
