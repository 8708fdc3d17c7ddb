use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Return multiples (e.g. 10 = 10x invested capital)
pub type Multiple = Decimal;

/// Funding stage of a portfolio company.
///
/// Matrices are indexed by `Stage::index()`, so the variant order here is
/// load-bearing: it must match the row order of `GraduationMatrix` and
/// `ExitProbabilityMatrix`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    PreSeed,
    Seed,
    SeriesA,
    SeriesB,
    SeriesC,
    SeriesDPlus,
}

impl Stage {
    pub const COUNT: usize = 6;

    pub const ALL: [Stage; Stage::COUNT] = [
        Stage::PreSeed,
        Stage::Seed,
        Stage::SeriesA,
        Stage::SeriesB,
        Stage::SeriesC,
        Stage::SeriesDPlus,
    ];

    /// Row index into stage-keyed tables.
    pub fn index(self) -> usize {
        match self {
            Stage::PreSeed => 0,
            Stage::Seed => 1,
            Stage::SeriesA => 2,
            Stage::SeriesB => 3,
            Stage::SeriesC => 4,
            Stage::SeriesDPlus => 5,
        }
    }

    /// Stage a company graduates into. Series D+ is a terminal stage for
    /// graduation purposes: any graduation mass keeps the company there.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::PreSeed => Some(Stage::Seed),
            Stage::Seed => Some(Stage::SeriesA),
            Stage::SeriesA => Some(Stage::SeriesB),
            Stage::SeriesB => Some(Stage::SeriesC),
            Stage::SeriesC => Some(Stage::SeriesDPlus),
            Stage::SeriesDPlus => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::PreSeed => "Pre-Seed",
            Stage::Seed => "Seed",
            Stage::SeriesA => "Series A",
            Stage::SeriesB => "Series B",
            Stage::SeriesC => "Series C",
            Stage::SeriesDPlus => "Series D+",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// How stage transitions and exit buckets are resolved each quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationMode {
    /// Apply probability rows as population-fraction splits. Reproducible
    /// with no randomness; this is what `run_forecast` uses.
    Deterministic,
    /// One weighted draw per company per quarter from a seeded generator.
    Stochastic { seed: u64 },
}

/// First day of the given fund quarter (quarters are 0-indexed from the
/// start of the vintage year).
pub fn quarter_start_date(vintage_year: i32, quarter: u32) -> NaiveDate {
    let year = vintage_year + (quarter / 4) as i32;
    let month = 1 + 3 * (quarter % 4);
    // Month is always one of 1, 4, 7, 10
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or_default()
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
