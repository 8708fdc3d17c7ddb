use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::portfolio::matrices::{ExitProbabilityMatrix, ExitRow, GraduationMatrix};
use crate::types::{Money, Rate, Stage};
use crate::waterfall::WaterfallKind;
use crate::FundForecastResult;

/// Stage-allocation percentages must sum to 1.0 within this tolerance.
pub const ALLOCATION_TOLERANCE: Decimal = dec!(0.001);

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What the quarterly management fee accrues against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeBasis {
    /// Committed capital during the investment period, invested capital
    /// afterwards. The standard LPA construction.
    #[default]
    CommittedThenInvested,
    /// Committed capital during the investment period, nothing afterwards.
    CommittedOnly,
    /// Cumulative invested capital throughout the fund life.
    InvestedOnly,
}

/// Shape of capital deployment across the investment period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacingCurve {
    /// Linearly declining weights: heavier deployment in the early quarters,
    /// tapering toward the end of the investment period.
    #[default]
    FrontLoaded,
    /// Equal deployment every quarter of the investment period.
    Even,
}

impl PacingCurve {
    /// Unnormalized per-quarter deployment weights over `quarters` periods.
    pub fn weights(self, quarters: u32) -> Vec<Decimal> {
        match self {
            PacingCurve::FrontLoaded => (0..quarters)
                .map(|q| Decimal::from(quarters - q))
                .collect(),
            PacingCurve::Even => vec![Decimal::ONE; quarters as usize],
        }
    }
}

/// How active companies are marked between rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationPolicy {
    /// Annual appreciation applied to active holdings, compounded quarterly.
    pub annual_appreciation: Rate,
}

impl Default for ValuationPolicy {
    fn default() -> Self {
        ValuationPolicy {
            annual_appreciation: dec!(0.15),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage strategy
// ---------------------------------------------------------------------------

/// Check-size band for one stage strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckSizeRange {
    pub min: Money,
    pub target: Money,
    pub max: Money,
}

/// One funding stage's investment policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageStrategy {
    pub stage: Stage,
    /// Fraction of the fund allocated to this stage; all strategies together
    /// must sum to 1.0.
    pub allocation_percent: Rate,
    pub check_size: CheckSizeRange,
    pub target_ownership: Rate,
    /// May be fractional (e.g. from Monte Carlo scaling); rounded when the
    /// cohort is materialized.
    pub target_companies: Decimal,
    /// Fraction of the initial check held for follow-on rounds.
    #[serde(default)]
    pub follow_on_percent: Rate,
    /// Fraction of this stage's allocation held back as reserves.
    #[serde(default)]
    pub reserve_ratio: Rate,
    pub entry_valuation: Money,
    /// Optional override of the fund-level exit row for this stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_probabilities: Option<ExitRow>,
}

// ---------------------------------------------------------------------------
// Fund inputs
// ---------------------------------------------------------------------------

/// Immutable fund configuration. Validated eagerly by `run_forecast` before
/// any simulation work starts; the engine never partially runs on bad input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundInputs {
    pub fund_size: Money,
    pub vintage_year: i32,
    /// Annual management fee as a decimal (0.02 = 2%); accrued quarterly.
    pub management_fee_rate: Rate,
    pub carry_rate: Rate,
    pub hurdle_rate: Rate,
    #[serde(default)]
    pub gp_commitment_rate: Rate,
    /// GP share within the catch-up tier (1.0 = full catch-up, 0 disables
    /// the tier).
    #[serde(default = "default_catch_up_rate")]
    pub catch_up_rate: Rate,
    pub investment_period_quarters: u32,
    pub fund_life_quarters: u32,
    /// Minimum holding period before a company can exit.
    #[serde(default = "default_lockup_quarters")]
    pub lockup_quarters: u32,
    pub stage_strategies: Vec<StageStrategy>,
    #[serde(default = "GraduationMatrix::industry_default")]
    pub graduation_matrix: GraduationMatrix,
    #[serde(default = "ExitProbabilityMatrix::industry_default")]
    pub exit_probability_matrix: ExitProbabilityMatrix,
    #[serde(default)]
    pub fee_basis: FeeBasis,
    #[serde(default)]
    pub pacing: PacingCurve,
    #[serde(default)]
    pub valuation_policy: ValuationPolicy,
    #[serde(default)]
    pub waterfall: WaterfallKind,
}

fn default_catch_up_rate() -> Rate {
    Decimal::ONE
}

fn default_lockup_quarters() -> u32 {
    8
}

impl FundInputs {
    /// Full fail-fast validation of configuration and probability matrices.
    pub fn validate(&self) -> FundForecastResult<()> {
        if self.fund_size <= Decimal::ZERO {
            return Err(config_err("fund_size", "Fund size must be positive"));
        }
        if self.fund_life_quarters == 0 {
            return Err(config_err(
                "fund_life_quarters",
                "Fund life must be at least 1 quarter",
            ));
        }
        if self.investment_period_quarters == 0
            || self.investment_period_quarters > self.fund_life_quarters
        {
            return Err(config_err(
                "investment_period_quarters",
                "Investment period must be 1..=fund_life_quarters",
            ));
        }
        check_fraction("management_fee_rate", self.management_fee_rate)?;
        check_fraction("carry_rate", self.carry_rate)?;
        check_fraction("gp_commitment_rate", self.gp_commitment_rate)?;
        check_fraction("catch_up_rate", self.catch_up_rate)?;
        if self.hurdle_rate < Decimal::ZERO {
            return Err(config_err("hurdle_rate", "Hurdle rate must be non-negative"));
        }

        if self.stage_strategies.is_empty() {
            return Err(config_err(
                "stage_strategies",
                "At least one stage strategy is required",
            ));
        }

        let allocation_sum: Decimal = self
            .stage_strategies
            .iter()
            .map(|s| s.allocation_percent)
            .sum();
        if (allocation_sum - Decimal::ONE).abs() > ALLOCATION_TOLERANCE {
            return Err(config_err(
                "stage_strategies",
                format!("Stage allocations sum to {allocation_sum}, expected 1.0"),
            ));
        }

        let mut seen = [false; Stage::COUNT];
        for strategy in &self.stage_strategies {
            let idx = strategy.stage.index();
            if seen[idx] {
                return Err(config_err(
                    "stage_strategies",
                    format!("Duplicate strategy for stage {}", strategy.stage),
                ));
            }
            seen[idx] = true;
            validate_strategy(strategy)?;
        }

        self.graduation_matrix.validate()?;
        self.exit_probability_matrix.validate()?;
        // Per-strategy override rows are checked by effective_exit_matrix
        self.effective_exit_matrix()?;

        Ok(())
    }

    /// Strategy governing companies that entered at `stage`, if any.
    pub fn strategy_for(&self, stage: Stage) -> Option<&StageStrategy> {
        self.stage_strategies.iter().find(|s| s.stage == stage)
    }

    /// Fund-level exit matrix with per-strategy overrides applied.
    pub fn effective_exit_matrix(&self) -> FundForecastResult<ExitProbabilityMatrix> {
        let mut matrix = self.exit_probability_matrix.clone();
        for strategy in &self.stage_strategies {
            if let Some(row) = strategy.exit_probabilities {
                matrix = matrix.with_row(strategy.stage, row)?;
            }
        }
        Ok(matrix)
    }

    /// Allocation-weighted reserve ratio across all stage strategies.
    pub fn total_reserve_ratio(&self) -> Rate {
        self.stage_strategies
            .iter()
            .map(|s| s.allocation_percent * s.reserve_ratio)
            .sum()
    }

    /// Total reserve pool available to the optimizer.
    pub fn reserve_pool(&self) -> Money {
        self.fund_size * self.total_reserve_ratio()
    }
}

fn validate_strategy(strategy: &StageStrategy) -> FundForecastResult<()> {
    let stage = strategy.stage;
    check_fraction("allocation_percent", strategy.allocation_percent)?;
    check_fraction("follow_on_percent", strategy.follow_on_percent)?;
    check_fraction("reserve_ratio", strategy.reserve_ratio)?;
    if strategy.target_ownership <= Decimal::ZERO || strategy.target_ownership > Decimal::ONE {
        return Err(config_err(
            "target_ownership",
            format!("Target ownership for {stage} must be in (0, 1]"),
        ));
    }
    if strategy.entry_valuation <= Decimal::ZERO {
        return Err(config_err(
            "entry_valuation",
            format!("Entry valuation for {stage} must be positive"),
        ));
    }
    if strategy.target_companies < Decimal::ZERO {
        return Err(config_err(
            "target_companies",
            format!("Target company count for {stage} cannot be negative"),
        ));
    }
    let cs = &strategy.check_size;
    if cs.min <= Decimal::ZERO || cs.target <= Decimal::ZERO || cs.max <= Decimal::ZERO {
        return Err(config_err(
            "check_size",
            format!("Check sizes for {stage} must be positive"),
        ));
    }
    if cs.min > cs.target || cs.target > cs.max {
        return Err(config_err(
            "check_size",
            format!("Check sizes for {stage} must satisfy min <= target <= max"),
        ));
    }
    Ok(())
}

fn check_fraction(field: &str, value: Rate) -> FundForecastResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE {
        return Err(config_err(field, "Must be between 0 and 1"));
    }
    Ok(())
}

fn config_err(field: &str, reason: impl Into<String>) -> ForecastError {
    ForecastError::Configuration {
        field: field.into(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::single_stage_fund;

    #[test]
    fn test_valid_inputs_pass() {
        assert!(single_stage_fund().validate().is_ok());
    }

    #[test]
    fn test_allocation_sum_rejected() {
        let mut inputs = single_stage_fund();
        inputs.stage_strategies[0].allocation_percent = dec!(0.9);
        let err = inputs.validate().unwrap_err();
        assert!(matches!(err, ForecastError::Configuration { ref field, .. } if field == "stage_strategies"));
    }

    #[test]
    fn test_investment_period_exceeding_life_rejected() {
        let mut inputs = single_stage_fund();
        inputs.investment_period_quarters = inputs.fund_life_quarters + 1;
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let mut inputs = single_stage_fund();
        let mut dup = inputs.stage_strategies[0].clone();
        dup.allocation_percent = Decimal::ZERO;
        inputs.stage_strategies.push(dup);
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_check_size_ordering_rejected() {
        let mut inputs = single_stage_fund();
        inputs.stage_strategies[0].check_size.min = dec!(5_000_000);
        assert!(inputs.validate().is_err());
    }

    #[test]
    fn test_override_row_validated() {
        let mut inputs = single_stage_fund();
        inputs.stage_strategies[0].exit_probabilities = Some(ExitRow {
            weights: [dec!(0.9); 6],
        });
        assert!(matches!(
            inputs.validate().unwrap_err(),
            ForecastError::InvalidProbabilityMatrix { .. }
        ));
    }

    #[test]
    fn test_reserve_pool_weighting() {
        let mut inputs = single_stage_fund();
        inputs.stage_strategies[0].reserve_ratio = dec!(0.4);
        assert_eq!(inputs.total_reserve_ratio(), dec!(0.4));
        assert_eq!(inputs.reserve_pool(), inputs.fund_size * dec!(0.4));
    }

    #[test]
    fn test_front_loaded_weights_decline() {
        let weights = PacingCurve::FrontLoaded.weights(4);
        assert_eq!(weights, vec![dec!(4), dec!(3), dec!(2), dec!(1)]);
    }

    #[test]
    fn test_serde_defaults_fill_policies() {
        let json = serde_json::to_value(single_stage_fund()).unwrap();
        let parsed: FundInputs = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.fee_basis, FeeBasis::CommittedThenInvested);
        assert!(parsed.validate().is_ok());
    }
}
