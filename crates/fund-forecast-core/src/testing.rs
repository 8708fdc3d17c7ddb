//! Shared fixtures for unit and integration tests.

use rust_decimal_macros::dec;

use crate::inputs::{CheckSizeRange, FeeBasis, FundInputs, PacingCurve, StageStrategy, ValuationPolicy};
use crate::portfolio::matrices::{ExitProbabilityMatrix, GraduationMatrix};
use crate::types::Stage;
use crate::waterfall::WaterfallKind;

/// A $50M single-stage seed fund: ten $1M checks over a five-year investment
/// period, standard 2-and-20 with an 8% hurdle.
pub fn single_stage_fund() -> FundInputs {
    FundInputs {
        fund_size: dec!(50_000_000),
        vintage_year: 2024,
        management_fee_rate: dec!(0.02),
        carry_rate: dec!(0.20),
        hurdle_rate: dec!(0.08),
        gp_commitment_rate: dec!(0.02),
        catch_up_rate: dec!(1),
        investment_period_quarters: 20,
        fund_life_quarters: 40,
        lockup_quarters: 8,
        stage_strategies: vec![StageStrategy {
            stage: Stage::Seed,
            allocation_percent: dec!(1),
            check_size: CheckSizeRange {
                min: dec!(500_000),
                target: dec!(1_000_000),
                max: dec!(2_000_000),
            },
            target_ownership: dec!(0.10),
            target_companies: dec!(10),
            follow_on_percent: dec!(0.50),
            reserve_ratio: dec!(0.30),
            entry_valuation: dec!(10_000_000),
            exit_probabilities: None,
        }],
        graduation_matrix: GraduationMatrix::industry_default(),
        exit_probability_matrix: ExitProbabilityMatrix::industry_default(),
        fee_basis: FeeBasis::CommittedThenInvested,
        pacing: PacingCurve::FrontLoaded,
        valuation_policy: ValuationPolicy::default(),
        waterfall: WaterfallKind::American,
    }
}
