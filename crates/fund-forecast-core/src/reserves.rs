//! Follow-on reserve allocation.
//!
//! Ranks active companies by the probability-adjusted return on reserve
//! dollars and allocates the fund's reserve pool greedily, fully funding the
//! best opportunities first and pro-rating the marginal one when the pool
//! runs dry. Stage-level sufficiency compares what each stage's companies
//! need against what the ranking actually granted them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::inputs::FundInputs;
use crate::portfolio::cohort::PortfolioCompany;
use crate::types::{Money, Multiple, Rate, Stage};
use crate::FundForecastResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReserveRationale {
    /// The full requested follow-on reserve fits in the pool.
    FullyFunded,
    /// The pool ran out part-way through this company's request.
    PartiallyFunded,
    /// Ranked below the point where the pool was exhausted.
    PoolExhausted,
    /// The company's strategy plans no follow-on capital.
    NoFollowOnPlanned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveAllocation {
    pub company_id: u32,
    pub company_name: String,
    pub stage: Stage,
    /// Follow-on capital the company's strategy calls for.
    pub requested_reserve: Money,
    /// What the optimizer actually granted.
    pub recommended_reserve: Money,
    /// Expected exit multiple at the company's stage, scaled by the share of
    /// the check the strategy holds in reserve.
    pub exit_moic_on_reserves: Multiple,
    /// Exit MOIC discounted by the probability the reserve dollars are ever
    /// productive (graduation, or a favorable exit).
    pub probability_adjusted_return: Multiple,
    pub rationale: ReserveRationale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSufficiency {
    pub stage: Stage,
    pub companies: u32,
    pub needed: Money,
    pub allocated: Money,
    pub shortfall: Money,
    pub coverage_ratio: Rate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveAnalysis {
    pub reserve_pool: Money,
    pub total_requested: Money,
    pub total_allocated: Money,
    pub unallocated: Money,
    /// Per-company allocations in ranking order (best opportunity first).
    pub allocations: Vec<ReserveAllocation>,
    pub stage_sufficiency: Vec<StageSufficiency>,
}

// ---------------------------------------------------------------------------
// Optimizer
// ---------------------------------------------------------------------------

/// Allocate the reserve pool across the active companies of a cohort.
pub fn analyze_reserves(
    inputs: &FundInputs,
    companies: &[PortfolioCompany],
) -> FundForecastResult<ReserveAnalysis> {
    let exit_matrix = inputs.effective_exit_matrix()?;
    let pool = inputs.reserve_pool();

    let mut allocations: Vec<ReserveAllocation> = companies
        .iter()
        .filter(|c| c.is_active())
        .map(|company| {
            let stage = company.current_stage;
            let strategy = inputs.strategy_for(company.origin_stage);
            let requested = strategy
                .map(|s| s.check_size.target * s.follow_on_percent)
                .unwrap_or(Decimal::ZERO);
            let follow_on_percent = strategy
                .map(|s| s.follow_on_percent)
                .unwrap_or(Decimal::ZERO);

            let exit_row = exit_matrix.row(stage);
            let graduation_row = inputs.graduation_matrix.row(stage);
            // Only the follow-on share of the check earns the exit multiple
            let exit_moic = exit_row.expected_multiple() * follow_on_percent;
            // Reserve dollars only pay off if the company graduates or exits
            // above cost
            let productive_probability = graduation_row.graduate
                + graduation_row.exit * exit_row.favorable_probability();
            let adjusted = exit_moic * productive_probability;

            ReserveAllocation {
                company_id: company.id,
                company_name: company.name.clone(),
                stage,
                requested_reserve: requested,
                recommended_reserve: Decimal::ZERO,
                exit_moic_on_reserves: exit_moic,
                probability_adjusted_return: adjusted,
                rationale: if requested.is_zero() {
                    ReserveRationale::NoFollowOnPlanned
                } else {
                    ReserveRationale::PoolExhausted
                },
            }
        })
        .collect();

    // Best probability-adjusted return first; company id breaks ties so the
    // ranking is stable across runs
    allocations.sort_by(|a, b| {
        b.probability_adjusted_return
            .cmp(&a.probability_adjusted_return)
            .then(a.company_id.cmp(&b.company_id))
    });

    let mut remaining = pool;
    for allocation in allocations.iter_mut() {
        if allocation.requested_reserve.is_zero() || remaining.is_zero() {
            continue;
        }
        if allocation.requested_reserve <= remaining {
            allocation.recommended_reserve = allocation.requested_reserve;
            allocation.rationale = ReserveRationale::FullyFunded;
        } else {
            allocation.recommended_reserve = remaining;
            allocation.rationale = ReserveRationale::PartiallyFunded;
        }
        remaining -= allocation.recommended_reserve;
    }

    let total_requested: Money = allocations.iter().map(|a| a.requested_reserve).sum();
    let total_allocated: Money = allocations.iter().map(|a| a.recommended_reserve).sum();
    let stage_sufficiency = stage_rollup(&allocations);

    Ok(ReserveAnalysis {
        reserve_pool: pool,
        total_requested,
        total_allocated,
        unallocated: pool - total_allocated,
        allocations,
        stage_sufficiency,
    })
}

fn stage_rollup(allocations: &[ReserveAllocation]) -> Vec<StageSufficiency> {
    Stage::ALL
        .into_iter()
        .filter_map(|stage| {
            let at_stage: Vec<&ReserveAllocation> =
                allocations.iter().filter(|a| a.stage == stage).collect();
            if at_stage.is_empty() {
                return None;
            }
            let needed: Money = at_stage.iter().map(|a| a.requested_reserve).sum();
            let allocated: Money = at_stage.iter().map(|a| a.recommended_reserve).sum();
            let coverage_ratio = if needed.is_zero() {
                Decimal::ONE
            } else {
                allocated / needed
            };
            Some(StageSufficiency {
                stage,
                companies: at_stage.len() as u32,
                needed,
                allocated,
                shortfall: needed - allocated,
                coverage_ratio,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
