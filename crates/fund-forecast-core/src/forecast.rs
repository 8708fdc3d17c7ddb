//! End-to-end fund forecast.
//!
//! Validates the fund configuration, materializes the cohort, runs the
//! quarterly timeline under the requested simulation mode, splits aggregate
//! distributions through the waterfall, and attaches reserve analysis plus
//! summary views of the result.

use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::inputs::FundInputs;
use crate::portfolio::cohort::{generate_cohort, CompanyStatus, PortfolioCompany};
use crate::portfolio::transition::model_for;
use crate::reserves::{analyze_reserves, ReserveAnalysis};
use crate::timeline::{run_timeline, TimelineOutput, TimelineQuarter};
use crate::types::{with_metadata, ComputationOutput, Money, Multiple, Rate, SimulationMode, Stage};
use crate::waterfall::{distribute, WaterfallInput, WaterfallSummary};
use crate::FundForecastResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Headline fund performance, taken at the end of the fund's life.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundMetrics {
    pub net_irr: Rate,
    pub gross_irr: Rate,
    pub net_moic: Multiple,
    pub gross_moic: Multiple,
    pub dpi: Rate,
    pub rvpi: Rate,
    pub tvpi: Rate,
    pub total_called: Money,
    pub total_invested: Money,
    pub total_distributed: Money,
    pub total_management_fees: Money,
    pub carried_interest: Money,
    pub final_nav: Money,
    pub lp_distributions: Money,
    pub gp_distributions: Money,
}

/// Outcome roll-up for the companies that entered at one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBreakdown {
    pub stage: Stage,
    pub companies: u32,
    pub exited: u32,
    pub written_off: u32,
    pub still_active: u32,
    pub invested: Money,
    pub realized_value: Money,
    pub unrealized_value: Money,
    pub gross_multiple: Multiple,
}

/// Shape of the fund's J-curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingSummary {
    /// Quarter with the heaviest capital deployment.
    pub peak_deployment_quarter: u32,
    /// Bottom of the J-curve: quarter where cumulative net cash flow is most
    /// negative.
    pub j_curve_trough_quarter: u32,
    pub trough_net_position: Money,
    /// First quarter where cumulative net cash flow turns non-negative, if
    /// the fund ever breaks even on a cash basis.
    pub breakeven_quarter: Option<u32>,
    pub first_distribution_quarter: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResult {
    pub timeline: TimelineOutput,
    pub waterfall: WaterfallSummary,
    pub metrics: FundMetrics,
    pub reserves: ReserveAnalysis,
    pub stage_breakdown: Vec<StageBreakdown>,
    pub pacing: PacingSummary,
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------

/// Run the deterministic expected-value forecast.
pub fn run_forecast(inputs: &FundInputs) -> FundForecastResult<ComputationOutput<ForecastResult>> {
    run_forecast_with_mode(inputs, SimulationMode::Deterministic)
}

/// Run a forecast under an explicit simulation mode. Stochastic mode is what
/// Monte Carlo iterations use internally, with per-iteration seeds.
pub fn run_forecast_with_mode(
    inputs: &FundInputs,
    mode: SimulationMode,
) -> FundForecastResult<ComputationOutput<ForecastResult>> {
    let start = Instant::now();

    inputs.validate()?;
    let cohort = generate_cohort(inputs)?;
    // Reserve planning looks at the cohort as constructed, before outcomes
    // are known
    let reserves = analyze_reserves(inputs, &cohort)?;

    let mut model = model_for(mode);
    let timeline = run_timeline(inputs, cohort, model.as_mut())?;

    let waterfall = distribute(&WaterfallInput {
        total_distributions: timeline.total_distributed,
        total_capital_called: timeline.total_called,
        gp_commitment_rate: inputs.gp_commitment_rate,
        hurdle_rate: inputs.hurdle_rate,
        carry_rate: inputs.carry_rate,
        catch_up_rate: inputs.catch_up_rate,
        kind: inputs.waterfall,
        effective_years: timeline.effective_years,
        fund_life_years: Decimal::from(inputs.fund_life_quarters) / Decimal::from(4u32),
    })?;

    let metrics = build_metrics(&timeline, &waterfall);
    let stage_breakdown = build_stage_breakdown(&timeline.companies);
    let pacing = build_pacing_summary(&timeline.quarters);
    let warnings = timeline.warnings.clone();

    let result = ForecastResult {
        timeline,
        waterfall,
        metrics,
        reserves,
        stage_breakdown,
        pacing,
    };

    Ok(with_metadata(
        "Quarterly cohort simulation: stage-transition model over the fund life, \
         four-tier distribution waterfall, greedy follow-on reserve ranking",
        inputs,
        warnings,
        start.elapsed().as_micros() as u64,
        result,
    ))
}

fn build_metrics(timeline: &TimelineOutput, waterfall: &WaterfallSummary) -> FundMetrics {
    let last = timeline.quarters.last();
    FundMetrics {
        net_irr: timeline.net_irr,
        gross_irr: timeline.gross_irr,
        net_moic: last.map(|q| q.net_moic).unwrap_or(Decimal::ZERO),
        gross_moic: last.map(|q| q.gross_moic).unwrap_or(Decimal::ZERO),
        dpi: last.map(|q| q.dpi).unwrap_or(Decimal::ZERO),
        rvpi: last.map(|q| q.rvpi).unwrap_or(Decimal::ZERO),
        tvpi: last.map(|q| q.tvpi).unwrap_or(Decimal::ZERO),
        total_called: timeline.total_called,
        total_invested: timeline.total_invested,
        total_distributed: timeline.total_distributed,
        total_management_fees: timeline.total_management_fees,
        carried_interest: timeline.carried_interest,
        final_nav: timeline.final_nav,
        lp_distributions: waterfall.lp_distributions,
        gp_distributions: waterfall.gp_distributions,
    }
}

fn build_stage_breakdown(companies: &[PortfolioCompany]) -> Vec<StageBreakdown> {
    Stage::ALL
        .into_iter()
        .filter_map(|stage| {
            let at_stage: Vec<&PortfolioCompany> = companies
                .iter()
                .filter(|c| c.origin_stage == stage)
                .collect();
            if at_stage.is_empty() {
                return None;
            }
            let invested: Money = at_stage.iter().map(|c| c.invested()).sum();
            let realized: Money = at_stage
                .iter()
                .filter_map(|c| c.exit_value)
                .sum();
            let unrealized: Money = at_stage
                .iter()
                .filter(|c| c.is_active())
                .map(|c| c.carrying_value)
                .sum();
            let gross_multiple = if invested.is_zero() {
                Decimal::ZERO
            } else {
                (realized + unrealized) / invested
            };
            Some(StageBreakdown {
                stage,
                companies: at_stage.len() as u32,
                exited: at_stage
                    .iter()
                    .filter(|c| c.status == CompanyStatus::Exited)
                    .count() as u32,
                written_off: at_stage
                    .iter()
                    .filter(|c| c.status == CompanyStatus::WrittenOff)
                    .count() as u32,
                still_active: at_stage.iter().filter(|c| c.is_active()).count() as u32,
                invested,
                realized_value: realized,
                unrealized_value: unrealized,
                gross_multiple,
            })
        })
        .collect()
}

fn build_pacing_summary(quarters: &[TimelineQuarter]) -> PacingSummary {
    let mut peak_deployment_quarter = 0;
    let mut peak_deployment = Decimal::MIN;
    let mut trough_quarter = 0;
    let mut trough = Decimal::MAX;
    let mut breakeven_quarter = None;
    let mut first_distribution_quarter = None;

    for quarter in quarters {
        if quarter.deployed > peak_deployment {
            peak_deployment = quarter.deployed;
            peak_deployment_quarter = quarter.quarter;
        }
        if quarter.cumulative_net_cash_flow < trough {
            trough = quarter.cumulative_net_cash_flow;
            trough_quarter = quarter.quarter;
        }
        if breakeven_quarter.is_none()
            && quarter.quarter > 0
            && quarter.cumulative_net_cash_flow >= Decimal::ZERO
        {
            breakeven_quarter = Some(quarter.quarter);
        }
        if first_distribution_quarter.is_none() && quarter.distributions > Decimal::ZERO {
            first_distribution_quarter = Some(quarter.quarter);
        }
    }

    PacingSummary {
        peak_deployment_quarter,
        j_curve_trough_quarter: trough_quarter,
        trough_net_position: if trough == Decimal::MAX {
            Decimal::ZERO
        } else {
            trough
        },
        breakeven_quarter,
        first_distribution_quarter,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
