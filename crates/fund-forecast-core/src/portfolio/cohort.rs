use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::inputs::FundInputs;
use crate::types::{quarter_start_date, Money, Rate, Stage};
use crate::FundForecastResult;

// ---------------------------------------------------------------------------
// Portfolio entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyStatus {
    Active,
    Exited,
    WrittenOff,
}

/// One round of capital into a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub round: Stage,
    pub amount: Money,
    pub quarter: u32,
    pub date: NaiveDate,
    pub ownership: Rate,
    pub valuation: Money,
}

/// A simulated portfolio company. Created once by the cohort generator;
/// stage and status are mutated only by the transition model, valuation and
/// carrying value only by the timeline's appreciation step. `Exited` and
/// `WrittenOff` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioCompany {
    pub id: u32,
    pub name: String,
    /// Stage the company entered the portfolio at; governs follow-on policy.
    pub origin_stage: Stage,
    pub current_stage: Stage,
    pub investments: Vec<Investment>,
    /// Post-money valuation proxy, appreciated quarterly while active.
    pub current_valuation: Money,
    /// Cost basis appreciated quarterly; the company's NAV contribution.
    pub carrying_value: Money,
    pub status: CompanyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_value: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_quarter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_date: Option<NaiveDate>,
}

impl PortfolioCompany {
    /// Quarter the initial check was written.
    pub fn entry_quarter(&self) -> u32 {
        self.investments.first().map(|i| i.quarter).unwrap_or(0)
    }

    /// Total capital deployed into this company across all rounds.
    pub fn invested(&self) -> Money {
        self.investments.iter().map(|i| i.amount).sum()
    }

    /// Capital deployed beyond the initial check.
    pub fn follow_on_invested(&self) -> Money {
        self.investments.iter().skip(1).map(|i| i.amount).sum()
    }

    pub fn is_active(&self) -> bool {
        self.status == CompanyStatus::Active
    }
}

// ---------------------------------------------------------------------------
// Cohort generation
// ---------------------------------------------------------------------------

/// Materialize the synthetic portfolio from the fund's stage strategies.
///
/// Deterministic given identical inputs: company counts come from rounding
/// each strategy's target, entry quarters are spread across the investment
/// period by the pacing curve, and every company is seeded with one initial
/// investment at the strategy's target check, ownership, and entry
/// valuation. No randomness here keeps the plain forecast reproducible.
pub fn generate_cohort(inputs: &FundInputs) -> FundForecastResult<Vec<PortfolioCompany>> {
    let pacing_weights = inputs.pacing.weights(inputs.investment_period_quarters);
    let mut companies = Vec::new();
    let mut next_id: u32 = 0;

    for strategy in &inputs.stage_strategies {
        let count = strategy
            .target_companies
            .round()
            .to_u32()
            .unwrap_or(0);

        if count == 0 {
            if strategy.allocation_percent > Decimal::ZERO {
                return Err(ForecastError::Configuration {
                    field: "target_companies".into(),
                    reason: format!(
                        "Stage {} has allocation {} but rounds to zero companies",
                        strategy.stage, strategy.allocation_percent
                    ),
                });
            }
            continue;
        }

        let per_quarter = super::apportion(count as usize, &pacing_weights);
        // Post-money proxy for the initial mark
        let initial_valuation =
            strategy.entry_valuation * (Decimal::ONE + strategy.target_ownership);

        let mut company_idx = 0u32;
        for (quarter, quarter_count) in per_quarter.iter().enumerate() {
            for _ in 0..*quarter_count {
                company_idx += 1;
                let quarter = quarter as u32;
                let date = quarter_start_date(inputs.vintage_year, quarter);
                companies.push(PortfolioCompany {
                    id: next_id,
                    name: format!("{} {:02}", strategy.stage, company_idx),
                    origin_stage: strategy.stage,
                    current_stage: strategy.stage,
                    investments: vec![Investment {
                        round: strategy.stage,
                        amount: strategy.check_size.target,
                        quarter,
                        date,
                        ownership: strategy.target_ownership,
                        valuation: strategy.entry_valuation,
                    }],
                    current_valuation: initial_valuation,
                    carrying_value: strategy.check_size.target,
                    status: CompanyStatus::Active,
                    exit_value: None,
                    exit_quarter: None,
                    exit_date: None,
                });
                next_id += 1;
            }
        }
    }

    Ok(companies)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
