//! Quarterly fund timeline.
//!
//! Walks every quarter of the fund's life in order: capital deployment,
//! management fees, stage transitions, exit distributions, NAV marks, and
//! the performance ratios computed on the cumulative flows. IRRs are solved
//! once at the end from the full quarterly cash flow vectors and back-filled
//! onto every quarter.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::inputs::{FeeBasis, FundInputs};
use crate::portfolio::cohort::{CompanyStatus, Investment, PortfolioCompany};
use crate::portfolio::transition::{TransitionModel, TransitionOutcome};
use crate::time_value;
use crate::types::{quarter_start_date, Money, Multiple, Rate, Stage};
use crate::FundForecastResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// State of the fund at the end of one quarter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineQuarter {
    pub quarter: u32,
    pub date: NaiveDate,
    /// Capital deployed into companies this quarter (initial plus follow-on).
    pub deployed: Money,
    pub management_fees: Money,
    /// Capital called from partners this quarter (deployment plus fees).
    pub capital_called: Money,
    pub distributions: Money,
    pub net_cash_flow: Money,
    pub cumulative_net_cash_flow: Money,
    pub cumulative_invested: Money,
    pub cumulative_called: Money,
    pub cumulative_distributed: Money,
    pub nav: Money,
    pub dpi: Rate,
    pub rvpi: Rate,
    pub tvpi: Rate,
    pub gross_moic: Multiple,
    pub net_moic: Multiple,
    /// Carried interest accrued against realized and unrealized profit.
    pub carried_interest: Money,
    pub net_irr: Rate,
    pub gross_irr: Rate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineOutput {
    pub quarters: Vec<TimelineQuarter>,
    pub companies: Vec<PortfolioCompany>,
    pub total_called: Money,
    pub total_invested: Money,
    pub total_distributed: Money,
    pub total_management_fees: Money,
    pub final_nav: Money,
    pub carried_interest: Money,
    /// Annualized, net of fees and carry.
    pub net_irr: Rate,
    pub gross_irr: Rate,
    /// Capital-weighted average deployment age of the fund, in years. Used
    /// as the preferred-return horizon for American-style waterfalls.
    pub effective_years: Decimal,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Run the full quarterly timeline over a generated cohort.
///
/// The transition model is injected so the same engine serves both the
/// deterministic forecast and seeded Monte Carlo iterations.
pub fn run_timeline(
    inputs: &FundInputs,
    mut companies: Vec<PortfolioCompany>,
    model: &mut dyn TransitionModel,
) -> FundForecastResult<TimelineOutput> {
    let exit_matrix = inputs.effective_exit_matrix()?;
    let quarterly_growth = time_value::quarterly_factor(inputs.valuation_policy.annual_appreciation);
    let quarterly_fee_rate = inputs.management_fee_rate / dec!(4);
    let lp_fraction = Decimal::ONE - inputs.gp_commitment_rate;
    let n = inputs.fund_life_quarters as usize;

    let mut quarters: Vec<TimelineQuarter> = Vec::with_capacity(n);
    let mut net_flows: Vec<Money> = Vec::with_capacity(n);
    let mut gross_flows: Vec<Money> = Vec::with_capacity(n);
    let mut warnings: Vec<String> = Vec::new();

    let mut cum_invested = Decimal::ZERO;
    let mut cum_called = Decimal::ZERO;
    let mut cum_distributed = Decimal::ZERO;
    let mut cum_fees = Decimal::ZERO;
    let mut cum_net = Decimal::ZERO;
    let mut called_quarters_area = Decimal::ZERO;

    for q in 0..inputs.fund_life_quarters {
        let date = quarter_start_date(inputs.vintage_year, q);
        let in_investment_period = q < inputs.investment_period_quarters;

        // 1. Initial checks entering this quarter
        let mut deployed = Decimal::ZERO;
        for company in companies.iter() {
            if company.entry_quarter() == q {
                deployed += company.investments[0].amount;
            }
        }
        cum_invested += deployed;

        // 2. Management fees
        let fee_base = match inputs.fee_basis {
            FeeBasis::CommittedThenInvested => {
                if in_investment_period {
                    inputs.fund_size
                } else {
                    cum_invested
                }
            }
            FeeBasis::CommittedOnly => {
                if in_investment_period {
                    inputs.fund_size
                } else {
                    Decimal::ZERO
                }
            }
            FeeBasis::InvestedOnly => cum_invested,
        };
        let fees = fee_base * quarterly_fee_rate;
        cum_fees += fees;

        // 3. Stage transitions. Groups are snapshotted up front so a company
        // graduating into a later stage is not transitioned twice in one
        // quarter. The lock-up window blocks exits only; companies can still
        // graduate or fail inside it.
        let mut distributions = Decimal::ZERO;
        for stage in Stage::ALL {
            let group: Vec<usize> = companies
                .iter()
                .enumerate()
                .filter(|(_, c)| {
                    c.is_active() && c.current_stage == stage && c.entry_quarter() <= q
                })
                .map(|(i, _)| i)
                .collect();
            if group.is_empty() {
                continue;
            }

            let outcomes = model.outcomes(stage, group.len(), &inputs.graduation_matrix, &exit_matrix);
            for (&idx, outcome) in group.iter().zip(outcomes.iter()) {
                let company = &mut companies[idx];
                match *outcome {
                    TransitionOutcome::Remain => {}
                    TransitionOutcome::Graduate(next) => {
                        company.current_stage = next;
                        if in_investment_period {
                            if let Some(follow_on) = follow_on_amount(inputs, company) {
                                let ownership = if company.current_valuation.is_zero() {
                                    Decimal::ZERO
                                } else {
                                    follow_on / company.current_valuation
                                };
                                company.investments.push(Investment {
                                    round: next,
                                    amount: follow_on,
                                    quarter: q,
                                    date,
                                    ownership,
                                    valuation: company.current_valuation,
                                });
                                company.carrying_value += follow_on;
                                deployed += follow_on;
                                cum_invested += follow_on;
                            }
                        }
                    }
                    TransitionOutcome::Exit { multiple } => {
                        // Lock-up defers the exit; the company holds instead
                        if q < company.entry_quarter() + inputs.lockup_quarters {
                            continue;
                        }
                        let exit_value = company.invested() * multiple;
                        company.status = CompanyStatus::Exited;
                        company.exit_value = Some(exit_value);
                        company.exit_quarter = Some(q);
                        company.exit_date = Some(date);
                        company.carrying_value = Decimal::ZERO;
                        distributions += exit_value;
                    }
                    TransitionOutcome::Fail => {
                        company.status = CompanyStatus::WrittenOff;
                        company.exit_value = Some(Decimal::ZERO);
                        company.exit_quarter = Some(q);
                        company.exit_date = Some(date);
                        company.carrying_value = Decimal::ZERO;
                    }
                }
            }
        }
        cum_distributed += distributions;

        // 4. NAV marks: holdings appreciate each quarter after entry
        let mut nav = Decimal::ZERO;
        for company in companies.iter_mut() {
            if company.is_active() && company.entry_quarter() < q {
                company.carrying_value *= quarterly_growth;
                company.current_valuation *= quarterly_growth;
            }
            if company.is_active() && company.entry_quarter() <= q {
                nav += company.carrying_value;
            }
        }

        // 5. Cash flows and ratios
        let capital_called = deployed + fees;
        cum_called += capital_called;
        called_quarters_area += cum_called;
        let net_cash_flow = distributions - capital_called;
        cum_net += net_cash_flow;
        net_flows.push(net_cash_flow);
        gross_flows.push(distributions - deployed);

        let years_elapsed = Decimal::from(q + 1) / dec!(4);
        let hurdle_accrual = cum_called * lp_fraction * inputs.hurdle_rate * years_elapsed;
        let profit = cum_distributed + nav - cum_called;
        let carried_interest =
            inputs.carry_rate * (profit - hurdle_accrual).max(Decimal::ZERO);

        quarters.push(TimelineQuarter {
            quarter: q,
            date,
            deployed,
            management_fees: fees,
            capital_called,
            distributions,
            net_cash_flow,
            cumulative_net_cash_flow: cum_net,
            cumulative_invested: cum_invested,
            cumulative_called: cum_called,
            cumulative_distributed: cum_distributed,
            nav,
            dpi: ratio(cum_distributed, cum_called),
            rvpi: ratio(nav, cum_called),
            tvpi: ratio(cum_distributed + nav, cum_called),
            gross_moic: ratio(cum_distributed + nav, cum_invested),
            net_moic: ratio(cum_distributed + nav - carried_interest, cum_called),
            carried_interest,
            net_irr: Decimal::ZERO,
            gross_irr: Decimal::ZERO,
        });
    }

    let final_nav = quarters.last().map(|t| t.nav).unwrap_or(Decimal::ZERO);
    let carried_interest = quarters
        .last()
        .map(|t| t.carried_interest)
        .unwrap_or(Decimal::ZERO);

    // Terminal NAV is treated as a final-period flow for IRR purposes
    if let Some(last) = net_flows.last_mut() {
        *last += final_nav - carried_interest;
    }
    if let Some(last) = gross_flows.last_mut() {
        *last += final_nav;
    }

    let net_irr = solve_annual_irr(&net_flows, "net IRR", &mut warnings);
    let gross_irr = solve_annual_irr(&gross_flows, "gross IRR", &mut warnings);
    for quarter in quarters.iter_mut() {
        quarter.net_irr = net_irr;
        quarter.gross_irr = gross_irr;
    }

    let effective_years = if cum_called.is_zero() {
        Decimal::ZERO
    } else {
        called_quarters_area / (cum_called * dec!(4))
    };

    Ok(TimelineOutput {
        quarters,
        companies,
        total_called: cum_called,
        total_invested: cum_invested,
        total_distributed: cum_distributed,
        total_management_fees: cum_fees,
        final_nav,
        carried_interest,
        net_irr,
        gross_irr,
        effective_years,
        warnings,
    })
}

/// Follow-on reserve deployed when a company graduates, sized off the
/// origin strategy's target check.
fn follow_on_amount(inputs: &FundInputs, company: &PortfolioCompany) -> Option<Money> {
    let strategy = inputs.strategy_for(company.origin_stage)?;
    if strategy.follow_on_percent.is_zero() {
        return None;
    }
    Some(strategy.check_size.target * strategy.follow_on_percent)
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        Decimal::ZERO
    } else {
        numerator / denominator
    }
}

fn solve_annual_irr(flows: &[Money], label: &str, warnings: &mut Vec<String>) -> Rate {
    match time_value::irr(flows) {
        Some(quarterly) => time_value::annualize_quarterly(quarterly),
        None => {
            warnings.push(format!("{label} did not converge; reported as zero"));
            Decimal::ZERO
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portfolio::cohort::generate_cohort;
    use crate::portfolio::matrices::{GraduationMatrix, GraduationRow};
    use crate::portfolio::transition::ExpectedValueModel;
    use crate::testing::single_stage_fund;
    use pretty_assertions::assert_eq;

    fn uniform_graduation(row: GraduationRow) -> GraduationMatrix {
        GraduationMatrix::new([row; Stage::COUNT]).unwrap()
    }

    fn run_default() -> TimelineOutput {
        let inputs = single_stage_fund();
        let companies = generate_cohort(&inputs).unwrap();
        let mut model = ExpectedValueModel::new();
        run_timeline(&inputs, companies, &mut model).unwrap()
    }

    #[test]
    fn test_quarter_count_matches_fund_life() {
        let output = run_default();
        assert_eq!(output.quarters.len(), 40);
        assert_eq!(output.quarters[0].quarter, 0);
        assert_eq!(output.quarters[39].quarter, 39);
    }

    #[test]
    fn test_cumulative_series_are_monotone() {
        let output = run_default();
        for pair in output.quarters.windows(2) {
            assert!(pair[1].cumulative_invested >= pair[0].cumulative_invested);
            assert!(pair[1].cumulative_called >= pair[0].cumulative_called);
            assert!(pair[1].cumulative_distributed >= pair[0].cumulative_distributed);
        }
    }

    #[test]
    fn test_capital_called_is_deployment_plus_fees() {
        let output = run_default();
        for quarter in &output.quarters {
            assert_eq!(
                quarter.capital_called,
                quarter.deployed + quarter.management_fees
            );
        }
    }

    #[test]
    fn test_fees_accrue_on_committed_capital_during_investment_period() {
        let inputs = single_stage_fund();
        let output = run_default();
        // 2% annual on $50M committed = $250k per quarter
        let expected = inputs.fund_size * inputs.management_fee_rate / dec!(4);
        assert_eq!(output.quarters[0].management_fees, expected);
        assert_eq!(output.quarters[19].management_fees, expected);
    }

    #[test]
    fn test_no_fees_after_investment_period_when_committed_only() {
        let mut inputs = single_stage_fund();
        inputs.fee_basis = FeeBasis::CommittedOnly;
        let companies = generate_cohort(&inputs).unwrap();
        let mut model = ExpectedValueModel::new();
        let output = run_timeline(&inputs, companies, &mut model).unwrap();
        for quarter in &output.quarters {
            if quarter.quarter >= inputs.investment_period_quarters {
                assert_eq!(quarter.management_fees, Decimal::ZERO);
            } else {
                assert!(quarter.management_fees > Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_no_distributions_during_lockup() {
        let output = run_default();
        let inputs = single_stage_fund();
        for quarter in &output.quarters {
            if quarter.quarter < inputs.lockup_quarters {
                assert_eq!(quarter.distributions, Decimal::ZERO);
            }
        }
    }

    #[test]
    fn test_failures_recognized_during_lockup() {
        // A portfolio that fails immediately is written off inside the
        // lock-up window; lock-up holds exits back, not write-offs
        let mut inputs = single_stage_fund();
        inputs.graduation_matrix = uniform_graduation(GraduationRow {
            graduate: Decimal::ZERO,
            exit: Decimal::ZERO,
            fail: Decimal::ONE,
            remain: Decimal::ZERO,
        });
        let companies = generate_cohort(&inputs).unwrap();
        let mut model = ExpectedValueModel::new();
        let output = run_timeline(&inputs, companies, &mut model).unwrap();
        assert_eq!(output.total_distributed, Decimal::ZERO);
        for company in &output.companies {
            assert_eq!(company.status, CompanyStatus::WrittenOff);
            let exit_quarter = company.exit_quarter.unwrap();
            assert_eq!(exit_quarter, company.entry_quarter());
            assert!(exit_quarter < company.entry_quarter() + inputs.lockup_quarters);
        }
    }

    #[test]
    fn test_exits_deferred_until_lockup_expires() {
        // Every company tries to exit from its first quarter; the first
        // distribution lands exactly when the earliest entrants unlock
        let mut inputs = single_stage_fund();
        inputs.graduation_matrix = uniform_graduation(GraduationRow {
            graduate: Decimal::ZERO,
            exit: Decimal::ONE,
            fail: Decimal::ZERO,
            remain: Decimal::ZERO,
        });
        let companies = generate_cohort(&inputs).unwrap();
        let mut model = ExpectedValueModel::new();
        let output = run_timeline(&inputs, companies, &mut model).unwrap();
        for quarter in &output.quarters {
            if quarter.quarter < inputs.lockup_quarters {
                assert_eq!(quarter.distributions, Decimal::ZERO);
            }
        }
        let first = output
            .quarters
            .iter()
            .find(|t| t.distributions > Decimal::ZERO)
            .map(|t| t.quarter);
        assert_eq!(first, Some(inputs.lockup_quarters));
    }

    #[test]
    fn test_tvpi_is_dpi_plus_rvpi() {
        let output = run_default();
        for quarter in &output.quarters {
            let delta = (quarter.tvpi - (quarter.dpi + quarter.rvpi)).abs();
            assert!(delta < dec!(0.0000001), "q{}: delta={delta}", quarter.quarter);
        }
    }

    #[test]
    fn test_net_cash_flow_reconciles() {
        let output = run_default();
        let recomputed: Decimal = output
            .quarters
            .iter()
            .map(|q| q.distributions - q.capital_called)
            .sum();
        let last = output.quarters.last().unwrap();
        assert_eq!(last.cumulative_net_cash_flow, recomputed);
    }

    #[test]
    fn test_totals_match_quarter_sums() {
        let output = run_default();
        let fees: Decimal = output.quarters.iter().map(|q| q.management_fees).sum();
        let called: Decimal = output.quarters.iter().map(|q| q.capital_called).sum();
        let distributed: Decimal = output.quarters.iter().map(|q| q.distributions).sum();
        assert_eq!(output.total_management_fees, fees);
        assert_eq!(output.total_called, called);
        assert_eq!(output.total_distributed, distributed);
    }

    #[test]
    fn test_all_failure_matrix_produces_no_distributions() {
        let mut inputs = single_stage_fund();
        inputs.exit_probability_matrix =
            crate::portfolio::matrices::ExitProbabilityMatrix::all_failures();
        let companies = generate_cohort(&inputs).unwrap();
        let mut model = ExpectedValueModel::new();
        let output = run_timeline(&inputs, companies, &mut model).unwrap();
        assert_eq!(output.total_distributed, Decimal::ZERO);
        let last = output.quarters.last().unwrap();
        assert_eq!(last.dpi, Decimal::ZERO);
    }

    #[test]
    fn test_deterministic_runs_are_identical() {
        let a = run_default();
        let b = run_default();
        assert_eq!(a.quarters, b.quarters);
        assert_eq!(a.net_irr, b.net_irr);
    }

    #[test]
    fn test_effective_years_within_fund_life() {
        let output = run_default();
        assert!(output.effective_years > Decimal::ZERO);
        assert!(output.effective_years <= dec!(10));
    }

    #[test]
    fn test_irr_backfilled_on_every_quarter() {
        let output = run_default();
        for quarter in &output.quarters {
            assert_eq!(quarter.net_irr, output.net_irr);
            assert_eq!(quarter.gross_irr, output.gross_irr);
        }
    }
}
