use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::types::{Money, Rate};
use crate::FundForecastResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Carry timing convention. Both kinds run the same tier cascade against the
/// fund's aggregate totals over the LP capital base; they differ only in the
/// period the preferred return accrues over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaterfallKind {
    /// Capital base is LP called capital; preferred accrues over the average
    /// time called capital was actually outstanding.
    #[default]
    American,
    /// Carry only after 100% of LP called capital plus preferred over the
    /// full fund life is returned.
    European,
}

/// Aggregate totals the waterfall splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallInput {
    pub total_distributions: Money,
    pub total_capital_called: Money,
    pub gp_commitment_rate: Rate,
    pub hurdle_rate: Rate,
    pub carry_rate: Rate,
    /// GP share within the catch-up tier; zero disables the tier.
    pub catch_up_rate: Rate,
    pub kind: WaterfallKind,
    /// Average years each called dollar was outstanding (American preferred
    /// base).
    pub effective_years: Decimal,
    /// Fund life in years (European preferred base).
    pub fund_life_years: Decimal,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Result for a single waterfall tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallTierResult {
    pub tier_name: String,
    pub amount: Money,
    pub to_lp: Money,
    pub to_gp: Money,
    pub remaining: Money,
}

/// Tiered split of total distributions between LP and GP.
/// Always satisfies `lp_distributions + gp_distributions ==
/// total_distributions` to machine precision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterfallSummary {
    pub kind: WaterfallKind,
    pub total_distributions: Money,
    /// Capital base used for return of capital and preferred return.
    pub capital_base: Money,
    pub return_of_capital: Money,
    pub preferred_return: Money,
    pub catch_up: Money,
    pub carried_interest: Money,
    pub lp_distributions: Money,
    pub gp_distributions: Money,
    pub tiers: Vec<WaterfallTierResult>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Split aggregate distributions through the four-tier cascade: return of
/// capital, preferred return, GP catch-up, residual carry split. Each tier
/// consumes only what remains after prior tiers; a tier that cannot be fully
/// funded pays out the remainder and the cascade ends there.
pub fn distribute(input: &WaterfallInput) -> FundForecastResult<WaterfallSummary> {
    if input.total_distributions < Decimal::ZERO {
        return Err(ForecastError::Configuration {
            field: "total_distributions".into(),
            reason: "Total distributions cannot be negative".into(),
        });
    }
    if input.total_capital_called < Decimal::ZERO {
        return Err(ForecastError::Configuration {
            field: "total_capital_called".into(),
            reason: "Capital called cannot be negative".into(),
        });
    }
    for (field, value) in [
        ("gp_commitment_rate", input.gp_commitment_rate),
        ("carry_rate", input.carry_rate),
        ("catch_up_rate", input.catch_up_rate),
    ] {
        if value < Decimal::ZERO || value > Decimal::ONE {
            return Err(ForecastError::Configuration {
                field: field.into(),
                reason: "Must be between 0 and 1".into(),
            });
        }
    }

    // Both kinds run against LP capital; the GP commitment never earns the
    // preferred return
    let lp_capital = input.total_capital_called * (Decimal::ONE - input.gp_commitment_rate);
    let (capital_base, preferred_years) = match input.kind {
        WaterfallKind::American => (lp_capital, input.effective_years),
        WaterfallKind::European => (lp_capital, input.fund_life_years),
    };

    let mut remaining = input.total_distributions;
    let mut tiers: Vec<WaterfallTierResult> = Vec::with_capacity(4);

    // Tier 1: return of capital, entirely to LPs
    let roc = remaining.min(capital_base);
    remaining -= roc;
    tiers.push(tier("Return of Capital", roc, roc, Decimal::ZERO, remaining));

    // Tier 2: preferred return at the hurdle, entirely to LPs
    let preferred_target = capital_base * input.hurdle_rate * preferred_years;
    let preferred = remaining.min(preferred_target).max(Decimal::ZERO);
    remaining -= preferred;
    tiers.push(tier(
        "Preferred Return",
        preferred,
        preferred,
        Decimal::ZERO,
        remaining,
    ));

    // Tier 3: GP catch-up until GP carry equals carry_rate of profit above
    // capital return: carry / (1 - carry) * preferred paid so far
    let mut catch_up_gp = Decimal::ZERO;
    if input.catch_up_rate > Decimal::ZERO
        && input.carry_rate > Decimal::ZERO
        && input.carry_rate < Decimal::ONE
    {
        let gp_target = input.carry_rate / (Decimal::ONE - input.carry_rate) * preferred;
        let tier_target = gp_target / input.catch_up_rate;
        let amount = remaining.min(tier_target).max(Decimal::ZERO);
        catch_up_gp = amount * input.catch_up_rate;
        let to_lp = amount - catch_up_gp;
        remaining -= amount;
        tiers.push(tier("GP Catch-Up", amount, to_lp, catch_up_gp, remaining));
    }

    // Tier 4: residual split at the carry rate
    let residual = remaining;
    let residual_gp = residual * input.carry_rate;
    let residual_lp = residual - residual_gp;
    remaining = Decimal::ZERO;
    tiers.push(tier(
        "Residual Split",
        residual,
        residual_lp,
        residual_gp,
        remaining,
    ));

    let lp_distributions: Money = tiers.iter().map(|t| t.to_lp).sum();
    let gp_distributions: Money = tiers.iter().map(|t| t.to_gp).sum();

    Ok(WaterfallSummary {
        kind: input.kind,
        total_distributions: input.total_distributions,
        capital_base,
        return_of_capital: roc,
        preferred_return: preferred,
        catch_up: catch_up_gp,
        carried_interest: catch_up_gp + residual_gp,
        lp_distributions,
        gp_distributions,
        tiers,
    })
}

fn tier(
    name: &str,
    amount: Money,
    to_lp: Money,
    to_gp: Money,
    remaining: Money,
) -> WaterfallTierResult {
    WaterfallTierResult {
        tier_name: name.to_string(),
        amount,
        to_lp,
        to_gp,
        remaining,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    /// Standard terms: 2% GP commit, 8% hurdle, 20% carry, full catch-up
    fn standard_input(total: Money, called: Money) -> WaterfallInput {
        WaterfallInput {
            total_distributions: total,
            total_capital_called: called,
            gp_commitment_rate: dec!(0.02),
            hurdle_rate: dec!(0.08),
            carry_rate: dec!(0.20),
            catch_up_rate: dec!(1.0),
            kind: WaterfallKind::American,
            effective_years: dec!(5),
            fund_life_years: dec!(10),
        }
    }

    #[test]
    fn test_full_cascade() {
        // $100M called, $200M distributed
        let summary = distribute(&standard_input(dec!(200), dec!(100))).unwrap();

        // LP capital base = 100 * 0.98 = 98
        assert_eq!(summary.capital_base, dec!(98));
        assert_eq!(summary.return_of_capital, dec!(98));
        // Preferred = 98 * 0.08 * 5 = 39.2
        assert_eq!(summary.preferred_return, dec!(39.2));
        // Catch-up: 0.20 / 0.80 * 39.2 = 9.8, all to GP
        assert_eq!(summary.catch_up, dec!(9.8));
        // Residual = 200 - 98 - 39.2 - 9.8 = 53, split 80/20
        let residual = &summary.tiers[3];
        assert_eq!(residual.amount, dec!(53));
        assert_eq!(residual.to_gp, dec!(10.60));
        assert_eq!(summary.carried_interest, dec!(9.8) + dec!(10.60));
        assert_eq!(
            summary.lp_distributions + summary.gp_distributions,
            dec!(200)
        );
    }

    #[test]
    fn test_partial_return_of_capital() {
        // Distributions below the capital base: the cascade stops in tier 1
        let summary = distribute(&standard_input(dec!(60), dec!(100))).unwrap();
        assert_eq!(summary.return_of_capital, dec!(60));
        assert_eq!(summary.preferred_return, dec!(0));
        assert_eq!(summary.carried_interest, dec!(0));
        assert_eq!(summary.gp_distributions, dec!(0));
        assert_eq!(summary.lp_distributions, dec!(60));
    }

    #[test]
    fn test_no_carry_below_hurdle() {
        // Capital returned but preferred not fully funded
        let summary = distribute(&standard_input(dec!(110), dec!(100))).unwrap();
        assert_eq!(summary.return_of_capital, dec!(98));
        // Remaining 12 < 39.2 preferred target
        assert_eq!(summary.preferred_return, dec!(12));
        assert_eq!(summary.carried_interest, dec!(0));
        assert_eq!(
            summary.lp_distributions + summary.gp_distributions,
            dec!(110)
        );
    }

    #[test]
    fn test_zero_distributions() {
        let summary = distribute(&standard_input(dec!(0), dec!(100))).unwrap();
        assert_eq!(summary.total_distributions, dec!(0));
        assert_eq!(summary.lp_distributions, dec!(0));
        assert_eq!(summary.gp_distributions, dec!(0));
        for t in &summary.tiers {
            assert_eq!(t.amount, dec!(0));
        }
    }

    #[test]
    fn test_catch_up_disabled() {
        let mut input = standard_input(dec!(200), dec!(100));
        input.catch_up_rate = dec!(0);
        let summary = distribute(&input).unwrap();
        assert_eq!(summary.catch_up, dec!(0));
        // Only ROC, preferred, and residual tiers
        assert_eq!(summary.tiers.len(), 3);
        assert_eq!(
            summary.lp_distributions + summary.gp_distributions,
            dec!(200)
        );
    }

    #[test]
    fn test_european_nets_gp_commitment_and_uses_fund_life() {
        let mut input = standard_input(dec!(300), dec!(100));
        input.kind = WaterfallKind::European;
        let summary = distribute(&input).unwrap();
        // Same LP capital base as American, preferred over the whole fund life
        assert_eq!(summary.capital_base, dec!(98));
        assert_eq!(summary.preferred_return, dec!(98) * dec!(0.08) * dec!(10));
        assert_eq!(
            summary.lp_distributions + summary.gp_distributions,
            dec!(300)
        );
        // European pays less carry than American on the same totals
        let american = distribute(&standard_input(dec!(300), dec!(100))).unwrap();
        assert!(summary.carried_interest < american.carried_interest);
    }

    #[test]
    fn test_conservation_across_scales() {
        for (total, called) in [
            (dec!(0.01), dec!(1)),
            (dec!(137.55), dec!(100)),
            (dec!(5_000_000_000), dec!(850_000_000)),
        ] {
            let summary = distribute(&standard_input(total, called)).unwrap();
            assert_eq!(
                summary.lp_distributions + summary.gp_distributions,
                total,
                "conservation failed for total={total}"
            );
        }
    }

    #[test]
    fn test_negative_distributions_rejected() {
        let input = standard_input(dec!(-5), dec!(100));
        assert!(distribute(&input).is_err());
    }

    #[test]
    fn test_invalid_carry_rate_rejected() {
        let mut input = standard_input(dec!(100), dec!(100));
        input.carry_rate = dec!(1.5);
        assert!(distribute(&input).is_err());
    }

    #[test]
    fn test_tier_remaining_chain() {
        let summary = distribute(&standard_input(dec!(200), dec!(100))).unwrap();
        let mut expected_remaining = dec!(200);
        for t in &summary.tiers {
            expected_remaining -= t.amount;
            assert_eq!(t.remaining, expected_remaining);
            assert_eq!(t.to_lp + t.to_gp, t.amount);
        }
        assert_eq!(expected_remaining, dec!(0));
    }
}
