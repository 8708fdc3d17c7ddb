use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::ForecastError;
use crate::types::{Money, Rate};
use crate::FundForecastResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// Net Present Value of an evenly spaced series of cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> FundForecastResult<Money> {
    if rate <= dec!(-1) {
        return Err(ForecastError::Configuration {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }

    let mut result = Decimal::ZERO;
    let one_plus_r = Decimal::ONE + rate;
    let mut discount = Decimal::ONE;

    for (t, cf) in cash_flows.iter().enumerate() {
        if t > 0 {
            discount *= one_plus_r;
        }
        if discount.is_zero() {
            return Err(ForecastError::DivisionByZero {
                context: format!("NPV discount factor at period {t}"),
            });
        }
        result += cf / discount;
    }

    Ok(result)
}

/// Periodic Internal Rate of Return via Newton-Raphson.
///
/// Discount factors are built by iterative multiplication rather than `powd`
/// to avoid precision drift, and all arithmetic uses checked operations so
/// large Decimal values cannot panic. Returns None when the series has no
/// sign change or the iteration does not converge; a total-loss series
/// (negative flows only) returns -100%.
pub fn irr(cash_flows: &[Money]) -> Option<Rate> {
    if cash_flows.len() < 2 {
        return None;
    }

    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !has_positive || !has_negative {
        if !has_positive && has_negative {
            return Some(dec!(-1));
        }
        return None;
    }

    let mut rate = dec!(0.10);

    for _ in 0..MAX_IRR_ITERATIONS {
        let mut npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let one_plus_r = Decimal::ONE + rate;

        if one_plus_r.is_zero() {
            rate += dec!(0.01);
            continue;
        }

        let mut discount = Decimal::ONE;
        let mut overflow = false;

        for (t, cf) in cash_flows.iter().enumerate() {
            if discount.is_zero() || overflow {
                break;
            }

            match cf.checked_div(discount) {
                Some(term) => npv_val += term,
                None => {
                    overflow = true;
                    break;
                }
            }

            if t > 0 {
                let t_dec = Decimal::from(t as i64);
                let denom = match discount.checked_mul(one_plus_r) {
                    Some(d) => d,
                    None => {
                        overflow = true;
                        break;
                    }
                };
                if !denom.is_zero() {
                    match t_dec.checked_mul(*cf).and_then(|n| n.checked_div(denom)) {
                        Some(term) => dnpv -= term,
                        None => {
                            overflow = true;
                            break;
                        }
                    }
                }
            }

            discount = match discount.checked_mul(one_plus_r) {
                Some(d) => d,
                None => {
                    overflow = true;
                    break;
                }
            };
        }

        if overflow {
            rate /= dec!(2);
            continue;
        }

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Some(rate);
        }

        if dnpv.is_zero() {
            return None;
        }

        match npv_val.checked_div(dnpv) {
            Some(step) => rate -= step,
            None => return None,
        }

        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        }
        if rate > dec!(10.0) {
            rate = dec!(10.0);
        }
    }

    None
}

/// Convert a quarterly rate of return to its annualized equivalent.
pub fn annualize_quarterly(quarterly: Rate) -> Rate {
    let base = Decimal::ONE + quarterly;
    if base <= Decimal::ZERO {
        return dec!(-1);
    }
    base.powu(4) - Decimal::ONE
}

/// Quarterly compounding factor for an annual rate: (1 + annual)^(1/4).
pub fn quarterly_factor(annual: Rate) -> Rate {
    let base = Decimal::ONE + annual;
    if base <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    base.powd(dec!(0.25))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // NPV at 10%: -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(1.0));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        let result = npv(dec!(0.0), &cfs).unwrap();
        assert_eq!(result, dec!(50));
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs).unwrap();
        // IRR should be ~9.7%
        assert!((result - dec!(0.097)).abs() < dec!(0.01));
    }

    #[test]
    fn test_irr_total_loss() {
        let cfs = vec![dec!(-1000), dec!(0), dec!(0)];
        assert_eq!(irr(&cfs), Some(dec!(-1)));
    }

    #[test]
    fn test_irr_no_sign_change() {
        let cfs = vec![dec!(100), dec!(100)];
        assert_eq!(irr(&cfs), None);
    }

    #[test]
    fn test_annualize_quarterly() {
        // 2% per quarter ≈ 8.24% annualized
        let annual = annualize_quarterly(dec!(0.02));
        assert!((annual - dec!(0.0824)).abs() < dec!(0.001));
    }

    #[test]
    fn test_quarterly_factor_roundtrip() {
        // Growing four quarters at the quarterly factor recovers the annual rate
        let f = quarterly_factor(dec!(0.15));
        let grown = f * f * f * f;
        assert!((grown - dec!(1.15)).abs() < dec!(0.0001));
    }
}
