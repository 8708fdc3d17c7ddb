use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::ForecastError;
use crate::types::{Multiple, Rate, Stage};
use crate::FundForecastResult;

/// Probability rows must sum to 1.0 within this tolerance.
pub const ROW_SUM_TOLERANCE: Decimal = dec!(0.001);

// ---------------------------------------------------------------------------
// Exit buckets
// ---------------------------------------------------------------------------

/// Return-multiple bucket an exit lands in. `Failure` covers exits that
/// return nothing (distinct from a write-off only in that the company
/// technically found a buyer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitBucket {
    Failure,
    ReturnOfCapital,
    Moderate,
    Good,
    Excellent,
    Outlier,
}

impl ExitBucket {
    pub const COUNT: usize = 6;

    pub const ALL: [ExitBucket; ExitBucket::COUNT] = [
        ExitBucket::Failure,
        ExitBucket::ReturnOfCapital,
        ExitBucket::Moderate,
        ExitBucket::Good,
        ExitBucket::Excellent,
        ExitBucket::Outlier,
    ];

    pub fn index(self) -> usize {
        match self {
            ExitBucket::Failure => 0,
            ExitBucket::ReturnOfCapital => 1,
            ExitBucket::Moderate => 2,
            ExitBucket::Good => 3,
            ExitBucket::Excellent => 4,
            ExitBucket::Outlier => 5,
        }
    }

    /// Representative return multiple for the bucket.
    pub fn multiple(self) -> Multiple {
        match self {
            ExitBucket::Failure => dec!(0),
            ExitBucket::ReturnOfCapital => dec!(1),
            ExitBucket::Moderate => dec!(3),
            ExitBucket::Good => dec!(5),
            ExitBucket::Excellent => dec!(10),
            ExitBucket::Outlier => dec!(20),
        }
    }

    /// Buckets that return more than invested capital.
    pub fn is_favorable(self) -> bool {
        self.multiple() > Decimal::ONE
    }
}

// ---------------------------------------------------------------------------
// Graduation matrix
// ---------------------------------------------------------------------------

/// One stage's per-quarter transition distribution over
/// {graduate, exit, fail, remain}.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GraduationRow {
    pub graduate: Rate,
    pub exit: Rate,
    pub fail: Rate,
    pub remain: Rate,
}

impl GraduationRow {
    pub fn sum(&self) -> Decimal {
        self.graduate + self.exit + self.fail + self.remain
    }
}

/// Stage-to-outcome transition probabilities: a time-homogeneous absorbing
/// Markov chain over stages with Exit and Fail as the absorbing classes.
/// Rows are validated at construction; `validate` re-checks rows that
/// arrived through deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraduationMatrix {
    rows: [GraduationRow; Stage::COUNT],
}

impl GraduationMatrix {
    pub fn new(rows: [GraduationRow; Stage::COUNT]) -> FundForecastResult<Self> {
        let matrix = GraduationMatrix { rows };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn row(&self, stage: Stage) -> &GraduationRow {
        &self.rows[stage.index()]
    }

    pub fn validate(&self) -> FundForecastResult<()> {
        for stage in Stage::ALL {
            check_row_sum(stage, self.rows[stage.index()].sum())?;
        }
        Ok(())
    }

    /// Per-quarter transition rates drawn from typical stage-progression
    /// studies; deliberately conservative in the late stages.
    pub fn industry_default() -> Self {
        GraduationMatrix {
            rows: [
                row(dec!(0.08), dec!(0.005), dec!(0.05), dec!(0.865)),
                row(dec!(0.07), dec!(0.01), dec!(0.04), dec!(0.88)),
                row(dec!(0.06), dec!(0.02), dec!(0.03), dec!(0.89)),
                row(dec!(0.05), dec!(0.03), dec!(0.02), dec!(0.90)),
                row(dec!(0.04), dec!(0.05), dec!(0.015), dec!(0.895)),
                row(dec!(0.00), dec!(0.07), dec!(0.01), dec!(0.92)),
            ],
        }
    }

    /// Scale graduation and exit rates by `factor`, rebalancing `remain` so
    /// each row still sums to 1. Used for Monte Carlo perturbation. If the
    /// scaled outcomes exceed the row, they are renormalized and `remain`
    /// drops to zero.
    pub fn scale_progression(&self, factor: Rate) -> Self {
        let factor = factor.max(Decimal::ZERO);
        let mut rows = self.rows;
        for r in &mut rows {
            let graduate = r.graduate * factor;
            let exit = r.exit * factor;
            let moving = graduate + exit + r.fail;
            if moving <= Decimal::ONE {
                *r = GraduationRow {
                    graduate,
                    exit,
                    fail: r.fail,
                    remain: Decimal::ONE - moving,
                };
            } else {
                *r = GraduationRow {
                    graduate: graduate / moving,
                    exit: exit / moving,
                    fail: r.fail / moving,
                    remain: Decimal::ZERO,
                };
            }
        }
        GraduationMatrix { rows }
    }
}

fn row(graduate: Rate, exit: Rate, fail: Rate, remain: Rate) -> GraduationRow {
    GraduationRow {
        graduate,
        exit,
        fail,
        remain,
    }
}

// ---------------------------------------------------------------------------
// Exit probability matrix
// ---------------------------------------------------------------------------

/// One stage's distribution over exit-multiple buckets, in `ExitBucket::ALL`
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExitRow {
    pub weights: [Rate; ExitBucket::COUNT],
}

impl ExitRow {
    pub fn sum(&self) -> Decimal {
        self.weights.iter().copied().sum()
    }

    pub fn weight(&self, bucket: ExitBucket) -> Rate {
        self.weights[bucket.index()]
    }

    /// Probability-weighted exit multiple for this row.
    pub fn expected_multiple(&self) -> Multiple {
        ExitBucket::ALL
            .iter()
            .map(|b| self.weight(*b) * b.multiple())
            .sum()
    }

    /// Probability mass on buckets returning more than 1x.
    pub fn favorable_probability(&self) -> Rate {
        ExitBucket::ALL
            .iter()
            .filter(|b| b.is_favorable())
            .map(|b| self.weight(*b))
            .sum()
    }
}

/// Per-stage distributions over exit-multiple buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitProbabilityMatrix {
    rows: [ExitRow; Stage::COUNT],
}

impl ExitProbabilityMatrix {
    pub fn new(rows: [ExitRow; Stage::COUNT]) -> FundForecastResult<Self> {
        let matrix = ExitProbabilityMatrix { rows };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn row(&self, stage: Stage) -> &ExitRow {
        &self.rows[stage.index()]
    }

    pub fn validate(&self) -> FundForecastResult<()> {
        for stage in Stage::ALL {
            check_row_sum(stage, self.rows[stage.index()].sum())?;
        }
        Ok(())
    }

    /// Replace a single stage's row (used for per-strategy overrides).
    /// The replacement row is validated.
    pub fn with_row(&self, stage: Stage, new_row: ExitRow) -> FundForecastResult<Self> {
        check_row_sum(stage, new_row.sum())?;
        let mut rows = self.rows;
        rows[stage.index()] = new_row;
        Ok(ExitProbabilityMatrix { rows })
    }

    /// Later stages exit at lower multiples but fail far less often.
    pub fn industry_default() -> Self {
        ExitProbabilityMatrix {
            rows: [
                exit_row([dec!(0.40), dec!(0.25), dec!(0.15), dec!(0.10), dec!(0.07), dec!(0.03)]),
                exit_row([dec!(0.35), dec!(0.25), dec!(0.18), dec!(0.12), dec!(0.07), dec!(0.03)]),
                exit_row([dec!(0.30), dec!(0.25), dec!(0.20), dec!(0.13), dec!(0.09), dec!(0.03)]),
                exit_row([dec!(0.22), dec!(0.25), dec!(0.25), dec!(0.15), dec!(0.10), dec!(0.03)]),
                exit_row([dec!(0.15), dec!(0.25), dec!(0.27), dec!(0.18), dec!(0.12), dec!(0.03)]),
                exit_row([dec!(0.10), dec!(0.22), dec!(0.28), dec!(0.20), dec!(0.15), dec!(0.05)]),
            ],
        }
    }

    /// A matrix where every exit lands in the Failure bucket. Useful for
    /// worst-case analysis and as a test fixture.
    pub fn all_failures() -> Self {
        let mut weights = [Decimal::ZERO; ExitBucket::COUNT];
        weights[ExitBucket::Failure.index()] = Decimal::ONE;
        ExitProbabilityMatrix {
            rows: [exit_row(weights); Stage::COUNT],
        }
    }
}

fn exit_row(weights: [Rate; ExitBucket::COUNT]) -> ExitRow {
    ExitRow { weights }
}

fn check_row_sum(stage: Stage, sum: Decimal) -> FundForecastResult<()> {
    if (sum - Decimal::ONE).abs() > ROW_SUM_TOLERANCE {
        return Err(ForecastError::InvalidProbabilityMatrix {
            stage: stage.label().to_string(),
            sum,
            tolerance: ROW_SUM_TOLERANCE,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_graduation_rows_sum_to_one() {
        let matrix = GraduationMatrix::industry_default();
        assert!(matrix.validate().is_ok());
        for stage in Stage::ALL {
            assert!((matrix.row(stage).sum() - Decimal::ONE).abs() <= ROW_SUM_TOLERANCE);
        }
    }

    #[test]
    fn test_default_exit_rows_sum_to_one() {
        let matrix = ExitProbabilityMatrix::industry_default();
        assert!(matrix.validate().is_ok());
    }

    #[test]
    fn test_bad_graduation_row_names_stage() {
        let mut rows = [row(dec!(0.1), dec!(0.1), dec!(0.1), dec!(0.7)); Stage::COUNT];
        rows[Stage::SeriesB.index()].remain = dec!(0.5);
        let err = GraduationMatrix::new(rows).unwrap_err();
        match err {
            ForecastError::InvalidProbabilityMatrix { stage, sum, .. } => {
                assert_eq!(stage, "Series B");
                assert_eq!(sum, dec!(0.8));
            }
            other => panic!("Expected InvalidProbabilityMatrix, got: {other:?}"),
        }
    }

    #[test]
    fn test_row_sum_tolerance_accepted() {
        // Off by 0.0005, inside the 1e-3 tolerance
        let rows = [row(dec!(0.1), dec!(0.1), dec!(0.1), dec!(0.7005)); Stage::COUNT];
        assert!(GraduationMatrix::new(rows).is_ok());
    }

    #[test]
    fn test_expected_multiple() {
        let r = exit_row([
            dec!(0.5),
            dec!(0.5),
            dec!(0),
            dec!(0),
            dec!(0),
            dec!(0),
        ]);
        // 0.5 * 0x + 0.5 * 1x
        assert_eq!(r.expected_multiple(), dec!(0.5));
    }

    #[test]
    fn test_favorable_probability_excludes_failure_and_1x() {
        let r = ExitProbabilityMatrix::industry_default()
            .row(Stage::Seed)
            .to_owned();
        // Seed row: 0.18 + 0.12 + 0.07 + 0.03
        assert_eq!(r.favorable_probability(), dec!(0.40));
    }

    #[test]
    fn test_all_failures_expected_multiple_is_zero() {
        let matrix = ExitProbabilityMatrix::all_failures();
        assert!(matrix.validate().is_ok());
        for stage in Stage::ALL {
            assert_eq!(matrix.row(stage).expected_multiple(), Decimal::ZERO);
        }
    }

    #[test]
    fn test_scale_progression_preserves_row_sums() {
        let scaled = GraduationMatrix::industry_default().scale_progression(dec!(1.5));
        assert!(scaled.validate().is_ok());
        // Graduation rates actually moved
        assert!(
            scaled.row(Stage::Seed).graduate
                > GraduationMatrix::industry_default().row(Stage::Seed).graduate
        );
    }

    #[test]
    fn test_scale_progression_extreme_factor_clamps() {
        let scaled = GraduationMatrix::industry_default().scale_progression(dec!(50));
        assert!(scaled.validate().is_ok());
        assert_eq!(scaled.row(Stage::Seed).remain, Decimal::ZERO);
    }

    #[test]
    fn test_with_row_rejects_bad_row() {
        let matrix = ExitProbabilityMatrix::industry_default();
        let bad = exit_row([dec!(0.9), dec!(0.9), dec!(0), dec!(0), dec!(0), dec!(0)]);
        assert!(matrix.with_row(Stage::Seed, bad).is_err());
    }
}
