use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use super::matrices::{ExitBucket, ExitProbabilityMatrix, GraduationMatrix};
use crate::types::{Multiple, SimulationMode, Stage};

/// What happens to one company in one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionOutcome {
    Remain,
    Graduate(Stage),
    Exit { multiple: Multiple },
    Fail,
}

const OUTCOME_SLOTS: usize = 4; // graduate, exit, fail, remain

/// Resolves one period of stage transitions for the active companies of a
/// stage. The two implementations correspond to the engine's simulation
/// modes: expected-value splits for the reproducible forecast, seeded draws
/// for Monte Carlo iterations.
pub trait TransitionModel {
    /// Outcomes for `count` active companies currently at `stage`, in
    /// assignment order. Always returns exactly `count` outcomes.
    fn outcomes(
        &mut self,
        stage: Stage,
        count: usize,
        graduation: &GraduationMatrix,
        exits: &ExitProbabilityMatrix,
    ) -> Vec<TransitionOutcome>;
}

/// Build the transition model for the requested simulation mode.
pub fn model_for(mode: SimulationMode) -> Box<dyn TransitionModel> {
    match mode {
        SimulationMode::Deterministic => Box::new(ExpectedValueModel::new()),
        SimulationMode::Stochastic { seed } => Box::new(StochasticModel::seeded(seed)),
    }
}

// ---------------------------------------------------------------------------
// Expected-value model
// ---------------------------------------------------------------------------

/// Applies each probability row as a population-fraction split over the
/// stage's companies, with exits valued at the row's expected multiple.
///
/// Rounding quotas carry across calls: the fractional outcome mass a small
/// cohort cannot express in one period (e.g. 3 companies at a 7% graduation
/// rate) accumulates until it rounds up to a whole company, so long-run
/// outcome frequencies match the matrix even for tiny stage populations.
/// Fully deterministic.
pub struct ExpectedValueModel {
    carry: [[Decimal; OUTCOME_SLOTS]; Stage::COUNT],
}

impl ExpectedValueModel {
    pub fn new() -> Self {
        ExpectedValueModel {
            carry: [[Decimal::ZERO; OUTCOME_SLOTS]; Stage::COUNT],
        }
    }
}

impl Default for ExpectedValueModel {
    fn default() -> Self {
        Self::new()
    }
}

impl TransitionModel for ExpectedValueModel {
    fn outcomes(
        &mut self,
        stage: Stage,
        count: usize,
        graduation: &GraduationMatrix,
        exits: &ExitProbabilityMatrix,
    ) -> Vec<TransitionOutcome> {
        if count == 0 {
            return Vec::new();
        }

        let row = graduation.row(stage);
        let fractions = [row.graduate, row.exit, row.fail, row.remain];
        let fraction_sum: Decimal = fractions.iter().copied().sum();
        let carry = &mut self.carry[stage.index()];
        let count_dec = Decimal::from(count as u64);

        let mut exact = [Decimal::ZERO; OUTCOME_SLOTS];
        let mut counts = [0usize; OUTCOME_SLOTS];
        for i in 0..OUTCOME_SLOTS {
            exact[i] = count_dec * fractions[i] / fraction_sum + carry[i];
            counts[i] = exact[i].floor().max(Decimal::ZERO).to_usize().unwrap_or(0);
        }

        // Reconcile rounding so exactly `count` outcomes are issued,
        // favouring the slots with the most unexpressed mass
        let mut assigned: usize = counts.iter().sum();
        while assigned < count {
            let i = deficit_slot(&exact, &counts, true);
            counts[i] += 1;
            assigned += 1;
        }
        while assigned > count {
            let i = deficit_slot(&exact, &counts, false);
            counts[i] -= 1;
            assigned -= 1;
        }

        for i in 0..OUTCOME_SLOTS {
            carry[i] = exact[i] - Decimal::from(counts[i] as u64);
        }

        let expected_multiple = exits.row(stage).expected_multiple();
        // Graduation from the last stage keeps the company where it is
        let graduate_outcome = match stage.next() {
            Some(next) => TransitionOutcome::Graduate(next),
            None => TransitionOutcome::Remain,
        };

        let mut outcomes = Vec::with_capacity(count);
        outcomes.extend(std::iter::repeat(graduate_outcome).take(counts[0]));
        outcomes.extend(
            std::iter::repeat(TransitionOutcome::Exit {
                multiple: expected_multiple,
            })
            .take(counts[1]),
        );
        outcomes.extend(std::iter::repeat(TransitionOutcome::Fail).take(counts[2]));
        outcomes.extend(std::iter::repeat(TransitionOutcome::Remain).take(counts[3]));
        outcomes
    }
}

/// Slot with the largest positive rounding gap (when adding) or the smallest
/// gap among non-empty slots (when removing).
fn deficit_slot(exact: &[Decimal; OUTCOME_SLOTS], counts: &[usize; OUTCOME_SLOTS], add: bool) -> usize {
    let mut best = if add { 0 } else { usize::MAX };
    let mut best_gap: Option<Decimal> = None;
    for i in 0..OUTCOME_SLOTS {
        if !add && counts[i] == 0 {
            continue;
        }
        let gap = exact[i] - Decimal::from(counts[i] as u64);
        let better = match best_gap {
            None => true,
            Some(b) => {
                if add {
                    gap > b
                } else {
                    gap < b
                }
            }
        };
        if better {
            best = i;
            best_gap = Some(gap);
        }
    }
    if best == usize::MAX {
        0
    } else {
        best
    }
}

// ---------------------------------------------------------------------------
// Stochastic model
// ---------------------------------------------------------------------------

/// One weighted random draw per company per period, with a second weighted
/// draw over exit buckets when the first lands on Exit. The generator is
/// seeded so Monte Carlo iterations are reproducible.
pub struct StochasticModel {
    rng: StdRng,
}

impl StochasticModel {
    pub fn seeded(seed: u64) -> Self {
        StochasticModel {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn draw(&mut self) -> Decimal {
        Decimal::from_f64(self.rng.gen::<f64>()).unwrap_or(Decimal::ZERO)
    }

    fn draw_bucket(&mut self, exits: &ExitProbabilityMatrix, stage: Stage) -> ExitBucket {
        let row = exits.row(stage);
        let u = self.draw() * row.sum();
        let mut cumulative = Decimal::ZERO;
        for bucket in ExitBucket::ALL {
            cumulative += row.weight(bucket);
            if u < cumulative {
                return bucket;
            }
        }
        ExitBucket::Outlier
    }
}

impl TransitionModel for StochasticModel {
    fn outcomes(
        &mut self,
        stage: Stage,
        count: usize,
        graduation: &GraduationMatrix,
        exits: &ExitProbabilityMatrix,
    ) -> Vec<TransitionOutcome> {
        let row = *graduation.row(stage);
        (0..count)
            .map(|_| {
                let u = self.draw() * row.sum();
                if u < row.graduate {
                    match stage.next() {
                        Some(next) => TransitionOutcome::Graduate(next),
                        None => TransitionOutcome::Remain,
                    }
                } else if u < row.graduate + row.exit {
                    let bucket = self.draw_bucket(exits, stage);
                    TransitionOutcome::Exit {
                        multiple: bucket.multiple(),
                    }
                } else if u < row.graduate + row.exit + row.fail {
                    TransitionOutcome::Fail
                } else {
                    TransitionOutcome::Remain
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
