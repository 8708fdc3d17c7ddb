//! Monte Carlo forecasting.
//!
//! Runs many stochastic forecasts over perturbed copies of the fund inputs
//! and summarizes the resulting performance distributions. Iterations run in
//! parallel within sequential batches; batch boundaries drive both the
//! convergence check and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::distribution::{LogNormal, Normal, Uniform};

use crate::error::ForecastError;
use crate::forecast::run_forecast_with_mode;
use crate::inputs::FundInputs;
use crate::types::{with_metadata, ComputationOutput, SimulationMode};
use crate::FundForecastResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Probability distribution specification for a perturbed parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum McDistribution {
    Normal { mean: f64, std_dev: f64 },
    LogNormal { mu: f64, sigma: f64 },
    Uniform { min: f64, max: f64 },
}

impl McDistribution {
    fn validate(&self) -> FundForecastResult<()> {
        let (ok, reason) = match *self {
            McDistribution::Normal { std_dev, .. } => {
                (std_dev > 0.0, "std_dev must be positive")
            }
            McDistribution::LogNormal { sigma, .. } => (sigma > 0.0, "sigma must be positive"),
            McDistribution::Uniform { min, max } => (min < max, "min must be below max"),
        };
        if ok {
            Ok(())
        } else {
            Err(ForecastError::Configuration {
                field: "distribution".into(),
                reason: reason.into(),
            })
        }
    }
}

/// Fund parameter a perturbation applies to. Rate parameters are sampled as
/// absolute values; scale parameters multiply the base input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PerturbedParameter {
    ManagementFeeRate,
    CarryRate,
    HurdleRate,
    AppreciationRate,
    CheckSizeScale,
    EntryValuationScale,
    /// Scales graduation and exit probabilities in every matrix row, with
    /// remain-in-stage absorbing the difference.
    GraduationScale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Perturbation {
    pub parameter: PerturbedParameter,
    pub distribution: McDistribution,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloConfig {
    /// Number of iterations (minimum 100).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Optional seed for reproducibility; a random seed is drawn and
    /// reported when omitted.
    pub seed: Option<u64>,
    #[serde(default)]
    pub perturbations: Vec<Perturbation>,
    /// Relative change in the running mean net IRR between batches below
    /// which the run is considered converged.
    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f64,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_iterations() -> u32 {
    1_000
}

fn default_convergence_tolerance() -> f64 {
    0.005
}

fn default_batch_size() -> u32 {
    50
}

impl Default for MonteCarloConfig {
    fn default() -> Self {
        MonteCarloConfig {
            iterations: default_iterations(),
            seed: None,
            perturbations: Vec::new(),
            convergence_tolerance: default_convergence_tolerance(),
            batch_size: default_batch_size(),
        }
    }
}

impl MonteCarloConfig {
    pub fn validate(&self) -> FundForecastResult<()> {
        if self.iterations < 100 {
            return Err(ForecastError::Configuration {
                field: "iterations".into(),
                reason: "At least 100 iterations are required".into(),
            });
        }
        if self.batch_size == 0 {
            return Err(ForecastError::Configuration {
                field: "batch_size".into(),
                reason: "Batch size must be positive".into(),
            });
        }
        if self.convergence_tolerance <= 0.0 {
            return Err(ForecastError::Configuration {
                field: "convergence_tolerance".into(),
                reason: "Convergence tolerance must be positive".into(),
            });
        }
        for perturbation in &self.perturbations {
            perturbation.distribution.validate()?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Descriptive statistics over one metric's simulated distribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDistribution {
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub iterations_run: u32,
    pub failed_iterations: u32,
    /// Seed actually used, for re-running the exact simulation.
    pub seed: u64,
    pub convergence_achieved: bool,
    pub net_irr: MetricDistribution,
    pub net_moic: MetricDistribution,
    pub dpi: MetricDistribution,
    pub tvpi: MetricDistribution,
    pub total_distributed: MetricDistribution,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct IterationMetrics {
    net_irr: f64,
    net_moic: f64,
    dpi: f64,
    tvpi: f64,
    total_distributed: f64,
}

/// Run the full Monte Carlo simulation.
pub fn run_monte_carlo(
    inputs: &FundInputs,
    config: &MonteCarloConfig,
) -> FundForecastResult<ComputationOutput<MonteCarloSummary>> {
    run_monte_carlo_with_cancel(inputs, config, &AtomicBool::new(false))
}

/// Like [`run_monte_carlo`], but stops at the next batch boundary once
/// `cancel` is set. Completed batches are still summarized.
pub fn run_monte_carlo_with_cancel(
    inputs: &FundInputs,
    config: &MonteCarloConfig,
    cancel: &AtomicBool,
) -> FundForecastResult<ComputationOutput<MonteCarloSummary>> {
    let start = Instant::now();
    inputs.validate()?;
    config.validate()?;

    let seed = config.seed.unwrap_or_else(rand::random);
    let mut warnings: Vec<String> = Vec::new();
    let mut metrics: Vec<IterationMetrics> = Vec::with_capacity(config.iterations as usize);
    let mut failed_iterations: u32 = 0;
    let mut convergence_achieved = false;
    let mut previous_mean: Option<f64> = None;
    let mut cancelled = false;

    let mut next = 0u32;
    while next < config.iterations {
        if cancel.load(Ordering::Relaxed) {
            cancelled = true;
            break;
        }
        let batch_end = (next + config.batch_size).min(config.iterations);

        let batch: Vec<Result<IterationMetrics, ForecastError>> = (next..batch_end)
            .into_par_iter()
            .map(|i| run_iteration(inputs, config, derive_seed(seed, i)))
            .collect();
        for outcome in batch {
            match outcome {
                Ok(m) => metrics.push(m),
                Err(_) => failed_iterations += 1,
            }
        }
        next = batch_end;

        // Running-mean convergence on net IRR, re-evaluated every batch so
        // the flag reflects the final batch pair
        if !metrics.is_empty() {
            let mean = metrics.iter().map(|m| m.net_irr).sum::<f64>() / metrics.len() as f64;
            if let Some(prev) = previous_mean {
                convergence_achieved = means_converged(prev, mean, config.convergence_tolerance);
            }
            previous_mean = Some(mean);
        }
    }

    if metrics.is_empty() {
        return Err(ForecastError::InsufficientData(
            "No Monte Carlo iteration completed successfully".into(),
        ));
    }

    if cancelled {
        warnings.push(format!(
            "Simulation cancelled after {} of {} iterations",
            metrics.len() as u32 + failed_iterations,
            config.iterations
        ));
    }
    if failed_iterations > 0 {
        warnings.push(format!(
            "{failed_iterations} iterations failed and were excluded"
        ));
    }
    if !convergence_achieved {
        warnings.push("Running mean did not converge within tolerance".into());
    }

    let summary = MonteCarloSummary {
        iterations_run: metrics.len() as u32,
        failed_iterations,
        seed,
        convergence_achieved,
        net_irr: summarize(metrics.iter().map(|m| m.net_irr).collect()),
        net_moic: summarize(metrics.iter().map(|m| m.net_moic).collect()),
        dpi: summarize(metrics.iter().map(|m| m.dpi).collect()),
        tvpi: summarize(metrics.iter().map(|m| m.tvpi).collect()),
        total_distributed: summarize(metrics.iter().map(|m| m.total_distributed).collect()),
    };

    Ok(with_metadata(
        "Batched Monte Carlo over stochastic fund forecasts with perturbed \
         inputs; per-iteration seeds derived from the master seed",
        config,
        warnings,
        start.elapsed().as_micros() as u64,
        summary,
    ))
}

/// Seeds are decorrelated with a splitmix-style multiplier so neighbouring
/// iterations do not share RNG streams.
fn derive_seed(master: u64, iteration: u32) -> u64 {
    master ^ (u64::from(iteration) + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Relative change between consecutive running means within tolerance.
fn means_converged(previous: f64, current: f64, tolerance: f64) -> bool {
    let denominator = previous.abs().max(f64::EPSILON);
    ((current - previous) / denominator).abs() < tolerance
}

fn run_iteration(
    inputs: &FundInputs,
    config: &MonteCarloConfig,
    seed: u64,
) -> FundForecastResult<IterationMetrics> {
    let mut rng = StdRng::seed_from_u64(seed);
    let perturbed = perturb_inputs(inputs, &config.perturbations, &mut rng)?;
    let forecast = run_forecast_with_mode(
        &perturbed,
        SimulationMode::Stochastic { seed: rng.gen() },
    )?;
    let m = &forecast.result.metrics;
    Ok(IterationMetrics {
        net_irr: to_f64(m.net_irr),
        net_moic: to_f64(m.net_moic),
        dpi: to_f64(m.dpi),
        tvpi: to_f64(m.tvpi),
        total_distributed: to_f64(m.total_distributed),
    })
}

/// Apply every configured perturbation to a private copy of the inputs.
/// Sampled rates are clamped into the valid range rather than letting an
/// extreme draw fail validation.
fn perturb_inputs(
    base: &FundInputs,
    perturbations: &[Perturbation],
    rng: &mut StdRng,
) -> FundForecastResult<FundInputs> {
    let mut inputs = base.clone();
    for perturbation in perturbations {
        let value = sample(rng, &perturbation.distribution)?;
        match perturbation.parameter {
            PerturbedParameter::ManagementFeeRate => {
                inputs.management_fee_rate = clamped_rate(value);
            }
            PerturbedParameter::CarryRate => {
                inputs.carry_rate = clamped_rate(value);
            }
            PerturbedParameter::HurdleRate => {
                inputs.hurdle_rate = to_decimal(value.max(0.0));
            }
            PerturbedParameter::AppreciationRate => {
                inputs.valuation_policy.annual_appreciation = to_decimal(value.max(-0.99));
            }
            PerturbedParameter::CheckSizeScale => {
                let factor = to_decimal(value.max(0.01));
                for strategy in &mut inputs.stage_strategies {
                    strategy.check_size.min *= factor;
                    strategy.check_size.target *= factor;
                    strategy.check_size.max *= factor;
                }
            }
            PerturbedParameter::EntryValuationScale => {
                let factor = to_decimal(value.max(0.01));
                for strategy in &mut inputs.stage_strategies {
                    strategy.entry_valuation *= factor;
                }
            }
            PerturbedParameter::GraduationScale => {
                let factor = to_decimal(value.max(0.0));
                inputs.graduation_matrix = inputs.graduation_matrix.scale_progression(factor);
            }
        }
    }
    Ok(inputs)
}

fn sample(rng: &mut StdRng, dist: &McDistribution) -> FundForecastResult<f64> {
    match *dist {
        McDistribution::Normal { mean, std_dev } => {
            let n = Normal::new(mean, std_dev).map_err(|e| ForecastError::Configuration {
                field: "distribution".into(),
                reason: format!("Invalid Normal parameters: {e}"),
            })?;
            Ok(rng.sample(n))
        }
        McDistribution::LogNormal { mu, sigma } => {
            let ln = LogNormal::new(mu, sigma).map_err(|e| ForecastError::Configuration {
                field: "distribution".into(),
                reason: format!("Invalid LogNormal parameters: {e}"),
            })?;
            Ok(rng.sample(ln))
        }
        McDistribution::Uniform { min, max } => {
            let u = Uniform::new(min, max).map_err(|e| ForecastError::Configuration {
                field: "distribution".into(),
                reason: format!("Invalid Uniform parameters: {e}"),
            })?;
            Ok(rng.sample(u))
        }
    }
}

fn clamped_rate(value: f64) -> Decimal {
    to_decimal(value.clamp(0.0, 1.0))
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

fn summarize(mut values: Vec<f64>) -> MetricDistribution {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    MetricDistribution {
        mean,
        std_dev: variance.sqrt(),
        min: values[0],
        max: values[values.len() - 1],
        p10: percentile_sorted(&values, 10.0),
        p25: percentile_sorted(&values, 25.0),
        p50: percentile_sorted(&values, 50.0),
        p75: percentile_sorted(&values, 75.0),
        p90: percentile_sorted(&values, 90.0),
    }
}

/// Percentile from a **sorted** slice using linear interpolation.
fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
