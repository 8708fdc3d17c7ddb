use clap::Args;
use serde::Deserialize;
use serde_json::Value;

use fund_forecast_core::inputs::FundInputs;
use fund_forecast_core::monte_carlo::{self, MonteCarloConfig};

use crate::input;

/// Arguments for Monte Carlo simulation
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Override the iteration count from the input file
    #[arg(long)]
    pub iterations: Option<u32>,

    /// Override the master seed from the input file
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Input file shape: fund inputs alongside the simulation config.
#[derive(Deserialize)]
struct MonteCarloRequest {
    pub fund: FundInputs,
    #[serde(default)]
    pub monte_carlo: MonteCarloConfig,
}

pub fn run_monte_carlo(args: MonteCarloArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: MonteCarloRequest = input::read_typed(&args.input, "Monte Carlo simulation")?;
    if let Some(iterations) = args.iterations {
        request.monte_carlo.iterations = iterations;
    }
    if let Some(seed) = args.seed {
        request.monte_carlo.seed = Some(seed);
    }
    let result = monte_carlo::run_monte_carlo(&request.fund, &request.monte_carlo)?;
    Ok(serde_json::to_value(result)?)
}
