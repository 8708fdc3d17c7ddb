use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use fund_forecast_core::forecast;
use fund_forecast_core::inputs::FundInputs;
use fund_forecast_core::types::SimulationMode;

use crate::input;

/// Arguments for the deterministic fund forecast
#[derive(Args)]
pub struct ForecastArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,

    /// Run with per-company stochastic draws under this seed instead of the
    /// expected-value model
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for standalone input validation
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to JSON input file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_forecast(args: ForecastArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let inputs: FundInputs = input::read_typed(&args.input, "fund forecast")?;
    let mode = match args.seed {
        Some(seed) => SimulationMode::Stochastic { seed },
        None => SimulationMode::Deterministic,
    };
    let result = forecast::run_forecast_with_mode(&inputs, mode)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_validate(args: ValidateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let inputs: FundInputs = input::read_typed(&args.input, "input validation")?;
    inputs.validate()?;
    let allocation: Decimal = inputs
        .stage_strategies
        .iter()
        .map(|s| s.allocation_percent)
        .sum();
    Ok(serde_json::json!({
        "valid": true,
        "fund_size": inputs.fund_size,
        "stage_strategies": inputs.stage_strategies.len(),
        "total_allocation_percent": allocation * dec!(100),
        "reserve_pool": inputs.reserve_pool(),
        "fund_life_quarters": inputs.fund_life_quarters,
    }))
}
