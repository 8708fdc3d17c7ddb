mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::forecast::{ForecastArgs, ValidateArgs};
use commands::monte_carlo::MonteCarloArgs;

/// Venture fund forecast simulation
#[derive(Parser)]
#[command(
    name = "vcf",
    version,
    about = "Venture fund forecast simulation",
    long_about = "Simulates the full lifecycle of a venture fund with decimal precision: \
                  cohort construction, quarterly stage transitions and exits, IRR/MOIC/DPI \
                  metrics, reserve allocation, GP/LP waterfall, and Monte Carlo analysis."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deterministic fund forecast
    Forecast(ForecastArgs),
    /// Run a Monte Carlo simulation over the forecast
    MonteCarlo(MonteCarloArgs),
    /// Validate fund inputs without running a simulation
    Validate(ValidateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Forecast(args) => commands::forecast::run_forecast(args),
        Commands::MonteCarlo(args) => commands::monte_carlo::run_monte_carlo(args),
        Commands::Validate(args) => commands::forecast::run_validate(args),
        Commands::Version => {
            println!("vcf {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
