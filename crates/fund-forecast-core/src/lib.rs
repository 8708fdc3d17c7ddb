pub mod error;
pub mod forecast;
pub mod inputs;
pub mod portfolio;
pub mod reserves;
pub mod time_value;
pub mod timeline;
pub mod types;
pub mod waterfall;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

#[cfg(test)]
pub(crate) mod testing;

pub use error::ForecastError;
pub use types::*;

/// Standard result type for all fund-forecast operations
pub type FundForecastResult<T> = Result<T, ForecastError>;
