use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Configuration error in {field}: {reason}")]
    Configuration { field: String, reason: String },

    #[error("Invalid probability matrix: {stage} row sums to {sum}, expected 1.0 ± {tolerance}")]
    InvalidProbabilityMatrix {
        stage: String,
        sum: Decimal,
        tolerance: Decimal,
    },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for ForecastError {
    fn from(e: serde_json::Error) -> Self {
        ForecastError::SerializationError(e.to_string())
    }
}
