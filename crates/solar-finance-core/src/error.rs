use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolarFinanceError {
    #[error("Invalid parameter: {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("IRR undefined: {0}")]
    UndefinedIrr(String),

    #[error("Price out of range: no root in [{low}, {high}] (NPV at low: {npv_at_low}, NPV at high: {npv_at_high})")]
    PriceOutOfRange {
        low: Decimal,
        high: Decimal,
        npv_at_low: Decimal,
        npv_at_high: Decimal,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Degenerate metric in {context}")]
    DegenerateMetric { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl SolarFinanceError {
    /// Shorthand for the most common validation failure.
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        SolarFinanceError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// A projection quantity left the decimal range.
    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        SolarFinanceError::FinancialImpossibility(format!(
            "{} exceeds the decimal range",
            context.into()
        ))
    }
}

impl From<serde_json::Error> for SolarFinanceError {
    fn from(e: serde_json::Error) -> Self {
        SolarFinanceError::SerializationError(e.to_string())
    }
}
