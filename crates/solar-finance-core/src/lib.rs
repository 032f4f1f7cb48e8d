pub mod error;
pub mod project;
pub mod time_value;
pub mod types;

#[cfg(feature = "solver")]
pub mod solver;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use error::SolarFinanceError;
pub use types::*;

/// Standard result type for all solar-finance operations
pub type SolarFinanceResult<T> = Result<T, SolarFinanceError>;
