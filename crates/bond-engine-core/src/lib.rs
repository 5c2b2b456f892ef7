pub mod amortization;
pub mod config;
pub mod engine;
pub mod error;
pub mod params;
pub mod rates;
pub mod risk;
pub mod time_value;
pub mod types;

#[cfg(feature = "compliance")]
pub mod compliance;

pub use config::EngineConfig;
pub use engine::{evaluate, BondValuation, FinancialIndicators};
pub use error::{EngineError, Stage};
pub use params::BondParameters;
pub use types::*;

#[cfg(feature = "compliance")]
pub use engine::{assess_bond, BondAssessment};

#[cfg(feature = "parallel")]
pub use engine::evaluate_batch;

/// Standard result type for all bond-engine operations
pub type EngineResult<T> = Result<T, EngineError>;
