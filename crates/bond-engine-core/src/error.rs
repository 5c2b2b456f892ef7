use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schedule,
    CashFlowSolve,
    CostRateSolve,
    YieldRateSolve,
    RiskMetrics,
    Compliance,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Schedule => "schedule construction",
            Stage::CashFlowSolve => "cash-flow rate solve",
            Stage::CostRateSolve => "effective cost rate solve",
            Stage::YieldRateSolve => "effective yield rate solve",
            Stage::RiskMetrics => "risk metrics",
            Stage::Compliance => "compliance evaluation",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid parameter: {field}: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Non-convergence in {stage}: stopped after {iterations} iterations (last estimate: {last_estimate})")]
    NonConvergence {
        stage: Stage,
        last_estimate: Decimal,
        iterations: u32,
    },

    #[error("Degenerate input in {stage}: {reason}")]
    DegenerateInput { stage: Stage, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl EngineError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        EngineError::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn degenerate(stage: Stage, reason: impl Into<String>) -> Self {
        EngineError::DegenerateInput {
            stage,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(e: serde_json::Error) -> Self {
        EngineError::SerializationError(e.to_string())
    }
}
