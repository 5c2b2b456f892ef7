pub mod duration;

pub use duration::{compute_risk_metrics, RiskMetrics};
