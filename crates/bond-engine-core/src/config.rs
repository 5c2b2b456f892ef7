use serde::{Deserialize, Serialize};

use crate::amortization::CostSchedule;
#[cfg(feature = "compliance")]
use crate::compliance::RegulatoryBounds;
use crate::time_value::SolverSettings;

/// Static configuration for one engine deployment: period charges,
/// regulatory limits and solver controls. Every section falls back to its
/// defaults when omitted, so a config file only needs the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub costs: CostSchedule,
    #[cfg(feature = "compliance")]
    pub regulatory: RegulatoryBounds,
    pub solver: SolverSettings,
}
