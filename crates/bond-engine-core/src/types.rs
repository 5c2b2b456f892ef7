use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EngineError;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Year fractions or counts
pub type Years = Decimal;

/// Denomination of the bond. Each currency carries its own regulatory rate cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Currency {
    #[default]
    #[serde(alias = "CUR_A")]
    Local,
    #[serde(alias = "CUR_B")]
    Foreign,
}

/// How the quoted annual rate should be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateBasis {
    #[default]
    Effective,
    Nominal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraceKind {
    #[default]
    None,
    /// Interest is paid, principal deferred.
    Partial,
    /// Nothing is paid; interest capitalizes into the balance.
    Total,
}

/// Compounding / payment frequencies supported by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Monthly,
    Bimonthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Frequency {
    pub fn periods_per_year(self) -> u32 {
        match self {
            Frequency::Monthly => 12,
            Frequency::Bimonthly => 6,
            Frequency::Quarterly => 4,
            Frequency::Semiannual => 2,
            Frequency::Annual => 1,
        }
    }

    /// Calendar months between two consecutive periods.
    pub fn months_per_period(self) -> u32 {
        12 / self.periods_per_year()
    }
}

impl FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "cur_a" => Ok(Currency::Local),
            "foreign" | "cur_b" => Ok(Currency::Foreign),
            other => Err(EngineError::invalid(
                "currency",
                format!("unknown currency '{other}' (expected local or foreign)"),
            )),
        }
    }
}

impl FromStr for RateBasis {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "effective" | "tea" => Ok(RateBasis::Effective),
            "nominal" | "tna" => Ok(RateBasis::Nominal),
            other => Err(EngineError::invalid(
                "rate_basis",
                format!("unknown rate basis '{other}' (expected effective or nominal)"),
            )),
        }
    }
}

impl FromStr for GraceKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(GraceKind::None),
            "partial" => Ok(GraceKind::Partial),
            "total" => Ok(GraceKind::Total),
            other => Err(EngineError::invalid(
                "grace_kind",
                format!("unknown grace kind '{other}' (expected none, partial or total)"),
            )),
        }
    }
}

impl FromStr for Frequency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "monthly" => Ok(Frequency::Monthly),
            "bimonthly" => Ok(Frequency::Bimonthly),
            "quarterly" => Ok(Frequency::Quarterly),
            "semiannual" => Ok(Frequency::Semiannual),
            "annual" => Ok(Frequency::Annual),
            other => Err(EngineError::invalid(
                "frequency",
                format!("unknown frequency '{other}'"),
            )),
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_periods() {
        assert_eq!(Frequency::Monthly.periods_per_year(), 12);
        assert_eq!(Frequency::Bimonthly.months_per_period(), 2);
        assert_eq!(Frequency::Semiannual.months_per_period(), 6);
        assert_eq!(Frequency::Annual.months_per_period(), 12);
    }

    #[test]
    fn test_enum_parsing_is_case_insensitive() {
        assert_eq!("CUR_B".parse::<Currency>().unwrap(), Currency::Foreign);
        assert_eq!("Nominal".parse::<RateBasis>().unwrap(), RateBasis::Nominal);
        assert_eq!("TOTAL".parse::<GraceKind>().unwrap(), GraceKind::Total);
        assert_eq!("semi-annual".parse::<Frequency>().unwrap(), Frequency::Semiannual);
        assert!("weekly".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_currency_serde_aliases() {
        let c: Currency = serde_json::from_str("\"CUR_A\"").unwrap();
        assert_eq!(c, Currency::Local);
        let c: Currency = serde_json::from_str("\"foreign\"").unwrap();
        assert_eq!(c, Currency::Foreign);
    }
}
