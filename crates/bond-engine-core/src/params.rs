use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::rates::{effective_annual_to_period_rate, nominal_to_effective_annual, percent_to_rate};
use crate::types::{Currency, Frequency, GraceKind, Money, Rate, RateBasis};
use crate::EngineResult;

/// Everything the engine needs to value one bond. Built once per calculation
/// and treated as read-only for its duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BondParameters {
    /// Face amount
    pub principal: Money,
    #[serde(default)]
    pub currency: Currency,
    /// Number of payment periods
    pub term_periods: u32,
    #[serde(default)]
    pub rate_basis: RateBasis,
    /// Annualized rate as a percentage (12 = 12%)
    pub rate_value_percent: Decimal,
    /// Compounding frequency of a nominal rate. Ignored for effective rates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capitalization_frequency: Option<Frequency>,
    #[serde(default)]
    pub grace_kind: GraceKind,
    #[serde(default)]
    pub grace_periods: u32,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub include_insurance: bool,
    #[serde(default)]
    pub include_service_fee: bool,
    #[serde(default)]
    pub payment_frequency: Frequency,
}

impl BondParameters {
    /// Check the construction-time contract. Callers are expected to have
    /// validated already; the engine re-checks and fails fast.
    pub fn validate(&self) -> EngineResult<()> {
        if self.principal <= Decimal::ZERO {
            return Err(EngineError::invalid(
                "principal",
                "Principal must be positive.",
            ));
        }
        if self.term_periods == 0 {
            return Err(EngineError::invalid(
                "term_periods",
                "Term must contain at least one period.",
            ));
        }
        if self.rate_value_percent <= Decimal::ZERO {
            return Err(EngineError::invalid(
                "rate_value_percent",
                "Rate must be positive.",
            ));
        }
        if self.rate_basis == RateBasis::Nominal && self.capitalization_frequency.is_none() {
            return Err(EngineError::invalid(
                "capitalization_frequency",
                "A nominal rate requires a capitalization frequency.",
            ));
        }
        if self.grace_kind != GraceKind::None && self.grace_periods >= self.term_periods {
            return Err(EngineError::invalid(
                "grace_periods",
                format!(
                    "Grace periods ({}) must be fewer than term periods ({}).",
                    self.grace_periods, self.term_periods
                ),
            ));
        }
        Ok(())
    }

    /// Grace periods actually in force (zero when no grace applies).
    pub fn active_grace_periods(&self) -> u32 {
        match self.grace_kind {
            GraceKind::None => 0,
            GraceKind::Partial | GraceKind::Total => self.grace_periods,
        }
    }

    pub fn periods_per_year(&self) -> u32 {
        self.payment_frequency.periods_per_year()
    }

    /// The quoted rate as a decimal, before any basis conversion.
    pub fn quoted_rate(&self) -> Rate {
        percent_to_rate(self.rate_value_percent)
    }

    /// Effective annual rate implied by the quote.
    pub fn effective_annual_rate(&self) -> EngineResult<Rate> {
        match self.rate_basis {
            RateBasis::Effective => Ok(self.quoted_rate()),
            RateBasis::Nominal => {
                let capitalization = self.capitalization_frequency.ok_or_else(|| {
                    EngineError::invalid(
                        "capitalization_frequency",
                        "A nominal rate requires a capitalization frequency.",
                    )
                })?;
                nominal_to_effective_annual(self.quoted_rate(), capitalization.periods_per_year())
            }
        }
    }

    /// Rate per payment period. Nominal quotes go nominal -> effective annual
    /// -> period; effective quotes convert directly.
    pub fn period_rate(&self) -> EngineResult<Rate> {
        effective_annual_to_period_rate(self.effective_annual_rate()?, self.periods_per_year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> BondParameters {
        BondParameters {
            principal: dec!(10000),
            currency: Currency::Local,
            term_periods: 24,
            rate_basis: RateBasis::Effective,
            rate_value_percent: dec!(12),
            capitalization_frequency: None,
            grace_kind: GraceKind::None,
            grace_periods: 0,
            start_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            include_insurance: false,
            include_service_fee: false,
            payment_frequency: Frequency::Monthly,
        }
    }

    #[test]
    fn test_valid_parameters_pass() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_non_positive_principal_rejected() {
        let params = BondParameters {
            principal: Decimal::ZERO,
            ..sample()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidParameter { ref field, .. } if field == "principal"
        ));
    }

    #[test]
    fn test_zero_term_rejected() {
        let params = BondParameters {
            term_periods: 0,
            ..sample()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_grace_must_be_shorter_than_term() {
        let params = BondParameters {
            grace_kind: GraceKind::Partial,
            grace_periods: 24,
            ..sample()
        };
        assert!(params.validate().is_err());

        // Grace count is irrelevant when no grace applies
        let params = BondParameters {
            grace_kind: GraceKind::None,
            grace_periods: 30,
            ..sample()
        };
        assert!(params.validate().is_ok());
        assert_eq!(params.active_grace_periods(), 0);
    }

    #[test]
    fn test_nominal_without_capitalization_rejected() {
        let params = BondParameters {
            rate_basis: RateBasis::Nominal,
            ..sample()
        };
        assert!(params.validate().is_err());
        assert!(params.period_rate().is_err());
    }

    #[test]
    fn test_nominal_monthly_period_rate_is_one_percent() {
        let params = BondParameters {
            rate_basis: RateBasis::Nominal,
            capitalization_frequency: Some(Frequency::Monthly),
            ..sample()
        };
        let r = params.period_rate().unwrap();
        assert!((r - dec!(0.01)).abs() < dec!(0.000000000001), "got {r}");
    }

    #[test]
    fn test_effective_quarterly_payments() {
        let params = BondParameters {
            payment_frequency: Frequency::Quarterly,
            rate_value_percent: dec!(10),
            ..sample()
        };
        // 1.10^(1/4) - 1
        let r = params.period_rate().unwrap();
        assert!((r - dec!(0.0241136890)).abs() < dec!(0.0000000001), "got {r}");
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{
            "principal": "5000",
            "term_periods": 12,
            "rate_value_percent": "9.5",
            "start_date": "2025-03-01"
        }"#;
        let params: BondParameters = serde_json::from_str(json).unwrap();
        assert_eq!(params.currency, Currency::Local);
        assert_eq!(params.grace_kind, GraceKind::None);
        assert_eq!(params.payment_frequency, Frequency::Monthly);
        assert!(!params.include_insurance);
    }
}
