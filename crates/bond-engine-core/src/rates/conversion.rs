use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::EngineError;
use crate::types::Rate;
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Convert a percentage quote (12.5) into a decimal rate (0.125).
pub fn percent_to_rate(percent: Decimal) -> Rate {
    percent / dec!(100)
}

/// Effective annual rate implied by a nominal rate compounded `periods_per_year`
/// times a year: `(1 + j/m)^m - 1`.
pub fn nominal_to_effective_annual(nominal: Rate, periods_per_year: u32) -> EngineResult<Rate> {
    check_rate("nominal_rate", nominal)?;
    check_periods("periods_per_year", periods_per_year)?;

    let m = Decimal::from(periods_per_year);
    let growth = (Decimal::ONE + nominal / m)
        .checked_powu(u64::from(periods_per_year))
        .ok_or_else(|| overflow("nominal_rate"))?;
    Ok(growth - Decimal::ONE)
}

/// Rate per sub-annual period equivalent to an effective annual rate:
/// `(1 + e)^(1/m) - 1`.
pub fn effective_annual_to_period_rate(
    effective_annual: Rate,
    periods_per_year: u32,
) -> EngineResult<Rate> {
    check_rate("effective_annual_rate", effective_annual)?;
    check_periods("periods_per_year", periods_per_year)?;

    let growth = pow_ratio(Decimal::ONE + effective_annual, 1, periods_per_year)
        .ok_or_else(|| overflow("effective_annual_rate"))?;
    Ok(growth - Decimal::ONE)
}

/// Re-express a periodic rate at another periodicity:
/// `(1 + r)^(from/to) - 1`.
///
/// `convert_period_rate(r, 12, 1)` annualizes a monthly rate,
/// `convert_period_rate(r, 1, 4)` turns an annual rate into a quarterly one.
pub fn convert_period_rate(
    rate: Rate,
    from_periods_per_year: u32,
    to_periods_per_year: u32,
) -> EngineResult<Rate> {
    check_rate("rate", rate)?;
    check_periods("from_periods_per_year", from_periods_per_year)?;
    check_periods("to_periods_per_year", to_periods_per_year)?;

    let growth = pow_ratio(
        Decimal::ONE + rate,
        from_periods_per_year,
        to_periods_per_year,
    )
    .ok_or_else(|| overflow("rate"))?;
    Ok(growth - Decimal::ONE)
}

/// Annualize a solved periodic rate: `(1 + r)^m - 1`.
///
/// Unlike the quote conversions this accepts any rate above -100%, since an
/// internal rate of return may legitimately come out negative.
pub fn annualize_period_rate(period_rate: Rate, periods_per_year: u32) -> EngineResult<Rate> {
    if period_rate <= dec!(-1) {
        return Err(EngineError::invalid(
            "period_rate",
            "Periodic rate must be greater than -100%.",
        ));
    }
    check_periods("periods_per_year", periods_per_year)?;

    let growth = (Decimal::ONE + period_rate)
        .checked_powu(u64::from(periods_per_year))
        .ok_or_else(|| overflow("period_rate"))?;
    Ok(growth - Decimal::ONE)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// `base^(num/den)`, using an exact integer power when the ratio is whole.
fn pow_ratio(base: Decimal, num: u32, den: u32) -> Option<Decimal> {
    if num % den == 0 {
        base.checked_powu(u64::from(num / den))
    } else {
        base.checked_powd(Decimal::from(num) / Decimal::from(den))
    }
}

fn check_rate(field: &str, rate: Rate) -> EngineResult<()> {
    if rate < Decimal::ZERO {
        return Err(EngineError::invalid(field, "Rate must be non-negative."));
    }
    Ok(())
}

fn check_periods(field: &str, periods: u32) -> EngineResult<()> {
    if periods == 0 {
        return Err(EngineError::invalid(
            field,
            "Number of periods per year must be positive.",
        ));
    }
    Ok(())
}

fn overflow(field: &str) -> EngineError {
    EngineError::invalid(field, "Rate is too large to compound without overflow.")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Decimal, expected: Decimal, tolerance: Decimal, label: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tolerance,
            "{label}: expected ~{expected}, got {actual} (diff {diff} > tolerance {tolerance})"
        );
    }

    #[test]
    fn test_nominal_monthly_to_effective() {
        // 12% compounded monthly: 1.01^12 - 1
        let eff = nominal_to_effective_annual(dec!(0.12), 12).unwrap();
        assert_close(
            eff,
            dec!(0.126825030131969720661201),
            dec!(0.00000000000000000001),
            "TEA from TNA",
        );
    }

    #[test]
    fn test_nominal_annual_equals_effective() {
        let eff = nominal_to_effective_annual(dec!(0.08), 1).unwrap();
        assert_eq!(eff, dec!(0.08));
    }

    #[test]
    fn test_effective_to_monthly() {
        let monthly = effective_annual_to_period_rate(dec!(0.12), 12).unwrap();
        assert_close(monthly, dec!(0.0094887929345830), dec!(0.000000000001), "monthly rate");
    }

    #[test]
    fn test_effective_to_annual_is_identity() {
        let r = effective_annual_to_period_rate(dec!(0.0725), 1).unwrap();
        assert_eq!(r, dec!(0.0725));
    }

    #[test]
    fn test_convert_quarterly_to_monthly_and_back() {
        let quarterly = dec!(0.03);
        let monthly = convert_period_rate(quarterly, 4, 12).unwrap();
        let back = convert_period_rate(monthly, 12, 4).unwrap();
        assert_close(back, quarterly, dec!(0.000000000001), "quarterly round trip");
    }

    #[test]
    fn test_convert_semiannual_to_annual_exact() {
        // 1.05^2 - 1
        let annual = convert_period_rate(dec!(0.05), 2, 1).unwrap();
        assert_eq!(annual, dec!(0.1025));
    }

    #[test]
    fn test_zero_rate_stays_zero() {
        assert_eq!(effective_annual_to_period_rate(Decimal::ZERO, 12).unwrap(), Decimal::ZERO);
        assert_eq!(nominal_to_effective_annual(Decimal::ZERO, 6).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_negative_rate_rejected() {
        let err = nominal_to_effective_annual(dec!(-0.01), 12).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { .. }));
        assert!(effective_annual_to_period_rate(dec!(-0.5), 12).is_err());
        assert!(convert_period_rate(dec!(-0.001), 12, 1).is_err());
    }

    #[test]
    fn test_zero_periods_rejected() {
        assert!(nominal_to_effective_annual(dec!(0.1), 0).is_err());
        assert!(effective_annual_to_period_rate(dec!(0.1), 0).is_err());
        assert!(convert_period_rate(dec!(0.1), 0, 12).is_err());
        assert!(convert_period_rate(dec!(0.1), 12, 0).is_err());
    }

    #[test]
    fn test_annualize_accepts_negative_irr() {
        let annual = annualize_period_rate(dec!(-0.01), 12).unwrap();
        assert!(annual < Decimal::ZERO);
        assert!(annualize_period_rate(dec!(-1), 12).is_err());
    }

    #[test]
    fn test_percent_to_rate() {
        assert_eq!(percent_to_rate(dec!(12.5)), dec!(0.125));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(200))]

            #[test]
            fn test_period_rate_round_trip(bps in 1u32..10_000, periods in 1u32..=365) {
                let annual = Decimal::from(bps) / dec!(10000);
                let period = effective_annual_to_period_rate(annual, periods).unwrap();
                let back = convert_period_rate(period, periods, 1).unwrap();
                prop_assert!(
                    (back - annual).abs() < dec!(0.000000001),
                    "annual {} -> period {} -> {}", annual, period, back
                );
            }
        }
    }
}
