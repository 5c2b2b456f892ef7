use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Stage};
use crate::types::{Money, Rate, Years};
use crate::EngineResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// First- and second-order rate sensitivity of a cash-flow stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// PV-weighted average time of the cash flows, in periods
    pub macaulay_duration_periods: Decimal,
    pub macaulay_duration_years: Years,
    /// Macaulay duration (years) / (1 + r)
    pub modified_duration_years: Years,
    /// Σ t(t+1)·CF_t / (1+r)^(t+2) / reference price, in periods squared
    pub convexity: Decimal,
    /// Convexity rescaled to years squared
    pub convexity_years: Decimal,
    /// Value change for a one basis point move (modified duration · price · 0.0001)
    pub dv01: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Duration, convexity and DV01 of `cash_flows` (received at periods
/// 1..=N) discounted at `period_rate`, relative to `reference_price`.
///
/// Uses iterative discount-factor multiplication (never `powd()`) for full
/// decimal precision.
pub fn compute_risk_metrics(
    cash_flows: &[Money],
    period_rate: Rate,
    reference_price: Money,
    periods_per_year: u32,
) -> EngineResult<RiskMetrics> {
    validate_input(cash_flows, period_rate, reference_price, periods_per_year)?;

    let one_plus_r = Decimal::ONE + period_rate;
    let ppy = Decimal::from(periods_per_year);

    let mut weighted_sum = Decimal::ZERO;
    let mut convexity_sum = Decimal::ZERO;
    let mut df = Decimal::ONE; // discount factor accumulator: (1+r)^t

    for (i, cf) in cash_flows.iter().enumerate() {
        let t = Decimal::from(i as u64 + 1);
        df = df.checked_mul(one_plus_r).ok_or_else(|| {
            EngineError::degenerate(Stage::RiskMetrics, "discount factor overflow")
        })?;
        let pv_cf = cf.checked_div(df).ok_or_else(|| {
            EngineError::degenerate(Stage::RiskMetrics, "discount factor underflow")
        })?;
        weighted_sum = t
            .checked_mul(pv_cf)
            .and_then(|term| term.checked_add(weighted_sum))
            .ok_or_else(|| EngineError::degenerate(Stage::RiskMetrics, "duration sum overflow"))?;
        convexity_sum = (t * (t + Decimal::ONE))
            .checked_mul(pv_cf)
            .and_then(|term| term.checked_add(convexity_sum))
            .ok_or_else(|| EngineError::degenerate(Stage::RiskMetrics, "convexity sum overflow"))?;
    }

    let macaulay_duration_periods = weighted_sum / reference_price;
    let macaulay_duration_years = macaulay_duration_periods / ppy;
    let modified_duration_years = macaulay_duration_years / one_plus_r;

    // The extra (1+r)^2 of the t+2 exponent, via multiplication
    let convexity = convexity_sum / (one_plus_r * one_plus_r) / reference_price;
    let convexity_years = convexity / (ppy * ppy);

    let dv01 = modified_duration_years * reference_price * dec!(0.0001);

    Ok(RiskMetrics {
        macaulay_duration_periods,
        macaulay_duration_years,
        modified_duration_years,
        convexity,
        convexity_years,
        dv01,
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_input(
    cash_flows: &[Money],
    period_rate: Rate,
    reference_price: Money,
    periods_per_year: u32,
) -> EngineResult<()> {
    if cash_flows.is_empty() {
        return Err(EngineError::degenerate(
            Stage::RiskMetrics,
            "cash-flow vector is empty",
        ));
    }
    if reference_price <= Decimal::ZERO {
        return Err(EngineError::degenerate(
            Stage::RiskMetrics,
            "reference price must be positive",
        ));
    }
    if period_rate <= dec!(-1) {
        return Err(EngineError::invalid(
            "period_rate",
            "Discount rate must be greater than -100%.",
        ));
    }
    if periods_per_year == 0 {
        return Err(EngineError::invalid(
            "periods_per_year",
            "Number of periods per year must be positive.",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
