use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::amortization::{build_schedule, PaymentPeriod, ScheduleSummary};
use crate::config::EngineConfig;
use crate::error::{EngineError, Stage};
use crate::params::BondParameters;
use crate::rates::annualize_period_rate;
use crate::risk::compute_risk_metrics;
use crate::time_value::{solve_periodic_rate, SolverSettings};
use crate::types::{with_metadata, ComputationOutput, Money, Rate, Years};
use crate::EngineResult;

#[cfg(feature = "compliance")]
use crate::compliance::{assess_compliance, ComplianceReport};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialIndicators {
    /// All-in annual cost to the borrower (TCEA): IRR of total_due flows
    pub effective_cost_rate_annual: Rate,
    /// Annual return on principal and interest only (TREA)
    pub effective_yield_rate_annual: Rate,
    pub cost_rate_periodic: Rate,
    pub yield_rate_periodic: Rate,
    pub macaulay_duration_years: Years,
    pub modified_duration_years: Years,
    /// Per-period convexity, Σ t(t+1)·CF_t/(1+r)^(t+2) / principal
    pub convexity: Decimal,
    pub convexity_years: Decimal,
    pub dv01: Money,
    pub cost_rate_converged: bool,
    pub yield_rate_converged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondValuation {
    pub schedule: Vec<PaymentPeriod>,
    pub indicators: FinancialIndicators,
    pub summary: ScheduleSummary,
}

#[cfg(feature = "compliance")]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondAssessment {
    pub valuation: BondValuation,
    pub compliance: ComplianceReport,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Value a bond end to end: schedule, effective cost and yield rates,
/// duration and convexity.
///
/// The cost rate is the IRR of every payment the borrower makes; the yield
/// rate is the IRR of principal and interest alone. Both are solved against
/// the principal and annualized at the payment frequency. Risk metrics
/// discount the all-in flows at the periodic cost rate.
pub fn evaluate(
    params: &BondParameters,
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<BondValuation>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let valuation = value_bond(params, config, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "French Amortization with IRR-Implied Effective Rates",
        &assumptions(params, config),
        warnings,
        elapsed,
        valuation,
    ))
}

/// [`evaluate`] plus the regulatory compliance report for the same parameters.
#[cfg(feature = "compliance")]
pub fn assess_bond(
    params: &BondParameters,
    config: &EngineConfig,
) -> EngineResult<ComputationOutput<BondAssessment>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let valuation = value_bond(params, config, &mut warnings)?;
    let compliance = assess_compliance(params, &config.regulatory)
        .map_err(|e| at_stage(e, Stage::Compliance))?;

    warnings.extend(
        compliance
            .rules
            .iter()
            .filter(|r| !r.is_compliant)
            .map(|r| format!("Rule '{}' failed: {}", r.name, r.explanation)),
    );

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "French Amortization with IRR-Implied Effective Rates and Regulatory Compliance",
        &assumptions(params, config),
        warnings,
        elapsed,
        BondAssessment {
            valuation,
            compliance,
        },
    ))
}

/// Evaluate independent bonds in parallel. Results keep the input order.
#[cfg(feature = "parallel")]
pub fn evaluate_batch(
    params: &[BondParameters],
    config: &EngineConfig,
) -> Vec<EngineResult<ComputationOutput<BondValuation>>> {
    use rayon::prelude::*;

    params.par_iter().map(|p| evaluate(p, config)).collect()
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn value_bond(
    params: &BondParameters,
    config: &EngineConfig,
    warnings: &mut Vec<String>,
) -> EngineResult<BondValuation> {
    params.validate()?;

    let schedule = build_schedule(params, &config.costs)?;
    let ppy = schedule.periods_per_year;

    let all_in_flows = schedule.all_in_cash_flows();
    let debt_service_flows = schedule.debt_service_cash_flows();

    let settings = SolverSettings {
        initial_guess: if config.solver.seed_with_period_rate {
            schedule.period_rate
        } else {
            config.solver.initial_guess
        },
        ..config.solver.clone()
    };

    let (cost_rate_periodic, cost_rate_converged) = solve_rate(
        params.principal,
        &all_in_flows,
        &settings,
        Stage::CostRateSolve,
        warnings,
    )?;
    let (yield_rate_periodic, yield_rate_converged) = solve_rate(
        params.principal,
        &debt_service_flows,
        &settings,
        Stage::YieldRateSolve,
        warnings,
    )?;

    let effective_cost_rate_annual = annualize_period_rate(cost_rate_periodic, ppy)
        .map_err(|e| at_stage(e, Stage::CostRateSolve))?;
    let effective_yield_rate_annual = annualize_period_rate(yield_rate_periodic, ppy)
        .map_err(|e| at_stage(e, Stage::YieldRateSolve))?;

    let risk = compute_risk_metrics(&all_in_flows, cost_rate_periodic, params.principal, ppy)?;

    debug!(
        %effective_cost_rate_annual,
        %effective_yield_rate_annual,
        macaulay = %risk.macaulay_duration_years,
        "bond valued"
    );

    let summary = schedule.summary()?;
    Ok(BondValuation {
        schedule: schedule.periods,
        indicators: FinancialIndicators {
            effective_cost_rate_annual,
            effective_yield_rate_annual,
            cost_rate_periodic,
            yield_rate_periodic,
            macaulay_duration_years: risk.macaulay_duration_years,
            modified_duration_years: risk.modified_duration_years,
            convexity: risk.convexity,
            convexity_years: risk.convexity_years,
            dv01: risk.dv01,
            cost_rate_converged,
            yield_rate_converged,
        },
        summary,
    })
}

/// Solve one rate and apply the non-convergence policy: an error by
/// default, or a flagged estimate plus a warning when the config accepts it.
fn solve_rate(
    reference_amount: Money,
    cash_flows: &[Money],
    settings: &SolverSettings,
    stage: Stage,
    warnings: &mut Vec<String>,
) -> EngineResult<(Rate, bool)> {
    let outcome = solve_periodic_rate(reference_amount, cash_flows, settings)
        .map_err(|e| at_stage(e, stage))?;

    if outcome.is_converged() {
        return Ok((outcome.rate(), true));
    }
    if !settings.accept_unconverged {
        return outcome.into_rate(stage).map(|rate| (rate, true));
    }

    warn!(%stage, iterations = outcome.iterations(), "accepting unconverged rate estimate");
    warnings.push(format!(
        "{stage} did not converge after {} iterations; {} is a best-effort estimate.",
        outcome.iterations(),
        outcome.rate()
    ));
    Ok((outcome.rate(), false))
}

/// Re-tag errors raised by shared helpers with the pipeline stage that called them.
fn at_stage(err: EngineError, stage: Stage) -> EngineError {
    match err {
        EngineError::DegenerateInput { reason, .. } => {
            EngineError::DegenerateInput { stage, reason }
        }
        EngineError::NonConvergence {
            last_estimate,
            iterations,
            ..
        } => EngineError::NonConvergence {
            stage,
            last_estimate,
            iterations,
        },
        other => other,
    }
}

fn assumptions(params: &BondParameters, config: &EngineConfig) -> serde_json::Value {
    serde_json::json!({
        "amortization": "French (constant installment)",
        "rate_basis": params.rate_basis,
        "capitalization_frequency": params.capitalization_frequency,
        "payment_frequency": params.payment_frequency,
        "grace": { "kind": params.grace_kind, "periods": params.active_grace_periods() },
        "insurance_rate_monthly": config.costs.insurance_rate_monthly.to_string(),
        "service_fee": config.costs.service_fee.to_string(),
        "transaction_tax_rate": config.costs.transaction_tax_rate.to_string(),
        "solver": {
            "method": "Newton-Raphson",
            "tolerance": config.solver.tolerance.to_string(),
            "max_iterations": config.solver.max_iterations,
            "seeded_with_period_rate": config.solver.seed_with_period_rate,
        },
        "risk_discount_rate": "periodic effective cost rate",
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
