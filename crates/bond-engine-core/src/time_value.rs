use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::{EngineError, Stage};
use crate::types::{Money, Rate};
use crate::EngineResult;

const LOWER_RATE_BOUND: Decimal = dec!(-0.99);
const UPPER_RATE_BOUND: Decimal = dec!(100);
const MAX_STEP_HALVINGS: u32 = 60;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Newton-Raphson controls for [`solve_periodic_rate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Starting periodic rate (0.10 = 10% per period)
    pub initial_guess: Rate,
    /// Absolute tolerance, applied both to the NPV residual and to the step size
    pub tolerance: Decimal,
    pub max_iterations: u32,
    /// Seed the solve with the contract's own period rate instead of
    /// `initial_guess` when the engine drives the solver.
    pub seed_with_period_rate: bool,
    /// Return a best-effort estimate (flagged, with a warning) instead of a
    /// `NonConvergence` error when the iteration budget runs out.
    pub accept_unconverged: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            initial_guess: dec!(0.10),
            tolerance: dec!(0.0001),
            max_iterations: 100,
            seed_with_period_rate: true,
            accept_unconverged: false,
        }
    }
}

/// Result of a rate solve. Non-convergence is a value, not a silent number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SolverOutcome {
    Converged { rate: Rate, iterations: u32 },
    NotConverged { last_estimate: Rate, iterations: u32 },
}

impl SolverOutcome {
    /// The root, or the last iterate when the solve did not converge.
    pub fn rate(&self) -> Rate {
        match *self {
            SolverOutcome::Converged { rate, .. } => rate,
            SolverOutcome::NotConverged { last_estimate, .. } => last_estimate,
        }
    }

    pub fn iterations(&self) -> u32 {
        match *self {
            SolverOutcome::Converged { iterations, .. }
            | SolverOutcome::NotConverged { iterations, .. } => iterations,
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, SolverOutcome::Converged { .. })
    }

    /// Turn a non-converged outcome into a `NonConvergence` error tagged with
    /// the stage that requested the solve.
    pub fn into_rate(self, stage: Stage) -> EngineResult<Rate> {
        match self {
            SolverOutcome::Converged { rate, .. } => Ok(rate),
            SolverOutcome::NotConverged {
                last_estimate,
                iterations,
            } => Err(EngineError::NonConvergence {
                stage,
                last_estimate,
                iterations,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Present value of cash flows received at the end of periods 1..=N.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> EngineResult<Money> {
    if rate <= dec!(-1) {
        return Err(EngineError::invalid(
            "rate",
            "Discount rate must be greater than -100%",
        ));
    }

    npv_with_slope(rate, cash_flows)
        .map(|(pv, _)| pv)
        .ok_or_else(|| EngineError::degenerate(Stage::CashFlowSolve, "discount factor overflow"))
}

/// Constant French-method installment repaying `principal` over `nper`
/// periods at `rate` per period: `P·r(1+r)^n / ((1+r)^n - 1)`.
pub fn french_installment(principal: Money, rate: Rate, nper: u32) -> EngineResult<Money> {
    if nper == 0 {
        return Err(EngineError::invalid(
            "nper",
            "Number of periods must be > 0",
        ));
    }
    if rate < Decimal::ZERO {
        return Err(EngineError::invalid("rate", "Period rate must be non-negative"));
    }

    if rate.is_zero() {
        return Ok(principal / Decimal::from(nper));
    }

    // Written as P·r / (1 - (1+r)^-n) so large factors shrink instead of
    // overflowing. A factor beyond the decimal range discounts to zero.
    let discount = match (Decimal::ONE + rate).checked_powu(u64::from(nper)) {
        Some(factor) => Decimal::ONE / factor,
        None => Decimal::ZERO,
    };
    let denominator = Decimal::ONE - discount;

    if denominator.is_zero() {
        return Err(EngineError::degenerate(
            Stage::Schedule,
            "installment annuity factor is zero",
        ));
    }

    principal
        .checked_mul(rate)
        .and_then(|interest| interest.checked_div(denominator))
        .ok_or_else(|| EngineError::degenerate(Stage::Schedule, "installment overflows"))
}

/// Find the periodic rate `x` with `Σ CF_t / (1+x)^t = reference_amount`
/// (t = 1..=N) by Newton-Raphson.
///
/// Iteration stops when `|npv(x) - reference| < tolerance` or the Newton step
/// is smaller than `tolerance`. An exhausted budget, a flat derivative or a
/// discount factor that cannot be represented all end the solve as
/// [`SolverOutcome::NotConverged`] carrying the last iterate.
pub fn solve_periodic_rate(
    reference_amount: Money,
    cash_flows: &[Money],
    settings: &SolverSettings,
) -> EngineResult<SolverOutcome> {
    validate_solver_input(reference_amount, cash_flows, settings)?;

    let mut rate = clamp_rate(settings.initial_guess);

    for i in 0..settings.max_iterations {
        let Some((pv, slope)) = npv_with_slope(rate, cash_flows) else {
            warn!(iteration = i, %rate, "discount factors overflowed; stopping solve");
            return Ok(SolverOutcome::NotConverged {
                last_estimate: rate,
                iterations: i,
            });
        };

        let residual = pv - reference_amount;
        trace!(iteration = i, %rate, %residual, "newton step");

        if residual.abs() < settings.tolerance {
            return Ok(SolverOutcome::Converged {
                rate,
                iterations: i,
            });
        }

        let Some(step) = residual.checked_div(slope) else {
            warn!(iteration = i, %rate, "flat NPV derivative; stopping solve");
            return Ok(SolverOutcome::NotConverged {
                last_estimate: rate,
                iterations: i,
            });
        };

        let next = damp_step(rate, clamp_rate(rate - step), cash_flows);

        if (next - rate).abs() < settings.tolerance {
            return Ok(SolverOutcome::Converged {
                rate: refine(next, reference_amount, cash_flows),
                iterations: i + 1,
            });
        }

        rate = next;
    }

    warn!(
        iterations = settings.max_iterations,
        last_estimate = %rate,
        "rate solve did not converge"
    );
    Ok(SolverOutcome::NotConverged {
        last_estimate: rate,
        iterations: settings.max_iterations,
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_solver_input(
    reference_amount: Money,
    cash_flows: &[Money],
    settings: &SolverSettings,
) -> EngineResult<()> {
    if cash_flows.is_empty() {
        return Err(EngineError::degenerate(
            Stage::CashFlowSolve,
            "cash-flow vector is empty",
        ));
    }
    if reference_amount <= Decimal::ZERO {
        return Err(EngineError::invalid(
            "reference_amount",
            "Reference amount must be positive.",
        ));
    }
    if settings.tolerance <= Decimal::ZERO {
        return Err(EngineError::invalid(
            "tolerance",
            "Solver tolerance must be positive.",
        ));
    }
    if settings.max_iterations == 0 {
        return Err(EngineError::invalid(
            "max_iterations",
            "Solver needs at least one iteration.",
        ));
    }
    Ok(())
}

/// PV of flows at t = 1..=N and its derivative with respect to the rate,
/// built by iterative discount-factor multiplication. `None` on overflow.
fn npv_with_slope(rate: Rate, cash_flows: &[Money]) -> Option<(Money, Decimal)> {
    let v = Decimal::ONE.checked_div(Decimal::ONE + rate)?;
    let mut df = Decimal::ONE;
    let mut pv = Decimal::ZERO;
    let mut slope = Decimal::ZERO;

    for (i, cf) in cash_flows.iter().enumerate() {
        let t = Decimal::from(i as u64 + 1);
        df = df.checked_mul(v)?;
        let pv_cf = cf.checked_mul(df)?;
        pv = pv.checked_add(pv_cf)?;
        slope = slope.checked_sub(t.checked_mul(pv_cf)?.checked_mul(v)?)?;
    }

    Some((pv, slope))
}

/// One more Newton step from an iterate accepted on step size alone, so the
/// returned rate sits on the root rather than a step-tolerance away from it.
/// Keeps `rate` when the step cannot be taken.
fn refine(rate: Rate, reference_amount: Money, cash_flows: &[Money]) -> Rate {
    npv_with_slope(rate, cash_flows)
        .and_then(|(pv, slope)| pv.checked_sub(reference_amount)?.checked_div(slope))
        .map(|step| clamp_rate(rate - step))
        .filter(|candidate| npv_with_slope(*candidate, cash_flows).is_some())
        .unwrap_or(rate)
}

fn clamp_rate(rate: Rate) -> Rate {
    rate.max(LOWER_RATE_BOUND).min(UPPER_RATE_BOUND)
}

/// Halve the Newton step until the candidate rate can be discounted without
/// overflow. Long schedules started far from the root overshoot deep into
/// negative rates otherwise.
fn damp_step(current: Rate, mut candidate: Rate, cash_flows: &[Money]) -> Rate {
    let mut halvings = 0;
    while npv_with_slope(candidate, cash_flows).is_none() && halvings < MAX_STEP_HALVINGS {
        candidate = (current + candidate) / dec!(2);
        halvings += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level_flows(amount: Money, n: usize) -> Vec<Money> {
        vec![amount; n]
    }

    #[test]
    fn test_npv_basic() {
        // 300/1.1 + 400/1.21 + 500/1.331 ≈ 978.96
        let cfs = vec![dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        assert!((result - dec!(978.96)).abs() < dec!(0.01));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(dec!(0.0), &cfs).unwrap(), dec!(150));
    }

    #[test]
    fn test_npv_rejects_rate_below_minus_one() {
        assert!(npv(dec!(-1), &[dec!(100)]).is_err());
    }

    #[test]
    fn test_french_installment_one_percent() {
        // 10,000 over 24 months at 1%: 470.73
        let c = french_installment(dec!(10000), dec!(0.01), 24).unwrap();
        assert!((c - dec!(470.7347)).abs() < dec!(0.0001), "got {c}");
    }

    #[test]
    fn test_french_installment_zero_rate() {
        let c = french_installment(dec!(1200), Decimal::ZERO, 12).unwrap();
        assert_eq!(c, dec!(100));
    }

    #[test]
    fn test_french_installment_single_period() {
        let c = french_installment(dec!(1000), dec!(0.02), 1).unwrap();
        assert!((c - dec!(1020)).abs() < dec!(0.000000000001), "got {c}");
    }

    #[test]
    fn test_french_installment_large_compounding_factor() {
        // (1 + r)^n near 1e23: P·r·(1+r)^n alone would leave the decimal range
        let rate = dec!(0.2214);
        let c = french_installment(dec!(10000000), rate, 270).unwrap();
        assert!(c > dec!(10000000) * rate);
        assert!(c - dec!(10000000) * rate < dec!(0.01), "got {c}");
    }

    #[test]
    fn test_french_installment_factor_beyond_decimal_range() {
        // (1 + r)^n overflows outright; the installment is pure interest
        let c = french_installment(dec!(1000), dec!(5), 200).unwrap();
        assert_eq!(c, dec!(5000));
    }

    #[test]
    fn test_french_installment_zero_periods() {
        assert!(french_installment(dec!(1000), dec!(0.02), 0).is_err());
    }

    #[test]
    fn test_solver_recovers_level_payment_rate() {
        let installment = french_installment(dec!(10000), dec!(0.01), 24).unwrap();
        let flows = level_flows(installment, 24);
        let outcome = solve_periodic_rate(dec!(10000), &flows, &SolverSettings::default()).unwrap();

        assert!(outcome.is_converged());
        assert!(
            (outcome.rate() - dec!(0.01)).abs() < dec!(0.000001),
            "rate {}",
            outcome.rate()
        );
    }

    #[test]
    fn test_solver_long_schedule_from_default_guess() {
        // 360 periods overshoots into negative rates on the first step
        let installment = french_installment(dec!(10000), dec!(0.0095), 360).unwrap();
        let flows = level_flows(installment, 360);
        let outcome = solve_periodic_rate(dec!(10000), &flows, &SolverSettings::default()).unwrap();

        assert!(outcome.is_converged(), "outcome {outcome:?}");
        assert!((outcome.rate() - dec!(0.0095)).abs() < dec!(0.00001));
    }

    #[test]
    fn test_solver_step_convergence_lands_on_root() {
        // Stops on the step rule from 0.10; the returned rate must still be the root
        let rate = dec!(0.0117149169);
        let installment = french_installment(dec!(75000), rate, 120).unwrap();
        let flows = level_flows(installment, 120);
        let outcome = solve_periodic_rate(dec!(75000), &flows, &SolverSettings::default()).unwrap();

        assert!(outcome.is_converged());
        assert!(
            (outcome.rate() - rate).abs() < dec!(0.000000001),
            "rate {}",
            outcome.rate()
        );
    }

    #[test]
    fn test_solver_starting_at_root_converges_immediately() {
        let installment = french_installment(dec!(5000), dec!(0.02), 12).unwrap();
        let flows = level_flows(installment, 12);
        let settings = SolverSettings {
            initial_guess: dec!(0.02),
            ..SolverSettings::default()
        };
        let outcome = solve_periodic_rate(dec!(5000), &flows, &settings).unwrap();
        assert_eq!(outcome.iterations(), 0);
        assert!(outcome.is_converged());
    }

    #[test]
    fn test_solver_is_deterministic() {
        let flows = vec![dec!(120), dec!(130), dec!(140), dec!(1150)];
        let settings = SolverSettings::default();
        let first = solve_periodic_rate(dec!(1000), &flows, &settings).unwrap();
        let second = solve_periodic_rate(dec!(1000), &flows, &settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_solver_budget_exhaustion_is_flagged() {
        let installment = french_installment(dec!(10000), dec!(0.01), 24).unwrap();
        let flows = level_flows(installment, 24);
        let settings = SolverSettings {
            initial_guess: dec!(0.5),
            max_iterations: 1,
            ..SolverSettings::default()
        };
        let outcome = solve_periodic_rate(dec!(10000), &flows, &settings).unwrap();

        assert!(!outcome.is_converged());
        assert_eq!(outcome.iterations(), 1);
        let err = outcome.into_rate(Stage::CostRateSolve).unwrap_err();
        assert!(matches!(
            err,
            EngineError::NonConvergence {
                stage: Stage::CostRateSolve,
                iterations: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_solver_rejects_empty_flows() {
        let err = solve_periodic_rate(dec!(100), &[], &SolverSettings::default()).unwrap_err();
        assert!(matches!(err, EngineError::DegenerateInput { .. }));
    }

    #[test]
    fn test_solver_rejects_non_positive_reference() {
        let err =
            solve_periodic_rate(Decimal::ZERO, &[dec!(10)], &SolverSettings::default()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter { .. }));
    }
}
