use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Stage};
use crate::params::BondParameters;
use crate::time_value::french_installment;
use crate::types::{GraceKind, Money, Rate};
use crate::EngineResult;

/// Balances below this are treated as fully repaid.
pub const BALANCE_EPSILON: Decimal = dec!(0.000001);

/// Upper bound on rows reserved ahead of time; longer schedules grow as they go.
const PREALLOCATED_PERIODS: u32 = 1_200;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Charges layered on top of debt service. Static configuration, never user input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostSchedule {
    /// Insurance rate per month on the outstanding balance (0.00028 = 0.028%)
    pub insurance_rate_monthly: Rate,
    /// Flat service fee charged every period
    pub service_fee: Money,
    /// Transaction tax on everything paid in the period
    pub transaction_tax_rate: Rate,
}

impl Default for CostSchedule {
    fn default() -> Self {
        Self {
            insurance_rate_monthly: dec!(0.00028),
            service_fee: dec!(3.50),
            transaction_tax_rate: dec!(0.00005),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodPhase {
    TotalGrace,
    PartialGrace,
    Amortizing,
}

/// One row of the schedule. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPeriod {
    /// 1-based period number
    pub index: u32,
    pub due_date: NaiveDate,
    pub phase: PeriodPhase,
    pub opening_balance: Money,
    pub principal_component: Money,
    /// Interest actually paid this period
    pub interest_component: Money,
    /// Interest added to the balance instead of being paid (total grace)
    pub capitalized_interest: Money,
    pub insurance_component: Money,
    pub service_fee_component: Money,
    pub transaction_tax_component: Money,
    pub total_due: Money,
    pub remaining_balance: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub periods: Vec<PaymentPeriod>,
    /// Constant installment (principal + interest) once amortization starts
    pub installment: Money,
    pub period_rate: Rate,
    pub effective_annual_rate: Rate,
    pub periods_per_year: u32,
}

/// Totals across the whole schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub installment: Money,
    pub period_rate: Rate,
    pub effective_annual_rate: Rate,
    pub periods_per_year: u32,
    pub total_principal: Money,
    pub total_interest: Money,
    pub total_capitalized_interest: Money,
    pub total_insurance: Money,
    pub total_service_fees: Money,
    pub total_transaction_tax: Money,
    pub total_paid: Money,
}

impl PaymentSchedule {
    /// Everything the borrower pays each period (drives the cost rate).
    pub fn all_in_cash_flows(&self) -> Vec<Money> {
        self.periods.iter().map(|p| p.total_due).collect()
    }

    /// Principal plus interest only (drives the yield rate).
    pub fn debt_service_cash_flows(&self) -> Vec<Money> {
        self.periods
            .iter()
            .map(|p| p.principal_component + p.interest_component)
            .collect()
    }

    pub fn final_balance(&self) -> Money {
        self.periods
            .last()
            .map(|p| p.remaining_balance)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn summary(&self) -> EngineResult<ScheduleSummary> {
        let sum = |f: fn(&PaymentPeriod) -> Money| -> EngineResult<Money> {
            let amounts: Vec<Money> = self.periods.iter().map(f).collect();
            checked_total(&amounts)
        };

        Ok(ScheduleSummary {
            installment: self.installment,
            period_rate: self.period_rate,
            effective_annual_rate: self.effective_annual_rate,
            periods_per_year: self.periods_per_year,
            total_principal: sum(|p| p.principal_component)?,
            total_interest: sum(|p| p.interest_component)?,
            total_capitalized_interest: sum(|p| p.capitalized_interest)?,
            total_insurance: sum(|p| p.insurance_component)?,
            total_service_fees: sum(|p| p.service_fee_component)?,
            total_transaction_tax: sum(|p| p.transaction_tax_component)?,
            total_paid: sum(|p| p.total_due)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Build the French-method (constant installment) payment schedule.
///
/// Grace periods come first. Under total grace nothing is paid and interest
/// capitalizes; under partial grace only interest is paid. The installment is
/// sized on the balance outstanding when amortization starts, over the
/// periods that remain, and the final period absorbs any residue so the
/// balance closes at exactly zero.
pub fn build_schedule(
    params: &BondParameters,
    costs: &CostSchedule,
) -> EngineResult<PaymentSchedule> {
    params.validate()?;
    validate_costs(costs)?;

    let n = params.term_periods;
    let grace = params.active_grace_periods();
    let rate = params.period_rate()?;
    let effective_annual_rate = params.effective_annual_rate()?;
    let months_per_period = params.payment_frequency.months_per_period();
    let insurance_rate = costs
        .insurance_rate_monthly
        .checked_mul(Decimal::from(months_per_period))
        .ok_or_else(amount_overflow)?;

    // Reject terms whose maturity falls outside the calendar before doing any work
    due_date(params.start_date, n, months_per_period)?;

    debug!(
        term = n,
        grace,
        %rate,
        grace_kind = ?params.grace_kind,
        "building payment schedule"
    );

    let mut installment = if grace == 0 {
        french_installment(params.principal, rate, n)?
    } else {
        Decimal::ZERO
    };
    let mut balance = params.principal;
    let mut periods: Vec<PaymentPeriod> = Vec::with_capacity(n.min(PREALLOCATED_PERIODS) as usize);

    for index in 1..=n {
        let opening_balance = balance;
        let interest = balance.checked_mul(rate).ok_or_else(amount_overflow)?;
        let phase = phase_for(params.grace_kind, index, grace);

        if phase == PeriodPhase::Amortizing && grace > 0 && index == grace + 1 {
            installment = french_installment(balance, rate, n - grace)?;
        }

        let (principal_component, interest_component, capitalized_interest) = match phase {
            PeriodPhase::TotalGrace => {
                balance = balance.checked_add(interest).ok_or_else(amount_overflow)?;
                (Decimal::ZERO, Decimal::ZERO, interest)
            }
            PeriodPhase::PartialGrace => (Decimal::ZERO, interest, Decimal::ZERO),
            PeriodPhase::Amortizing => {
                let principal = if index == n {
                    balance
                } else {
                    (installment - interest).max(Decimal::ZERO).min(balance)
                };
                (principal, interest, Decimal::ZERO)
            }
        };

        let insurance_component = if params.include_insurance {
            balance.checked_mul(insurance_rate).ok_or_else(amount_overflow)?
        } else {
            Decimal::ZERO
        };
        let service_fee_component = if params.include_service_fee {
            costs.service_fee
        } else {
            Decimal::ZERO
        };
        let taxable = checked_total(&[
            principal_component,
            interest_component,
            insurance_component,
            service_fee_component,
        ])?;
        let transaction_tax_component = taxable
            .checked_mul(costs.transaction_tax_rate)
            .ok_or_else(amount_overflow)?;
        let total_due = taxable
            .checked_add(transaction_tax_component)
            .ok_or_else(amount_overflow)?;

        balance -= principal_component;
        if balance < BALANCE_EPSILON {
            balance = Decimal::ZERO;
        }

        periods.push(PaymentPeriod {
            index,
            due_date: due_date(params.start_date, index, months_per_period)?,
            phase,
            opening_balance,
            principal_component,
            interest_component,
            capitalized_interest,
            insurance_component,
            service_fee_component,
            transaction_tax_component,
            total_due,
            remaining_balance: balance,
        });
    }

    debug!(%installment, periods = periods.len(), "payment schedule built");

    Ok(PaymentSchedule {
        periods,
        installment,
        period_rate: rate,
        effective_annual_rate,
        periods_per_year: params.periods_per_year(),
    })
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn validate_costs(costs: &CostSchedule) -> EngineResult<()> {
    if costs.insurance_rate_monthly < Decimal::ZERO {
        return Err(EngineError::invalid(
            "insurance_rate_monthly",
            "Insurance rate must be non-negative.",
        ));
    }
    if costs.service_fee < Decimal::ZERO {
        return Err(EngineError::invalid(
            "service_fee",
            "Service fee must be non-negative.",
        ));
    }
    if costs.transaction_tax_rate < Decimal::ZERO {
        return Err(EngineError::invalid(
            "transaction_tax_rate",
            "Transaction tax rate must be non-negative.",
        ));
    }
    Ok(())
}

fn phase_for(kind: GraceKind, index: u32, grace: u32) -> PeriodPhase {
    if index > grace {
        return PeriodPhase::Amortizing;
    }
    match kind {
        GraceKind::Total => PeriodPhase::TotalGrace,
        GraceKind::Partial => PeriodPhase::PartialGrace,
        GraceKind::None => PeriodPhase::Amortizing,
    }
}

fn due_date(start: NaiveDate, index: u32, months_per_period: u32) -> EngineResult<NaiveDate> {
    index
        .checked_mul(months_per_period)
        .and_then(|months| start.checked_add_months(Months::new(months)))
        .ok_or_else(|| {
            EngineError::invalid("start_date", "Schedule runs past the supported calendar range.")
        })
}

fn checked_total(amounts: &[Money]) -> EngineResult<Money> {
    amounts
        .iter()
        .try_fold(Decimal::ZERO, |acc, amount| acc.checked_add(*amount))
        .ok_or_else(amount_overflow)
}

fn amount_overflow() -> EngineError {
    EngineError::degenerate(Stage::Schedule, "amount exceeds the decimal range")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
