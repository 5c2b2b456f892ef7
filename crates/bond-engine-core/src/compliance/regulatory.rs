use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::params::BondParameters;
use crate::types::{with_metadata, ComputationOutput, Currency, Rate};
use crate::EngineResult;

/// Compliant-rule fraction below which a report is non-compliant.
const NON_COMPLIANT_THRESHOLD: Decimal = dec!(0.75);

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

/// Regulatory limits for one jurisdiction. Injected, never global.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatoryBounds {
    /// Maximum effective annual rate, in percent, for local-currency bonds
    pub rate_cap_percent_local: Decimal,
    /// Maximum effective annual rate, in percent, for foreign-currency bonds
    pub rate_cap_percent_foreign: Decimal,
    pub min_term_periods: u32,
    pub max_term_periods: u32,
    /// Grace periods may not exceed floor(term · ratio)
    pub max_grace_ratio: Decimal,
    /// Items the issuer must disclose to the holder
    pub required_disclosures: Vec<String>,
}

impl Default for RegulatoryBounds {
    fn default() -> Self {
        Self {
            rate_cap_percent_local: dec!(60),
            rate_cap_percent_foreign: dec!(45),
            min_term_periods: 6,
            max_term_periods: 360,
            max_grace_ratio: dec!(0.25),
            required_disclosures: vec![
                "payment_schedule".into(),
                "effective_cost_rate".into(),
                "insurance_terms".into(),
                "fees_and_charges".into(),
            ],
        }
    }
}

impl RegulatoryBounds {
    pub fn rate_cap_percent(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Local => self.rate_cap_percent_local,
            Currency::Foreign => self.rate_cap_percent_foreign,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    Partial,
    NonCompliant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleEvaluation {
    pub name: String,
    pub is_compliant: bool,
    pub observed_value: Decimal,
    pub limit_value: Decimal,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub rules: Vec<RuleEvaluation>,
    pub overall_status: ComplianceStatus,
    /// Fraction of rules that passed
    pub compliant_ratio: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Evaluate the bond against every rule in order and aggregate the result.
pub fn assess_compliance(
    params: &BondParameters,
    bounds: &RegulatoryBounds,
) -> EngineResult<ComplianceReport> {
    let rules = vec![
        rate_cap_rule(params, bounds)?,
        term_rule(params, bounds),
        grace_rule(params, bounds),
        disclosure_rule(bounds),
    ];

    let passing = rules.iter().filter(|r| r.is_compliant).count();
    let compliant_ratio = Decimal::from(passing as u64) / Decimal::from(rules.len() as u64);
    let overall_status = aggregate_status(compliant_ratio);

    debug!(passing, total = rules.len(), status = ?overall_status, "compliance assessed");

    Ok(ComplianceReport {
        rules,
        overall_status,
        compliant_ratio,
    })
}

/// [`assess_compliance`] wrapped in the standard output envelope.
pub fn check_compliance(
    params: &BondParameters,
    bounds: &RegulatoryBounds,
) -> EngineResult<ComputationOutput<ComplianceReport>> {
    let start = Instant::now();
    let report = assess_compliance(params, bounds)?;

    let warnings: Vec<String> = report
        .rules
        .iter()
        .filter(|r| !r.is_compliant)
        .map(|r| format!("Rule '{}' failed: {}", r.name, r.explanation))
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    let assumptions = serde_json::json!({
        "currency": params.currency,
        "rate_cap_percent": bounds.rate_cap_percent(params.currency).to_string(),
        "term_bounds": [bounds.min_term_periods, bounds.max_term_periods],
        "max_grace_ratio": bounds.max_grace_ratio.to_string(),
        "non_compliant_below": NON_COMPLIANT_THRESHOLD.to_string(),
    });

    Ok(with_metadata(
        "Regulatory Bounds Compliance",
        &assumptions,
        warnings,
        elapsed,
        report,
    ))
}

/// All rules pass: compliant. Fewer than 75% pass: non-compliant. Otherwise partial.
pub fn aggregate_status(compliant_ratio: Rate) -> ComplianceStatus {
    if compliant_ratio >= Decimal::ONE {
        ComplianceStatus::Compliant
    } else if compliant_ratio < NON_COMPLIANT_THRESHOLD {
        ComplianceStatus::NonCompliant
    } else {
        ComplianceStatus::Partial
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn rate_cap_rule(
    params: &BondParameters,
    bounds: &RegulatoryBounds,
) -> EngineResult<RuleEvaluation> {
    let observed = params.effective_annual_rate()? * dec!(100);
    let limit = bounds.rate_cap_percent(params.currency);
    let is_compliant = observed <= limit;

    Ok(RuleEvaluation {
        name: "interest_rate_cap".into(),
        is_compliant,
        observed_value: observed,
        limit_value: limit,
        explanation: if is_compliant {
            format!(
                "Effective annual rate {observed}% is within the {limit}% cap for {:?} currency.",
                params.currency
            )
        } else {
            format!(
                "Effective annual rate {observed}% exceeds the {limit}% cap for {:?} currency.",
                params.currency
            )
        },
    })
}

fn term_rule(params: &BondParameters, bounds: &RegulatoryBounds) -> RuleEvaluation {
    let term = params.term_periods;
    let is_compliant = term >= bounds.min_term_periods && term <= bounds.max_term_periods;

    RuleEvaluation {
        name: "term_bounds".into(),
        is_compliant,
        observed_value: Decimal::from(term),
        limit_value: Decimal::from(bounds.max_term_periods),
        explanation: format!(
            "Term of {term} periods {} the allowed range [{}, {}].",
            if is_compliant { "is within" } else { "falls outside" },
            bounds.min_term_periods,
            bounds.max_term_periods
        ),
    }
}

fn grace_rule(params: &BondParameters, bounds: &RegulatoryBounds) -> RuleEvaluation {
    let grace = params.active_grace_periods();
    let max_grace = (Decimal::from(params.term_periods) * bounds.max_grace_ratio).floor();
    let observed = Decimal::from(grace);
    let is_compliant = observed <= max_grace;

    RuleEvaluation {
        name: "grace_ratio".into(),
        is_compliant,
        observed_value: observed,
        limit_value: max_grace,
        explanation: format!(
            "{grace} grace periods against a maximum of {max_grace} ({} of a {}-period term).",
            bounds.max_grace_ratio, params.term_periods
        ),
    }
}

fn disclosure_rule(bounds: &RegulatoryBounds) -> RuleEvaluation {
    // Every engine output carries the full disclosure set.
    let required = Decimal::from(bounds.required_disclosures.len() as u64);

    RuleEvaluation {
        name: "disclosure_completeness".into(),
        is_compliant: true,
        observed_value: required,
        limit_value: required,
        explanation: format!(
            "All required disclosures provided: {}.",
            bounds.required_disclosures.join(", ")
        ),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
