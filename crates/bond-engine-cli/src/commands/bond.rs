use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;
use tracing::info;

use bond_engine_core::amortization::build_schedule;
use bond_engine_core::compliance::check_compliance;
use bond_engine_core::types::{Currency, Frequency, GraceKind, RateBasis};
use bond_engine_core::{assess_bond, evaluate, BondParameters, EngineConfig};

use crate::input;

/// Bond terms, from flags or a JSON/YAML document
#[derive(Args)]
pub struct BondArgs {
    /// Path to a JSON or YAML file with bond parameters (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Face amount
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Currency: local (CUR_A) or foreign (CUR_B)
    #[arg(long, default_value = "local")]
    pub currency: Currency,

    /// Number of payment periods
    #[arg(long)]
    pub term: Option<u32>,

    /// Annual rate in percent (12 for 12%)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// How the rate is quoted: effective or nominal
    #[arg(long, default_value = "effective")]
    pub rate_basis: RateBasis,

    /// Compounding frequency for nominal rates
    #[arg(long)]
    pub capitalization: Option<Frequency>,

    /// Payment frequency
    #[arg(long, default_value = "monthly")]
    pub frequency: Frequency,

    /// Grace kind: none, partial (interest only) or total (interest capitalizes)
    #[arg(long, default_value = "none")]
    pub grace_kind: GraceKind,

    /// Number of grace periods at the start of the term
    #[arg(long, default_value = "0")]
    pub grace_periods: u32,

    /// Issue date (YYYY-MM-DD); due dates step from here
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Charge periodic insurance on the outstanding balance
    #[arg(long)]
    pub insurance: bool,

    /// Charge the fixed per-period service fee
    #[arg(long)]
    pub service_fee: bool,

}

#[derive(Args)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub bond: BondArgs,

    /// Also attach the compliance report
    #[arg(long)]
    pub with_compliance: bool,
}

pub fn run_evaluate(
    args: EvaluateArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let with_compliance = args.with_compliance;
    let params = resolve_params(args.bond)?;
    info!(principal = %params.principal, term = params.term_periods, "evaluating bond");

    if with_compliance {
        Ok(serde_json::to_value(assess_bond(&params, config)?)?)
    } else {
        Ok(serde_json::to_value(evaluate(&params, config)?)?)
    }
}

pub fn run_schedule(
    args: BondArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let params = resolve_params(args)?;
    let schedule = build_schedule(&params, &config.costs)?;
    Ok(serde_json::to_value(schedule.periods)?)
}

pub fn run_compliance(
    args: BondArgs,
    config: &EngineConfig,
) -> Result<Value, Box<dyn std::error::Error>> {
    let params = resolve_params(args)?;
    let result = check_compliance(&params, &config.regulatory)?;
    Ok(serde_json::to_value(result)?)
}

fn resolve_params(args: BondArgs) -> Result<BondParameters, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_document(path);
    }
    if let Some(data) = input::stdin::read_stdin()? {
        return Ok(serde_json::from_value(data)?);
    }

    Ok(BondParameters {
        principal: args
            .principal
            .ok_or("--principal is required (or provide --input)")?,
        currency: args.currency,
        term_periods: args.term.ok_or("--term is required (or provide --input)")?,
        rate_basis: args.rate_basis,
        rate_value_percent: args.rate.ok_or("--rate is required (or provide --input)")?,
        capitalization_frequency: args.capitalization,
        grace_kind: args.grace_kind,
        grace_periods: args.grace_periods,
        start_date: args
            .start_date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        include_insurance: args.insurance,
        include_service_fee: args.service_fee,
        payment_frequency: args.frequency,
    })
}
