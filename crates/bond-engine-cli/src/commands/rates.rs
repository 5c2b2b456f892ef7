use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;

use bond_engine_core::rates::{
    convert_period_rate, effective_annual_to_period_rate, nominal_to_effective_annual,
    percent_to_rate,
};
use bond_engine_core::types::{with_metadata, Frequency, RateBasis};

const ALL_FREQUENCIES: [Frequency; 5] = [
    Frequency::Monthly,
    Frequency::Bimonthly,
    Frequency::Quarterly,
    Frequency::Semiannual,
    Frequency::Annual,
];

/// Arguments for rate conversion
#[derive(Args)]
pub struct ConvertRateArgs {
    /// Annual rate in percent (12 for 12%)
    #[arg(long)]
    pub rate: Decimal,

    /// How the rate is quoted: effective or nominal
    #[arg(long, default_value = "effective")]
    pub basis: RateBasis,

    /// Compounding frequency (required for nominal rates)
    #[arg(long)]
    pub capitalization: Option<Frequency>,

    /// Target payment frequency
    #[arg(long, default_value = "monthly")]
    pub frequency: Frequency,
}

#[derive(Serialize)]
struct RateConversion {
    effective_annual_rate: Decimal,
    period_rate: Decimal,
    periods_per_year: u32,
    equivalent_period_rates: Vec<EquivalentRate>,
}

#[derive(Serialize)]
struct EquivalentRate {
    frequency: Frequency,
    period_rate: Decimal,
}

pub fn run_convert_rate(args: ConvertRateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let quoted = percent_to_rate(args.rate);

    let effective_annual_rate = match args.basis {
        RateBasis::Effective => quoted,
        RateBasis::Nominal => {
            let capitalization = args
                .capitalization
                .ok_or("--capitalization is required for nominal rates")?;
            nominal_to_effective_annual(quoted, capitalization.periods_per_year())?
        }
    };

    let periods_per_year = args.frequency.periods_per_year();
    let period_rate = effective_annual_to_period_rate(effective_annual_rate, periods_per_year)?;

    let equivalent_period_rates = ALL_FREQUENCIES
        .iter()
        .map(|f| {
            Ok(EquivalentRate {
                frequency: *f,
                period_rate: convert_period_rate(
                    period_rate,
                    periods_per_year,
                    f.periods_per_year(),
                )?,
            })
        })
        .collect::<Result<Vec<_>, bond_engine_core::EngineError>>()?;

    let assumptions = serde_json::json!({
        "basis": args.basis,
        "capitalization": args.capitalization,
        "compounding": "discrete, (1 + r)^(1/m) - 1",
    });

    let output = with_metadata(
        "Equivalent Rate Conversion",
        &assumptions,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        RateConversion {
            effective_annual_rate,
            period_rate,
            periods_per_year,
            equivalent_period_rates,
        },
    );
    Ok(serde_json::to_value(output)?)
}
