pub mod conversion;

pub use conversion::{
    annualize_period_rate, convert_period_rate, effective_annual_to_period_rate,
    nominal_to_effective_annual, percent_to_rate,
};
