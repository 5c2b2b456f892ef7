use napi::Result as NapiResult;
use napi_derive::napi;

use bond_engine_core::{BondParameters, EngineConfig};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_params(params_json: &str) -> NapiResult<BondParameters> {
    serde_json::from_str(params_json).map_err(to_napi_error)
}

/// Missing config means defaults; a partial config keeps defaults for omitted sections.
fn parse_config(config_json: Option<String>) -> NapiResult<EngineConfig> {
    match config_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error),
        None => Ok(EngineConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[napi]
pub fn evaluate_bond(params_json: String, config_json: Option<String>) -> NapiResult<String> {
    let params = parse_params(&params_json)?;
    let config = parse_config(config_json)?;
    let output = bond_engine_core::evaluate(&params, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn assess_bond(params_json: String, config_json: Option<String>) -> NapiResult<String> {
    let params = parse_params(&params_json)?;
    let config = parse_config(config_json)?;
    let output = bond_engine_core::assess_bond(&params, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Values every bond in a JSON array. Per-bond failures are reported in place
/// as `{ "error": "..." }` so one bad row does not sink the batch.
#[napi]
pub fn evaluate_batch(params_json: String, config_json: Option<String>) -> NapiResult<String> {
    let params: Vec<BondParameters> = serde_json::from_str(&params_json).map_err(to_napi_error)?;
    let config = parse_config(config_json)?;

    let results: Vec<serde_json::Value> = bond_engine_core::evaluate_batch(&params, &config)
        .into_iter()
        .map(|r| match r {
            Ok(output) => serde_json::to_value(output).unwrap_or_default(),
            Err(e) => serde_json::json!({ "error": e.to_string() }),
        })
        .collect();
    serde_json::to_string(&results).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

#[napi]
pub fn build_schedule(params_json: String, config_json: Option<String>) -> NapiResult<String> {
    let params = parse_params(&params_json)?;
    let config = parse_config(config_json)?;
    let schedule = bond_engine_core::amortization::build_schedule(&params, &config.costs)
        .map_err(to_napi_error)?;
    serde_json::to_string(&schedule).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Compliance
// ---------------------------------------------------------------------------

#[napi]
pub fn check_compliance(params_json: String, config_json: Option<String>) -> NapiResult<String> {
    let params = parse_params(&params_json)?;
    let config = parse_config(config_json)?;
    let output = bond_engine_core::compliance::check_compliance(&params, &config.regulatory)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
