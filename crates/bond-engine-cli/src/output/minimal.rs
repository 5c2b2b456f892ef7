use serde_json::{Map, Value};

/// Headline figures, most important first.
const PRIORITY_KEYS: [&str; 6] = [
    "effective_cost_rate_annual",
    "overall_status",
    "effective_annual_rate",
    "period_rate",
    "effective_yield_rate_annual",
    "installment",
];

/// Print just the key answer value from the output.
///
/// Looks for the headline fields in the result, then in nested sections
/// (`indicators`, `valuation.indicators`), and falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Value::Object(map) = result_obj {
        for key in &PRIORITY_KEYS {
            if let Some(val) = find_key(map, key, 2) {
                println!("{}", format_minimal(val));
                return;
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    // Schedules are arrays of periods: print the final amount due
    if let Value::Array(rows) = result_obj {
        if let Some(Value::Object(last)) = rows.last() {
            if let Some(total) = last.get("total_due") {
                println!("{}", format_minimal(total));
                return;
            }
        }
    }

    println!("{}", format_minimal(result_obj));
}

/// Non-null `key` in `map` or in nested objects up to `depth` levels down.
fn find_key<'a>(map: &'a Map<String, Value>, key: &str, depth: u8) -> Option<&'a Value> {
    if let Some(val) = map.get(key) {
        if !val.is_null() {
            return Some(val);
        }
    }
    if depth == 0 {
        return None;
    }
    map.values()
        .filter_map(Value::as_object)
        .find_map(|inner| find_key(inner, key, depth - 1))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
