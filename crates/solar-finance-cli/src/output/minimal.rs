use serde_json::Value;

/// Priority list of key output fields. Dotted entries look inside nested
/// objects (a projection keeps its IRR under `metrics`).
const PRIORITY_KEYS: [&str; 6] = [
    "price_per_mwh",
    "irr",
    "metrics.irr",
    "npv",
    "succeeded",
    "lcoe_per_mwh",
];

/// Print just the key answer value from the output.
///
/// Looks for well-known result fields in order of priority, then falls
/// back to the first field in the result object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(val) = PRIORITY_KEYS
        .iter()
        .filter_map(|key| lookup(result_obj, key))
        .find(|v| !v.is_null())
    {
        println!("{}", format_minimal(val));
        return;
    }

    if let Value::Object(map) = result_obj {
        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(result_obj));
}

fn lookup<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        // IRR outcomes: the rate when converged, otherwise the status
        Value::Object(map) => match (map.get("rate"), map.get("status")) {
            (Some(rate), _) => format_minimal(rate),
            (None, Some(status)) => format_minimal(status),
            _ => serde_json::to_string(value).unwrap_or_default(),
        },
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
