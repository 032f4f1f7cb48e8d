use serde_json::{Map, Value};
use tabled::{builder::Builder, Table};

/// Result fields that hold one row per year or per scenario.
const SERIES_KEYS: [&str; 2] = ["records", "results"];

/// Columns shown for annual records; the full set is in JSON/CSV output.
const RECORD_COLUMNS: [&str; 9] = [
    "year",
    "calendar_year",
    "revenue_source",
    "production_kwh",
    "revenue",
    "operating_expenses",
    "ebitda",
    "tax_equity_cash_flow",
    "total_cash_flow",
];

/// Format output as tables using the tabled crate.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result_table(result, map);
            } else {
                print_field_table(map);
            }
        }
        Value::Array(arr) => print_array_table(arr, None),
        _ => println!("{}", value),
    }
}

fn print_result_table(result: &Value, envelope: &Map<String, Value>) {
    match result {
        Value::Object(res_map) => {
            let scalars: Map<String, Value> = res_map
                .iter()
                .filter(|(key, _)| !SERIES_KEYS.contains(&key.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();

            if let Some(Value::Array(records)) = res_map.get("records") {
                print_array_table(records, Some(&RECORD_COLUMNS));
                println!();
            }
            if let Some(Value::Array(results)) = res_map.get("results") {
                print_array_table(results, None);
                println!();
            }
            print_field_table(&scalars);
        }
        _ => print_field_table(envelope),
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\nWarnings:");
            for w in warnings {
                if let Value::String(s) = w {
                    println!("  - {}", s);
                }
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

/// Two-column table; nested objects (metrics, capex) are flattened with
/// dotted field names.
fn print_field_table(map: &Map<String, Value>) {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in flatten(map, "") {
        builder.push_record([key, format_value(&val)]);
    }
    println!("{}", Table::from(builder));
}

fn flatten(map: &Map<String, Value>, prefix: &str) -> Vec<(String, Value)> {
    let mut rows = Vec::new();
    for (key, val) in map {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match val {
            Value::Object(inner) if !is_outcome(inner) => rows.extend(flatten(inner, &name)),
            _ => rows.push((name, val.clone())),
        }
    }
    rows
}

/// Tagged outcomes (IRR status) read better as a single cell.
fn is_outcome(map: &Map<String, Value>) -> bool {
    map.contains_key("status")
}

fn print_array_table(arr: &[Value], columns: Option<&[&str]>) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }

    if let Some(Value::Object(first)) = arr.first() {
        let headers: Vec<String> = match columns {
            Some(cols) => cols.iter().map(|c| c.to_string()).collect(),
            None => first.keys().cloned().collect(),
        };
        let mut builder = Builder::default();
        builder.push_record(headers.clone());

        for item in arr {
            if let Value::Object(map) = item {
                let row: Vec<String> = headers
                    .iter()
                    .map(|h| map.get(h.as_str()).map(format_value).unwrap_or_default())
                    .collect();
                builder.push_record(row);
            }
        }

        println!("{}", Table::from(builder));
    } else {
        for item in arr {
            println!("{}", format_value(item));
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(arr) => {
            let items: Vec<String> = arr.iter().map(format_value).collect();
            items.join(", ")
        }
        Value::Object(map) => match (map.get("rate"), map.get("status")) {
            (Some(rate), _) => format_value(rate),
            (None, Some(status)) => format_value(status),
            _ => serde_json::to_string(value).unwrap_or_default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_metrics() {
        let value = json!({
            "project_name": "Reference",
            "metrics": {"npv": "100", "irr": {"status": "converged", "rate": "0.1"}}
        });
        let rows = flatten(value.as_object().unwrap(), "");
        let names: Vec<&str> = rows.iter().map(|(k, _)| k.as_str()).collect();
        assert!(names.contains(&"metrics.npv"));
        assert!(names.contains(&"metrics.irr"));
        assert!(!names.contains(&"metrics.irr.rate"));
    }
}
