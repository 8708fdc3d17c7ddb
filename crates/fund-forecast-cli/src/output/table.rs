use serde_json::Value;
use tabled::{builder::Builder, Table};

/// Format output as tables using the tabled crate.
///
/// Forecast envelopes get a metrics table followed by the stage breakdown;
/// anything else is flattened into field/value rows, with nested objects
/// expanded one level deep (`net_irr.mean`, ...) and arrays summarized.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(result) = map.get("result") {
                print_result(result);
                print_envelope_footer(map);
            } else {
                print_fields(value);
            }
        }
        Value::Array(arr) => print_records(arr),
        _ => println!("{}", value),
    }
}

fn print_result(result: &Value) {
    let Some(map) = result.as_object() else {
        print_fields(result);
        return;
    };

    if let Some(metrics) = map.get("metrics") {
        println!("Fund metrics");
        print_fields(metrics);
        if let Some(Value::Array(stages)) = map.get("stage_breakdown") {
            println!("\nStage breakdown");
            print_records(stages);
        }
        if let Some(pacing) = map.get("pacing") {
            println!("\nPacing");
            print_fields(pacing);
        }
    } else {
        print_fields(result);
    }
}

fn print_envelope_footer(envelope: &serde_json::Map<String, Value>) {
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
    if let Some(Value::String(methodology)) = envelope.get("methodology") {
        println!("\nMethodology: {}", methodology);
    }
}

/// Field/value table, flattening nested objects one level.
fn print_fields(value: &Value) {
    let Some(map) = value.as_object() else {
        println!("{}", value);
        return;
    };
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        match val {
            Value::Object(inner) => {
                for (inner_key, inner_val) in inner {
                    builder.push_record([
                        format!("{key}.{inner_key}"),
                        format_value(inner_val),
                    ]);
                }
            }
            Value::Array(arr) => {
                builder.push_record([key.clone(), format!("[{} items]", arr.len())]);
            }
            _ => {
                builder.push_record([key.clone(), format_value(val)]);
            }
        }
    }
    println!("{}", Table::from(builder));
}

/// One row per array element, columns taken from the first record.
fn print_records(arr: &[Value]) {
    if arr.is_empty() {
        println!("(empty)");
        return;
    }
    let Some(Value::Object(first)) = arr.first() else {
        for item in arr {
            println!("{}", format_value(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(&headers);
    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(h).map(format_value).unwrap_or_default())
                .collect();
            builder.push_record(row);
        }
    }
    println!("{}", Table::from(builder));
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
