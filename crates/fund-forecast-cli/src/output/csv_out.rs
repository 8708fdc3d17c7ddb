use serde_json::Value;
use std::io;

/// Write output as CSV to stdout.
///
/// Forecast envelopes emit the quarterly timeline as rows, which is the view
/// people actually open in a spreadsheet; other payloads fall back to
/// field/value pairs.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    if let Some(Value::Array(quarters)) = result_obj
        .as_object()
        .and_then(|m| m.get("timeline"))
        .and_then(|t| t.get("quarters"))
    {
        write_records(&mut wtr, quarters);
    } else if let Value::Array(arr) = result_obj {
        write_records(&mut wtr, arr);
    } else if let Value::Object(map) = result_obj {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in map {
            match val {
                Value::Object(inner) => {
                    for (inner_key, inner_val) in inner {
                        let _ = wtr.write_record([
                            format!("{key}.{inner_key}"),
                            format_csv_value(inner_val),
                        ]);
                    }
                }
                Value::Array(_) => {}
                _ => {
                    let _ = wtr.write_record([key.clone(), format_csv_value(val)]);
                }
            }
        }
    } else {
        let _ = wtr.write_record([format_csv_value(result_obj)]);
    }

    let _ = wtr.flush();
}

fn write_records(wtr: &mut csv::Writer<io::StdoutLock<'_>>, arr: &[Value]) {
    let Some(Value::Object(first)) = arr.first() else {
        return;
    };
    let headers: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
    let _ = wtr.write_record(&headers);

    for item in arr {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(format_csv_value).unwrap_or_default())
                .collect();
            let _ = wtr.write_record(&row);
        }
    }
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
