use serde_json::Value;

/// Print just the headline number from the output.
///
/// Forecast output nests the headline figures under `result.metrics`; Monte
/// Carlo output reports distributions directly under `result`. Falls back to
/// the first field when nothing recognizable is present.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    // Forecast results carry a metrics block
    let target = result_obj
        .as_object()
        .and_then(|m| m.get("metrics"))
        .unwrap_or(result_obj);

    let priority_keys = [
        "net_irr",
        "net_moic",
        "tvpi",
        "dpi",
        "total_distributed",
        "valid",
    ];

    if let Value::Object(map) = target {
        for key in &priority_keys {
            if let Some(val) = map.get(*key) {
                if !val.is_null() {
                    // Monte Carlo metrics are distribution objects; report
                    // their mean
                    if let Some(mean) = val.get("mean") {
                        println!("{}", format_minimal(mean));
                    } else {
                        println!("{}", format_minimal(val));
                    }
                    return;
                }
            }
        }

        if let Some((key, val)) = map.iter().next() {
            println!("{}: {}", key, format_minimal(val));
            return;
        }
    }

    println!("{}", format_minimal(target));
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
