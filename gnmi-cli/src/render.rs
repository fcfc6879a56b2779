//! Output rendering for gNMI responses

use chrono::{DateTime, SecondsFormat, Utc};

use gnmi_client::gnmi::{
    CapabilityResponse, Notification, SetResponse, TypedValue, Update, typed_value,
};
use gnmi_client::path::to_xpath;

/// Prints the target's capabilities.
pub fn print_capabilities(response: &CapabilityResponse) {
    println!("gNMI version: {}", response.g_nmi_version);

    println!("Supported encodings:");
    for encoding in response.supported_encodings() {
        println!("  {}", encoding.as_str_name());
    }

    println!("Supported models ({}):", response.supported_models.len());
    for model in &response.supported_models {
        println!("  {} {} ({})", model.name, model.version, model.organization);
    }
}

/// Prints one notification as `[time] path = value` lines, followed by any
/// deleted paths.
pub fn print_notification(notification: &Notification) {
    let time = format_timestamp(notification.timestamp);
    let prefix = notification
        .prefix
        .as_ref()
        .map(to_xpath)
        .unwrap_or_default();

    for update in &notification.update {
        let path = update.path.as_ref().map(to_xpath).unwrap_or_default();
        let value = update_value(update);
        println!("[{}] {} = {}", time, join_path(&prefix, &path), value);
    }

    for deleted in &notification.delete {
        let path = to_xpath(deleted);
        println!("[{}] {} deleted", time, join_path(&prefix, &path));
    }
}

/// Prints the per-path results of a Set transaction.
pub fn print_set_response(response: &SetResponse) {
    for result in &response.response {
        let path = result.path.as_ref().map(to_xpath).unwrap_or_default();
        println!("{} {}", result.op().as_str_name(), path);
    }

    if response.timestamp != 0 {
        println!("Applied at {}", format_timestamp(response.timestamp));
    }
}

fn update_value(update: &Update) -> String {
    if let Some(val) = &update.val {
        return format_value(val);
    }
    // Old targets may still fill the deprecated value field.
    #[allow(deprecated)]
    if let Some(val) = &update.value {
        return format!("({} bytes)", val.value.len());
    }
    "(empty)".to_string()
}

/// Renders a nanosecond epoch timestamp as UTC RFC 3339.
pub fn format_timestamp(nanos: i64) -> String {
    DateTime::<Utc>::from_timestamp_nanos(nanos).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders a typed value for display. JSON payloads are pretty-printed when
/// they parse, binary payloads are summarized by length.
pub fn format_value(value: &TypedValue) -> String {
    use typed_value::Value;

    match &value.value {
        Some(Value::StringVal(s)) => s.clone(),
        Some(Value::IntVal(i)) => i.to_string(),
        Some(Value::UintVal(u)) => u.to_string(),
        Some(Value::BoolVal(b)) => b.to_string(),
        Some(Value::BytesVal(b)) => format!("({} bytes)", b.len()),
        Some(Value::FloatVal(f)) => f.to_string(),
        Some(Value::DoubleVal(d)) => d.to_string(),
        Some(Value::DecimalVal(d)) => {
            (d.digits as f64 * 10f64.powi(-(d.precision as i32))).to_string()
        }
        Some(Value::LeaflistVal(list)) => {
            let values: Vec<String> = list.element.iter().map(format_value).collect();
            format!("[{}]", values.join(", "))
        }
        Some(Value::AnyVal(any)) => format!("({}: {} bytes)", any.type_url, any.value.len()),
        Some(Value::JsonVal(j)) | Some(Value::JsonIetfVal(j)) => format_json(j),
        Some(Value::AsciiVal(a)) => a.clone(),
        Some(Value::ProtoBytes(p)) => format!("({} proto bytes)", p.len()),
        None => "(empty)".to_string(),
    }
}

fn format_json(raw: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(raw) {
        Ok(parsed) => serde_json::to_string_pretty(&parsed)
            .unwrap_or_else(|_| String::from_utf8_lossy(raw).into_owned()),
        Err(_) => String::from_utf8_lossy(raw).into_owned(),
    }
}

fn join_path(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        prefix.to_string()
    } else {
        format!("{}/{}", prefix, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnmi_client::gnmi::{Decimal64, ScalarArray};

    fn typed(value: typed_value::Value) -> TypedValue {
        TypedValue { value: Some(value) }
    }

    #[test]
    fn test_format_scalar_values() {
        use typed_value::Value;

        assert_eq!(format_value(&typed(Value::StringVal("up".into()))), "up");
        assert_eq!(format_value(&typed(Value::IntVal(-3))), "-3");
        assert_eq!(format_value(&typed(Value::UintVal(42))), "42");
        assert_eq!(format_value(&typed(Value::BoolVal(true))), "true");
        assert_eq!(format_value(&TypedValue { value: None }), "(empty)");
    }

    #[test]
    fn test_format_decimal_value() {
        let value = typed(typed_value::Value::DecimalVal(Decimal64 {
            digits: 12345,
            precision: 2,
        }));
        assert_eq!(format_value(&value), "123.45");
    }

    #[test]
    fn test_format_leaflist() {
        let value = typed(typed_value::Value::LeaflistVal(ScalarArray {
            element: vec![
                typed(typed_value::Value::StringVal("a".into())),
                typed(typed_value::Value::IntVal(1)),
            ],
        }));
        assert_eq!(format_value(&value), "[a, 1]");
    }

    #[test]
    fn test_format_json_value() {
        let value = typed(typed_value::Value::JsonVal(
            br#"{"oper-status":"UP"}"#.to_vec(),
        ));
        let rendered = format_value(&value);
        assert!(rendered.contains("\"oper-status\": \"UP\""));
    }

    #[test]
    fn test_format_invalid_json_falls_back_to_raw() {
        let value = typed(typed_value::Value::JsonVal(b"not json".to_vec()));
        assert_eq!(format_value(&value), "not json");
    }

    #[test]
    fn test_update_value_falls_back_to_deprecated_field() {
        #[allow(deprecated)]
        let update = Update {
            value: Some(gnmi_client::gnmi::Value {
                value: b"ok".to_vec(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(update_value(&update), "(2 bytes)");

        assert_eq!(update_value(&Update::default()), "(empty)");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(1_700_000_000_000_000_000),
            "2023-11-14T22:13:20.000Z"
        );
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("", "interfaces"), "interfaces");
        assert_eq!(join_path("interfaces", ""), "interfaces");
        assert_eq!(
            join_path("interfaces", "interface[name=eth0]"),
            "interfaces/interface[name=eth0]"
        );
    }
}
