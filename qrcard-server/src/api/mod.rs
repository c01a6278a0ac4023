//! HTTP API handlers for qrcard-server

pub mod generate;
pub mod health;
pub mod scans;
pub mod ui;

pub use generate::generate_routes;
pub use health::health_routes;
pub use scans::scan_routes;
pub use ui::ui_routes;

use serde_json::Value;

/// Text of a loosely typed JSON input field
///
/// Strings and numbers are accepted; anything else counts as missing.
pub(crate) fn value_text(value: Option<Value>) -> String {
    match value {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(Some(json!("Ann"))), "Ann");
        assert_eq!(value_text(Some(json!(42))), "42");
        assert_eq!(value_text(Some(json!(null))), "");
        assert_eq!(value_text(Some(json!(["a"]))), "");
        assert_eq!(value_text(None), "");
    }
}
