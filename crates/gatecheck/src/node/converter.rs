use serde_json::{Map, Value};

use crate::error::ConvertError;

/// Translates a raw node description into the fleet's wire form.
///
/// Returning an error drops the node from the run; it is never fatal.
pub trait NodeConverter: Send + Sync {
    fn convert(&self, node: &Value) -> Result<Map<String, Value>, ConvertError>;
}

/// Converter for nodes that are already in the fleet's wire form.
///
/// Checks the fields every fleet node needs (`type`, `server`, `port`),
/// normalizes a numeric-string port, and strips internal `_` keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughConverter;

impl NodeConverter for PassthroughConverter {
    fn convert(&self, node: &Value) -> Result<Map<String, Value>, ConvertError> {
        let object = node.as_object().ok_or(ConvertError::NotAnObject)?;

        non_empty_str(object, "type")?;
        non_empty_str(object, "server")?;
        let port = port(object)?;

        let mut wire: Map<String, Value> =
            object.iter().filter(|(key, _)| !key.starts_with('_')).map(|(k, v)| (k.clone(), v.clone())).collect();
        wire.insert("port".into(), Value::from(port));

        Ok(wire)
    }
}

fn non_empty_str(object: &Map<String, Value>, field: &'static str) -> Result<(), ConvertError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(ConvertError::MissingField(field)),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(()),
        Some(other) => {
            Err(ConvertError::InvalidField { field, reason: format!("expected non-empty string, got {other}") })
        }
    }
}

fn port(object: &Map<String, Value>) -> Result<u16, ConvertError> {
    let invalid = |reason: String| ConvertError::InvalidField { field: "port", reason };

    let value = match object.get("port") {
        None | Some(Value::Null) => return Err(ConvertError::MissingField("port")),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| invalid(format!("{n} is not a port")))?,
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|e| invalid(format!("{s:?}: {e}")))?,
        Some(other) => return Err(invalid(format!("unexpected {other}"))),
    };

    match u16::try_from(value) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(invalid(format!("{value} is out of range"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepts_complete_node() {
        let node = json!({ "name": "hk-01", "type": "ss", "server": "1.2.3.4", "port": "8388", "_gpt": true });
        let wire = PassthroughConverter.convert(&node).unwrap();
        assert_eq!(wire["port"], json!(8388));
        assert_eq!(wire["name"], json!("hk-01"));
        assert!(!wire.contains_key("_gpt"));
    }

    #[test]
    fn test_rejects_incomplete_nodes() {
        assert!(matches!(PassthroughConverter.convert(&json!("hk-01")), Err(ConvertError::NotAnObject)));
        assert!(matches!(
            PassthroughConverter.convert(&json!({ "type": "ss", "port": 1 })),
            Err(ConvertError::MissingField("server"))
        ));
        assert!(PassthroughConverter.convert(&json!({ "type": "", "server": "a", "port": 1 })).is_err());
        assert!(PassthroughConverter.convert(&json!({ "type": "ss", "server": "a", "port": 0 })).is_err());
        assert!(PassthroughConverter.convert(&json!({ "type": "ss", "server": "a", "port": 70000 })).is_err());
        assert!(PassthroughConverter.convert(&json!({ "type": "ss", "server": "a", "port": "x" })).is_err());
    }
}
