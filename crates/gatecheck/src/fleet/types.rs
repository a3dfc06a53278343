//! Wire types of the fleet control API.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::LeaseError;

/// Body of `POST /start`
#[derive(Debug, Serialize)]
pub struct StartRequest<'a> {
    pub proxies: Vec<&'a Map<String, Value>>,
    /// Lease duration in milliseconds
    pub timeout: u64,
}

/// Body of `POST /stop`
#[derive(Debug, Serialize)]
pub struct StopRequest<'a> {
    pub pid: [&'a Value; 1],
}

/// Parsed `POST /start` reply
#[derive(Debug, Clone, PartialEq)]
pub struct StartResponse {
    pub pid: Value,
    pub ports: Vec<u16>,
}

impl StartResponse {
    /// Parse the reply body; `expected` is the number of nodes requested
    pub fn parse(body: &str, expected: usize) -> Result<Self, LeaseError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| LeaseError::Malformed(format!("{e}: {}", truncate(body, 200))))?;

        let object = value.as_object().ok_or_else(|| LeaseError::Malformed(truncate(body, 200)))?;

        let pid = object.get("pid").filter(|pid| is_truthy(pid)).ok_or(LeaseError::MissingField("pid"))?;

        let ports = object
            .get("ports")
            .and_then(Value::as_array)
            .ok_or(LeaseError::MissingField("ports"))?
            .iter()
            .map(parse_port)
            .collect::<Result<Vec<u16>, LeaseError>>()?;

        if ports.len() != expected {
            return Err(LeaseError::PortCountMismatch { expected, got: ports.len() });
        }

        Ok(Self { pid: pid.clone(), ports })
    }
}

fn parse_port(value: &Value) -> Result<u16, LeaseError> {
    value
        .as_u64()
        .and_then(|port| u16::try_from(port).ok())
        .filter(|port| *port != 0)
        .ok_or_else(|| LeaseError::Malformed(format!("invalid port {value}")))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_start_response() {
        let parsed = StartResponse::parse(r#"{"pid": 4242, "ports": [40001, 40002]}"#, 2).unwrap();
        assert_eq!(parsed.pid, json!(4242));
        assert_eq!(parsed.ports, vec![40001, 40002]);
    }

    #[test]
    fn test_parse_start_response_failures() {
        assert!(matches!(
            StartResponse::parse(r#"{"ports": [1]}"#, 1),
            Err(LeaseError::MissingField("pid"))
        ));
        assert!(matches!(
            StartResponse::parse(r#"{"pid": 0, "ports": [1]}"#, 1),
            Err(LeaseError::MissingField("pid"))
        ));
        assert!(matches!(StartResponse::parse(r#"{"pid": 1}"#, 1), Err(LeaseError::MissingField("ports"))));
        assert!(matches!(StartResponse::parse("core not running", 1), Err(LeaseError::Malformed(_))));
        assert!(matches!(
            StartResponse::parse(r#"{"pid": 1, "ports": [1, 2]}"#, 3),
            Err(LeaseError::PortCountMismatch { expected: 3, got: 2 })
        ));
        assert!(matches!(
            StartResponse::parse(r#"{"pid": 1, "ports": [70000]}"#, 1),
            Err(LeaseError::Malformed(_))
        ));
    }

    #[test]
    fn test_stop_request_shape() {
        let pid = json!("abc");
        let body = serde_json::to_value(StopRequest { pid: [&pid] }).unwrap();
        assert_eq!(body, json!({ "pid": ["abc"] }));
    }
}
