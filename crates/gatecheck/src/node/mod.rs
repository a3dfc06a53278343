//! Node registry.
//!
//! Normalizes incoming node descriptions into fleet wire form and assigns each
//! a stable positional index into the original input list.

mod converter;

pub use converter::{NodeConverter, PassthroughConverter};

use serde_json::{Map, Value};
use tracing::debug;

/// A raw node description as supplied by the caller
pub type RawNode = Value;

/// An accepted node, ready to be leased and probed
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    /// Position in the original input list
    pub index: usize,

    /// Connection parameters in fleet wire form, plus the `_`-prefixed keys
    /// of the input (prior capability flags, internal metadata)
    pub wire: Map<String, Value>,
}

impl NodeDescriptor {
    /// Display name for logs
    pub fn name(&self) -> &str {
        self.wire.get("name").and_then(Value::as_str).unwrap_or("<unnamed>")
    }
}

/// Convert every node, dropping the ones the converter rejects.
///
/// Input order is preserved through `index`.
pub fn register(nodes: &[RawNode], converter: &dyn NodeConverter) -> Vec<NodeDescriptor> {
    nodes
        .iter()
        .enumerate()
        .filter_map(|(index, node)| match converter.convert(node) {
            Ok(mut wire) => {
                if let Some(object) = node.as_object() {
                    let carried = object.iter().filter(|(key, _)| key.starts_with('_'));
                    wire.extend(carried.map(|(k, v)| (k.clone(), v.clone())));
                }
                Some(NodeDescriptor { index, wire })
            }
            Err(e) => {
                debug!("Dropping node #{}: {}", index, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_preserves_index_and_drops_rejected() {
        let nodes = vec![
            json!({ "name": "a", "type": "ss", "server": "1.1.1.1", "port": 1 }),
            json!({ "name": "broken" }),
            json!({ "name": "c", "type": "vmess", "server": "3.3.3.3", "port": 3, "_gpt": true }),
        ];

        let accepted = register(&nodes, &PassthroughConverter);
        assert_eq!(accepted.len(), 2);
        assert_eq!(accepted[0].index, 0);
        assert_eq!(accepted[1].index, 2);
        assert_eq!(accepted[1].name(), "c");
        assert_eq!(accepted[1].wire.get("_gpt"), Some(&json!(true)));
    }

    #[test]
    fn test_register_empty() {
        assert!(register(&[json!(1), json!(null)], &PassthroughConverter).is_empty());
    }
}
