//! Result aggregator - writes verdicts back onto the original node records.

use serde::Serialize;
use serde_json::Value;

use crate::config::TagPosition;
use crate::node::{NodeDescriptor, RawNode};
use crate::probe::{ProbeTarget, Verdict};

/// Verdict for one (node, target) task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeRecord {
    /// Index of the node in the original input list
    pub node: usize,
    /// Index of the target in the configured target list
    pub target: usize,
    pub verdict: Verdict,
    /// Served from the cache without probing
    pub cached: bool,
}

/// Apply every passing record to `nodes`. Returns the number of nodes changed.
///
/// Sets `_<flag>` and `_<flag>_latency`, then tags the display name with each
/// passing target's tag in target order, skipping tags already present.
pub fn apply(
    nodes: &mut [RawNode],
    descriptors: &[NodeDescriptor],
    targets: &[ProbeTarget],
    records: &[ProbeRecord],
    position: TagPosition,
) -> usize {
    let mut changed = 0;

    for descriptor in descriptors {
        let mut passed: Vec<(usize, &Verdict)> = records
            .iter()
            .filter(|record| record.node == descriptor.index && record.verdict.is_pass())
            .map(|record| (record.target, &record.verdict))
            .collect();
        if passed.is_empty() {
            continue;
        }
        passed.sort_by_key(|(target, _)| *target);
        passed.dedup_by_key(|(target, _)| *target);

        let Some(node) = nodes.get_mut(descriptor.index).and_then(Value::as_object_mut) else {
            continue;
        };

        let mut tags = Vec::new();
        for (target, verdict) in passed {
            let Some(target) = targets.get(target) else { continue };

            node.insert(format!("_{}", target.flag), Value::Bool(true));
            if let Some(latency) = verdict.latency_ms {
                node.insert(format!("_{}_latency", target.flag), Value::from(latency));
            }
            if !target.tag.is_empty() {
                tags.push(target.tag.as_str());
            }
        }

        if let Some(Value::String(name)) = node.get_mut("name") {
            *name = tag_name(name, &tags, position);
        }

        changed += 1;
    }

    changed
}

/// Insert every tag not already contained in `name`
fn tag_name(name: &str, tags: &[&str], position: TagPosition) -> String {
    let missing: Vec<&str> = tags.iter().copied().filter(|tag| !name.contains(tag.trim())).collect();
    if missing.is_empty() {
        return name.to_string();
    }

    match position {
        TagPosition::Prefix => format!("{}{}", missing.concat(), name),
        TagPosition::Suffix => {
            let suffix: Vec<&str> = missing.iter().map(|tag| tag.trim()).collect();
            format!("{} {}", name, suffix.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::VerdictKind;
    use serde_json::{Map, json};

    fn target(flag: &str, tag: &str) -> ProbeTarget {
        ProbeTarget {
            name: flag.into(),
            flag: flag.into(),
            tag: tag.into(),
            url: "https://example.com/".into(),
            method: "GET".into(),
            headers: Vec::new(),
            follow_redirects: false,
            retry_statuses: Vec::new(),
            rules: Vec::new(),
            verification: None,
        }
    }

    fn descriptor(index: usize) -> NodeDescriptor {
        NodeDescriptor { index, wire: Map::new() }
    }

    fn record(node: usize, target: usize, kind: VerdictKind, latency: u64) -> ProbeRecord {
        ProbeRecord { node, target, verdict: Verdict::new(kind, "", Some(latency)), cached: false }
    }

    #[test]
    fn test_apply_flags_latency_and_tags_in_target_order() {
        let mut nodes = vec![json!({ "name": "hk-01" }), json!({ "name": "jp-02" })];
        let targets = vec![target("gpt", "[GPT] "), target("gemini", "[GM] ")];
        let records = vec![
            record(0, 1, VerdictKind::StrongPass, 300),
            record(0, 0, VerdictKind::Pass, 120),
            record(1, 0, VerdictKind::Fail, 50),
            record(1, 1, VerdictKind::NetworkError, 0),
        ];

        let changed = apply(&mut nodes, &[descriptor(0), descriptor(1)], &targets, &records, TagPosition::Prefix);

        assert_eq!(changed, 1);
        assert_eq!(nodes[0]["name"], json!("[GPT] [GM] hk-01"));
        assert_eq!(nodes[0]["_gpt"], json!(true));
        assert_eq!(nodes[0]["_gpt_latency"], json!(120));
        assert_eq!(nodes[0]["_gemini_latency"], json!(300));
        assert_eq!(nodes[1], json!({ "name": "jp-02" }));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut nodes = vec![json!({ "name": "hk-01" })];
        let targets = vec![target("ld", "[LD] ")];
        let records = vec![record(0, 0, VerdictKind::Pass, 10)];

        apply(&mut nodes, &[descriptor(0)], &targets, &records, TagPosition::Prefix);
        apply(&mut nodes, &[descriptor(0)], &targets, &records, TagPosition::Prefix);
        assert_eq!(nodes[0]["name"], json!("[LD] hk-01"));
    }

    #[test]
    fn test_suffix_position() {
        assert_eq!(tag_name("hk-01", &["[GPT] ", "[GM] "], TagPosition::Suffix), "hk-01 [GPT] [GM]");
        assert_eq!(tag_name("hk-01 [GPT]", &["[GPT] "], TagPosition::Suffix), "hk-01 [GPT]");
    }
}
