use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use serde_json::Value;

use crate::dom::page::{render_walk_script, Page};
use crate::dom::types::{
    DomNode, ElementNode, FlatSnapshot, InteractiveNode, NodeId, ScrollInfo, TextNode,
};
use crate::dom::DEFAULT_INCLUDE_ATTRIBUTES;

/// Runs the in-page DOM walk (spec §4.1) and turns its JSON payload into a
/// [`FlatSnapshot`]. Stateful only in the hash set it keeps to compute
/// `isNew` across snapshots (spec §9); everything else is a pure function
/// of the page at call time.
pub struct DomExtractor {
    namespace: String,
    previous_hashes: HashSet<u64>,
}

impl DomExtractor {
    /// `namespace` must be unique to this agent instance; it becomes the
    /// `data-<ns>-index` marker attribute (spec §6).
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            previous_hashes: HashSet::new(),
        }
    }

    pub async fn extract(
        &mut self,
        page: &dyn Page,
        viewport_expansion: i64,
    ) -> anyhow::Result<FlatSnapshot> {
        let script = render_walk_script(&self.namespace, viewport_expansion);
        let raw = page.evaluate_json(&script).await?;
        let mut snapshot = parse_snapshot(&raw)?;
        self.annotate_is_new(&mut snapshot);
        Ok(snapshot)
    }

    fn annotate_is_new(&mut self, snapshot: &mut FlatSnapshot) {
        let mut current_hashes = HashSet::new();
        let mut updates = Vec::new();
        for (id, node) in snapshot.nodes.iter() {
            if let DomNode::Interactive(n) = node {
                let h = interactive_hash(n);
                current_hashes.insert(h);
                updates.push((id.clone(), !self.previous_hashes.contains(&h)));
            }
        }
        for (id, is_new) in updates {
            if let Some(DomNode::Interactive(n)) = snapshot.nodes.get_mut(&id) {
                n.is_new = is_new;
            }
        }
        self.previous_hashes = current_hashes;
    }
}

fn interactive_hash(node: &InteractiveNode) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    node.tag.hash(&mut hasher);
    let mut kept: Vec<(&str, &str)> = node
        .attributes
        .iter()
        .filter(|(k, _)| DEFAULT_INCLUDE_ATTRIBUTES.contains(&k.as_str()))
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    kept.sort_unstable();
    kept.hash(&mut hasher);
    hasher.finish()
}

/// Per-node parsing is best-effort: a malformed node record is skipped
/// rather than aborting the whole extraction (spec §4.1 "extraction must
/// be total").
fn parse_snapshot(raw: &Value) -> anyhow::Result<FlatSnapshot> {
    let root_id = raw
        .get("rootId")
        .and_then(Value::as_str)
        .unwrap_or("e0")
        .to_string();
    let index_count = raw.get("indexCount").and_then(Value::as_u64).unwrap_or(0) as u32;
    let nodes_obj = raw
        .get("nodes")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow::anyhow!("extractor payload missing 'nodes' object"))?;

    let mut nodes: HashMap<NodeId, DomNode> = HashMap::with_capacity(nodes_obj.len());
    for (id, v) in nodes_obj {
        if let Some(node) = parse_node(v) {
            nodes.insert(id.clone(), node);
        }
    }

    Ok(FlatSnapshot {
        root_id,
        nodes,
        index_count,
    })
}

fn parse_node(v: &Value) -> Option<DomNode> {
    let kind = v.get("kind").and_then(Value::as_str)?;
    match kind {
        "text" => Some(DomNode::Text(TextNode {
            text: v.get("text").and_then(Value::as_str)?.to_string(),
            visible: v.get("visible").and_then(Value::as_bool).unwrap_or(false),
        })),
        "element" => Some(DomNode::Element(ElementNode {
            tag: v.get("tag").and_then(Value::as_str)?.to_string(),
            attributes: parse_attrs(v),
            child_ids: parse_child_ids(v),
            visible: v.get("visible").and_then(Value::as_bool).unwrap_or(false),
            topmost: v.get("topmost").and_then(Value::as_bool).unwrap_or(false),
            in_viewport: v.get("inViewport").and_then(Value::as_bool).unwrap_or(false),
            scroll_info: parse_scroll_info(v),
        })),
        "interactive" => Some(DomNode::Interactive(InteractiveNode {
            tag: v.get("tag").and_then(Value::as_str)?.to_string(),
            attributes: parse_attrs(v),
            child_ids: parse_child_ids(v),
            visible: v.get("visible").and_then(Value::as_bool).unwrap_or(false),
            topmost: v.get("topmost").and_then(Value::as_bool).unwrap_or(false),
            in_viewport: v.get("inViewport").and_then(Value::as_bool).unwrap_or(false),
            scroll_info: parse_scroll_info(v),
            index: v.get("index").and_then(Value::as_u64)? as u32,
            handle: None,
            is_new: false,
        })),
        _ => None,
    }
}

fn parse_attrs(v: &Value) -> HashMap<String, String> {
    v.get("attributes")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_child_ids(v: &Value) -> Vec<NodeId> {
    v.get("childIds")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect())
        .unwrap_or_default()
}

fn parse_scroll_info(v: &Value) -> Option<ScrollInfo> {
    let s = v.get("scrollInfo")?;
    if s.is_null() {
        return None;
    }
    Some(ScrollInfo {
        left: s.get("left").and_then(Value::as_f64).unwrap_or(0.0),
        top: s.get("top").and_then(Value::as_f64).unwrap_or(0.0),
        right: s.get("right").and_then(Value::as_f64).unwrap_or(0.0),
        bottom: s.get("bottom").and_then(Value::as_f64).unwrap_or(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_mixed_node_kinds() {
        let raw = json!({
            "rootId": "e0",
            "indexCount": 1,
            "nodes": {
                "e0": {
                    "kind": "element",
                    "tag": "div",
                    "attributes": {},
                    "childIds": ["e1", "t0"],
                    "visible": true,
                    "topmost": true,
                    "inViewport": true,
                    "scrollInfo": null
                },
                "e1": {
                    "kind": "interactive",
                    "tag": "button",
                    "attributes": {"role": "button"},
                    "childIds": [],
                    "visible": true,
                    "topmost": true,
                    "inViewport": true,
                    "scrollInfo": null,
                    "index": 0
                },
                "t0": {
                    "kind": "text",
                    "text": "hello",
                    "visible": true
                }
            }
        });

        let snapshot = parse_snapshot(&raw).unwrap();
        assert_eq!(snapshot.root_id, "e0");
        assert_eq!(snapshot.index_count, 1);
        assert_eq!(snapshot.nodes.len(), 3);
        assert!(matches!(snapshot.nodes["e1"], DomNode::Interactive(_)));
        assert_eq!(snapshot.interactive_nodes().len(), 1);
    }

    #[test]
    fn skips_malformed_nodes() {
        let raw = json!({
            "rootId": "e0",
            "indexCount": 0,
            "nodes": {
                "e0": { "kind": "element", "tag": "div" },
                "bad": { "kind": "interactive" }
            }
        });
        let snapshot = parse_snapshot(&raw).unwrap();
        assert_eq!(snapshot.nodes.len(), 1);
    }
}
