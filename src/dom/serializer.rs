use std::collections::HashSet;

use crate::dom::types::{DomNode, ElementTextMap, FlatSnapshot, NodeId};
use crate::dom::DEFAULT_INCLUDE_ATTRIBUTES;

/// Renders a [`FlatSnapshot`] as indented pseudo-HTML for the LLM prompt,
/// and builds the index→line [`ElementTextMap`] (spec §4.2).
pub struct TreeSerializer {
    allow_list_order: Vec<String>,
}

impl TreeSerializer {
    /// `extra_attributes` are unioned with the default allow-list, appended
    /// after it in the order given (spec §4.2 step 1).
    pub fn new(extra_attributes: &[String]) -> Self {
        let mut order: Vec<String> =
            DEFAULT_INCLUDE_ATTRIBUTES.iter().map(|s| s.to_string()).collect();
        for a in extra_attributes {
            if !order.contains(a) {
                order.push(a.clone());
            }
        }
        Self { allow_list_order: order }
    }

    pub fn render(&self, snapshot: &FlatSnapshot) -> (String, ElementTextMap) {
        let mut lines = Vec::new();
        let mut text_map = ElementTextMap::new();
        if snapshot.nodes.contains_key(&snapshot.root_id) {
            let root_id = snapshot.root_id.clone();
            self.walk(snapshot, &root_id, 0, false, &mut lines, &mut text_map);
        }
        (lines.join("\n"), text_map)
    }

    /// Returns folded text for the caller's own-line rendering when
    /// `inside_indexed` is true; the return value is meaningless otherwise.
    fn walk(
        &self,
        snapshot: &FlatSnapshot,
        id: &NodeId,
        depth: usize,
        inside_indexed: bool,
        lines: &mut Vec<String>,
        text_map: &mut ElementTextMap,
    ) -> String {
        let node = match snapshot.nodes.get(id) {
            Some(n) => n,
            None => return String::new(),
        };

        match node {
            DomNode::Text(t) => {
                if inside_indexed {
                    if t.visible {
                        t.text.clone()
                    } else {
                        String::new()
                    }
                } else {
                    if t.visible {
                        lines.push(format!("{}{}", "\t".repeat(depth), t.text));
                    }
                    String::new()
                }
            }
            DomNode::Element(e) => {
                let mut folded = String::new();
                for child in &e.child_ids {
                    let piece = self.walk(snapshot, child, depth, inside_indexed, lines, text_map);
                    if inside_indexed && !piece.is_empty() {
                        if !folded.is_empty() {
                            folded.push(' ');
                        }
                        folded.push_str(&piece);
                    }
                }
                folded
            }
            DomNode::Interactive(n) => {
                let mut folded = String::new();
                for child in &n.child_ids {
                    let piece = self.walk(snapshot, child, depth + 1, true, lines, text_map);
                    if !piece.is_empty() {
                        if !folded.is_empty() {
                            folded.push(' ');
                        }
                        folded.push_str(&piece);
                    }
                }

                let attrs = filtered_attrs(&n.tag, &n.attributes, &folded, &self.allow_list_order);
                let mut attr_str = attrs
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, v))
                    .collect::<Vec<_>>()
                    .join(" ");

                if let Some(si) = n.scroll_info {
                    if !si.is_zero() {
                        let mut sides = Vec::new();
                        if si.left != 0.0 {
                            sides.push(format!("left={}", si.left));
                        }
                        if si.top != 0.0 {
                            sides.push(format!("top={}", si.top));
                        }
                        if si.right != 0.0 {
                            sides.push(format!("right={}", si.right));
                        }
                        if si.bottom != 0.0 {
                            sides.push(format!("bottom={}", si.bottom));
                        }
                        if !attr_str.is_empty() {
                            attr_str.push(' ');
                        }
                        attr_str.push_str(&format!("data-scrollable=\"{}\"", sides.join(", ")));
                    }
                }

                let marker = if n.is_new { "*" } else { "" };
                let attrs_display = if attr_str.is_empty() {
                    String::new()
                } else {
                    format!(" {}", attr_str)
                };
                let line = format!(
                    "{indent}{marker}[{i}]<{tag}{attrs}>{text} />",
                    indent = "\t".repeat(depth),
                    marker = marker,
                    i = n.index,
                    tag = n.tag,
                    attrs = attrs_display,
                    text = folded,
                );
                text_map.insert(n.index, line.trim_start_matches('\t').trim_start_matches('*').to_string());
                lines.push(line);
                String::new()
            }
        }
    }
}

fn truncate20(v: &str) -> String {
    let mut chars = v.chars();
    let head: String = chars.by_ref().take(20).collect();
    if chars.next().is_some() {
        format!("{}…", head)
    } else {
        head
    }
}

fn filtered_attrs(
    tag: &str,
    raw: &std::collections::HashMap<String, String>,
    text: &str,
    order: &[String],
) -> Vec<(String, String)> {
    let mut seen_values: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let trimmed_text = text.trim();

    for name in order {
        let Some(raw_value) = raw.get(name) else { continue };
        let value = raw_value.trim();
        if value.is_empty() {
            continue;
        }
        if value.len() > 5 {
            if seen_values.contains(value) {
                continue;
            }
            seen_values.insert(value.to_string());
        }
        if name == "role" && value.eq_ignore_ascii_case(tag) {
            continue;
        }
        if matches!(name.as_str(), "aria-label" | "placeholder" | "title")
            && value.eq_ignore_ascii_case(trimmed_text)
        {
            continue;
        }
        out.push((name.clone(), truncate20(value)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::types::{ElementNode, HandleRef, InteractiveNode, TextNode};
    use std::collections::HashMap;

    fn snapshot_button_with_text() -> FlatSnapshot {
        let mut nodes = HashMap::new();
        nodes.insert(
            "root".to_string(),
            DomNode::Element(ElementNode {
                tag: "div".into(),
                attributes: HashMap::new(),
                child_ids: vec!["btn".into()],
                visible: true,
                topmost: true,
                in_viewport: true,
                scroll_info: None,
            }),
        );
        let mut attrs = HashMap::new();
        attrs.insert("role".to_string(), "button".to_string());
        attrs.insert("title".to_string(), "Go".to_string());
        nodes.insert(
            "btn".to_string(),
            DomNode::Interactive(InteractiveNode {
                tag: "button".into(),
                attributes: attrs,
                child_ids: vec!["txt".into()],
                visible: true,
                topmost: true,
                in_viewport: true,
                scroll_info: None,
                index: 0,
                handle: Some(HandleRef("h0".into())),
                is_new: false,
            }),
        );
        nodes.insert(
            "txt".to_string(),
            DomNode::Text(TextNode { text: "Go".into(), visible: true }),
        );
        FlatSnapshot { root_id: "root".into(), nodes, index_count: 1 }
    }

    #[test]
    fn drops_title_equal_to_text_and_role_equal_to_tag() {
        let snap = snapshot_button_with_text();
        let serializer = TreeSerializer::new(&[]);
        let (html, map) = serializer.render(&snap);
        assert!(html.contains("[0]<button>Go />"));
        assert!(!html.contains("title="));
        assert!(!html.contains("role="));
        assert_eq!(map.len(), 1);
        assert!(map[&0].contains("[0]<button>"));
    }

    #[test]
    fn truncates_long_values() {
        let long = "a".repeat(30);
        let mut attrs = HashMap::new();
        attrs.insert("value".to_string(), long.clone());
        let out = filtered_attrs("input", &attrs, "", &["value".to_string()]);
        assert_eq!(out[0].1, format!("{}…", "a".repeat(20)));
    }

    #[test]
    fn dedups_values_longer_than_five_chars() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), "shared-value".to_string());
        attrs.insert("value".to_string(), "shared-value".to_string());
        let order = vec!["name".to_string(), "value".to_string()];
        let out = filtered_attrs("input", &attrs, "", &order);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].0, "name");
    }
}
