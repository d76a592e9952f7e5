use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Opaque, per-snapshot-unique node id assigned by the extractor in
/// post-order (spec §3, §4.1 step 4).
pub type NodeId = String;

/// Opaque reference to a live element, recovered by the controller from
/// the marker attribute the extractor stamped during the walk (spec §4.1,
/// §9 "two-phase handle recovery"). What the string actually encodes is up
/// to the [`crate::dom::page::Page`] adapter; the core never inspects it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HandleRef(pub String);

/// Non-zero-overflow scroll container info (spec §4.1 step 2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollInfo {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl ScrollInfo {
    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.top == 0.0 && self.right == 0.0 && self.bottom == 0.0
    }
}

#[derive(Debug, Clone)]
pub struct TextNode {
    pub text: String,
    pub visible: bool,
}

#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub child_ids: Vec<NodeId>,
    pub visible: bool,
    pub topmost: bool,
    pub in_viewport: bool,
    pub scroll_info: Option<ScrollInfo>,
}

#[derive(Debug, Clone)]
pub struct InteractiveNode {
    pub tag: String,
    pub attributes: HashMap<String, String>,
    pub child_ids: Vec<NodeId>,
    pub visible: bool,
    pub topmost: bool,
    pub in_viewport: bool,
    pub scroll_info: Option<ScrollInfo>,
    /// Assigned monotonically in DOM order during the extraction pass.
    pub index: u32,
    /// Filled in by `PageController::refresh` during the handle-recovery
    /// phase; `None` only between extraction and that phase.
    pub handle: Option<HandleRef>,
    /// Whether this element's (tag, filtered attributes, folded text) hash
    /// is new relative to the previous snapshot (spec §9 "isNew").
    pub is_new: bool,
}

/// One node of a [`FlatSnapshot`] (spec §3).
#[derive(Debug, Clone)]
pub enum DomNode {
    Text(TextNode),
    Element(ElementNode),
    Interactive(InteractiveNode),
}

impl DomNode {
    pub fn child_ids(&self) -> &[NodeId] {
        match self {
            DomNode::Text(_) => &[],
            DomNode::Element(e) => &e.child_ids,
            DomNode::Interactive(i) => &i.child_ids,
        }
    }

    pub fn is_visible(&self) -> bool {
        match self {
            DomNode::Text(t) => t.visible,
            DomNode::Element(e) => e.visible,
            DomNode::Interactive(i) => i.visible,
        }
    }

    pub fn is_topmost(&self) -> bool {
        match self {
            DomNode::Text(_) => false,
            DomNode::Element(e) => e.topmost,
            DomNode::Interactive(i) => i.topmost,
        }
    }

    pub fn as_interactive(&self) -> Option<&InteractiveNode> {
        match self {
            DomNode::Interactive(i) => Some(i),
            _ => None,
        }
    }
}

/// An immutable description of a page at one instant (spec §3). Produced
/// by `PageController::refresh`; discarded whole at the next refresh.
#[derive(Debug, Clone)]
pub struct FlatSnapshot {
    pub root_id: NodeId,
    pub nodes: HashMap<NodeId, DomNode>,
    /// Number of indices assigned in this pass; indices form `[0, index_count)`.
    pub index_count: u32,
}

impl FlatSnapshot {
    pub fn root(&self) -> Option<&DomNode> {
        self.nodes.get(&self.root_id)
    }

    /// All interactive nodes, ordered by index.
    pub fn interactive_nodes(&self) -> Vec<&InteractiveNode> {
        let mut v: Vec<&InteractiveNode> =
            self.nodes.values().filter_map(DomNode::as_interactive).collect();
        v.sort_by_key(|n| n.index);
        v
    }
}

/// Mapping index → InteractiveNode for the current snapshot (spec §3).
pub type SelectorMap = HashMap<u32, InteractiveNode>;

/// Mapping index → the rendered pseudo-HTML line for that element, used
/// for friendly element names in action result messages (spec §3).
pub type ElementTextMap = HashMap<u32, String>;
