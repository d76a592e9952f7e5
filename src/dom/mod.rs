pub mod extractor;
pub mod page;
pub mod serializer;
pub mod types;

pub use extractor::DomExtractor;
pub use page::{Page, PageInfo};
pub use serializer::TreeSerializer;
pub use types::{
    DomNode, ElementNode, ElementTextMap, FlatSnapshot, HandleRef, InteractiveNode, NodeId,
    ScrollInfo, SelectorMap, TextNode,
};

/// Default attribute allow-list for serialization and `isNew` hashing
/// (spec §4.2 step 1). Callers may extend, never shrink, this set.
pub const DEFAULT_INCLUDE_ATTRIBUTES: &[&str] = &[
    "title",
    "type",
    "checked",
    "name",
    "role",
    "value",
    "placeholder",
    "data-date-format",
    "alt",
    "aria-label",
    "aria-expanded",
    "data-state",
    "aria-checked",
    "id",
    "for",
    "target",
    "aria-haspopup",
    "aria-controls",
    "aria-owns",
];
