//! On-disk form of a laid-out document.
//!
//! Files name tags instead of carrying registry codes, so the same file works
//! with any descriptor. Keys are optional; nodes without one get a fresh key
//! past the largest key the file declares.

use loom_core::{Attributes, BuiltinTag, LayoutNode, NodeKey, NodeKind, Rect, TagRegistry};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentNode {
    pub tag: String,
    #[serde(default)]
    pub key: Option<u64>,
    /// Overrides the kind the registry would pick.
    #[serde(default)]
    pub kind: Option<NodeKind>,
    #[serde(default)]
    pub attrs: Attributes,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub children: Vec<DocumentNode>,
}

impl DocumentNode {
    /// # Errors
    /// The `serde_json` error for malformed documents.
    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Intern every tag name and build the tree the materializer walks.
    ///
    /// The root keeps [`NodeKey::ROOT`] unless it declares a key.
    pub fn into_layout(self, registry: &mut TagRegistry) -> LayoutNode {
        let mut next_key = self.max_key() + 1;
        let root_key = self.key.map_or(NodeKey::ROOT, NodeKey);
        self.convert(registry, root_key, &mut next_key)
    }

    fn max_key(&self) -> u64 {
        self.children
            .iter()
            .map(Self::max_key)
            .fold(self.key.unwrap_or_default(), u64::max)
    }

    fn convert(self, registry: &mut TagRegistry, key: NodeKey, next_key: &mut u64) -> LayoutNode {
        let code = registry.resolve_code(&self.tag.to_ascii_lowercase());
        let kind = self.kind.unwrap_or_else(|| {
            BuiltinTag::from_code(code).map_or(NodeKind::Unresolved, BuiltinTag::kind)
        });
        let mut node = LayoutNode::new(key, code, kind)
            .with_attrs(self.attrs)
            .with_rect(self.rect);
        for child in self.children {
            let child_key = child.key.map_or_else(
                || {
                    let fresh = *next_key;
                    *next_key += 1;
                    NodeKey(fresh)
                },
                NodeKey,
            );
            node.children.push(child.convert(registry, child_key, next_key));
        }
        node
    }
}
