//! Laid-out tree handed over by the external layout stage.
//!
//! The layout stage owns positions and sizes; this crate only consumes them.
//! Attributes arrive as a closed, already validated struct so nothing
//! downstream re-parses markup strings.

use crate::error::{Error, Result};
use crate::tags::{NodeKind, TagCode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Stable identifier of a layout node, used for instance-cache keying.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

impl NodeKey {
    /// The document root.
    pub const ROOT: Self = Self(0);
}

/// Computed position and size in the parent's coordinate space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Zero (or negative) area.
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Markup attributes the materializer understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attributes {
    /// `Some` when the markup declared `hidden`, whatever its value.
    pub hidden: Option<bool>,
    /// Id of the node whose taps toggle this node's visibility.
    pub listen: Option<String>,
    pub href: Option<String>,
    pub src: Option<String>,
    pub button: bool,
    pub id: Option<String>,
    /// Text content of a text run.
    pub text: Option<String>,
}

impl Attributes {
    /// Build from raw markup pairs, validating boolean attributes.
    ///
    /// Unrecognized names are ignored.
    ///
    /// # Errors
    /// `InvalidAttribute` when `hidden` or `button` is not `true`/`false`.
    pub fn from_pairs<'pairs, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'pairs str, &'pairs str)>,
    {
        let mut attrs = Self::default();
        for (name, value) in pairs {
            match name {
                "hidden" => attrs.hidden = Some(parse_flag(name, value)?),
                "button" => attrs.button = parse_flag(name, value)?,
                "listen" => attrs.listen = Some(value.to_owned()),
                "href" => attrs.href = Some(value.to_owned()),
                "src" => attrs.src = Some(value.to_owned()),
                "id" => attrs.id = Some(value.to_owned()),
                "_content" => attrs.text = Some(value.to_owned()),
                _ => {}
            }
        }
        Ok(attrs)
    }

    #[inline]
    pub fn is_hidden(&self) -> bool {
        self.hidden == Some(true)
    }

    /// Whether the node takes part in cascading visibility: it names a listen
    /// target and declares `hidden`.
    pub fn listen_target(&self) -> Option<&str> {
        self.hidden.and(self.listen.as_deref())
    }

    /// Id used for interaction lookups; empty when the markup gave none.
    pub fn element_id(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }

    pub fn src(&self) -> &str {
        self.src.as_deref().unwrap_or_default()
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(Error::InvalidAttribute {
            name: name.to_owned(),
            value: value.to_owned(),
        }),
    }
}

/// One node of the laid-out tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub key: NodeKey,
    pub tag: TagCode,
    pub kind: NodeKind,
    #[serde(default)]
    pub attrs: Attributes,
    #[serde(default)]
    pub rect: Rect,
    #[serde(default)]
    pub children: Vec<LayoutNode>,
}

impl LayoutNode {
    pub fn new(key: NodeKey, tag: TagCode, kind: NodeKind) -> Self {
        Self {
            key,
            tag,
            kind,
            attrs: Attributes::default(),
            rect: Rect::default(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    #[must_use]
    pub const fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Whether the materializer skips this node and its whole subtree.
    pub fn is_skipped(&self) -> bool {
        self.attrs.is_hidden() || self.kind == NodeKind::ContentLineBreak
    }

    /// Depth-first search for a node by key.
    pub fn find_mut(&mut self, key: NodeKey) -> Option<&mut Self> {
        if self.key == key {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_mut(key))
    }

    pub fn find(&self, key: NodeKey) -> Option<&Self> {
        if self.key == key {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(key))
    }

    /// Keys a materialization pass will visit below this node.
    ///
    /// Hidden and line-break subtrees are not entered. The node itself is the
    /// attachment point and is not included.
    pub fn visible_keys(&self) -> HashSet<NodeKey> {
        let mut keys = HashSet::new();
        let mut stack: Vec<&Self> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            if node.is_skipped() {
                continue;
            }
            keys.insert(node.key);
            stack.extend(node.children.iter());
        }
        keys
    }
}
