//! The produced tree of visual nodes handed to the rendering collaborator.
//!
//! Nodes live in one arena for the whole document session. Two roots exist: the
//! attachment root, which is what renders, and a parking root, which holds
//! instances taken out of the visible tree but kept for reuse.

use core::fmt::Write as _;
use indextree::{Arena, NodeId};
use log::warn;
use loom_core::{NodeKey, NodeKind, Rect};
use loom_resources::{Image, Template};
use std::rc::Rc;

/// Handle of a node in the [`VisualTree`].
pub type VisualId = NodeId;

/// Tap handler of a button node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonBinding {
    pub id: String,
    pub src: String,
}

/// Tap handler of a link node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkBinding {
    pub id: String,
    pub href: String,
}

/// One attached, positioned, renderable unit.
#[derive(Debug, Clone)]
pub struct VisualNode {
    pub name: String,
    pub kind: NodeKind,
    /// Layout node this instance was materialized for.
    pub key: Option<NodeKey>,
    pub rect: Rect,
    pub template: Option<Rc<Template>>,
    pub text: Option<String>,
    /// How many times text content was assigned.
    pub text_assignments: u32,
    pub image: Option<Rc<Image>>,
    pub button: Option<ButtonBinding>,
    pub link: Option<LinkBinding>,
}

impl VisualNode {
    /// Bare structural node, no template behind it.
    pub fn structural(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            key: None,
            rect: Rect::default(),
            template: None,
            text: None,
            text_assignments: 0,
            image: None,
            button: None,
            link: None,
        }
    }

    /// Fresh instance of a template. Placeholder templates keep their
    /// diagnostic name.
    pub fn from_template(name: &str, kind: NodeKind, template: Rc<Template>) -> Self {
        let name = if template.is_placeholder() {
            template.name().to_owned()
        } else {
            name.to_owned()
        };
        Self {
            template: Some(template),
            ..Self::structural(name, kind)
        }
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = Some(text.to_owned());
        self.text_assignments += 1;
    }

    pub fn is_placeholder(&self) -> bool {
        self.template
            .as_ref()
            .is_some_and(|template| template.is_placeholder())
    }
}

#[derive(Debug)]
pub struct VisualTree {
    arena: Arena<VisualNode>,
    root: VisualId,
    parking: VisualId,
}

impl Default for VisualTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualTree {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(VisualNode::structural("root", NodeKind::Container));
        let parking = arena.new_node(VisualNode::structural("parking", NodeKind::Container));
        Self {
            arena,
            root,
            parking,
        }
    }

    #[inline]
    pub const fn root(&self) -> VisualId {
        self.root
    }

    #[inline]
    pub const fn parking(&self) -> VisualId {
        self.parking
    }

    /// Add a detached node.
    pub fn create(&mut self, node: VisualNode) -> VisualId {
        self.arena.new_node(node)
    }

    pub fn get(&self, id: VisualId) -> Option<&VisualNode> {
        self.arena.get(id).map(|node| node.get())
    }

    pub fn get_mut(&mut self, id: VisualId) -> Option<&mut VisualNode> {
        self.arena.get_mut(id).map(|node| node.get_mut())
    }

    pub fn parent(&self, id: VisualId) -> Option<VisualId> {
        self.arena.get(id).and_then(|node| node.parent())
    }

    /// Move `id` (with its subtree) to the end of `parent`'s children.
    pub fn attach(&mut self, id: VisualId, parent: VisualId) {
        id.detach(&mut self.arena);
        if let Err(err) = parent.checked_append(id, &mut self.arena) {
            warn!("could not attach visual node {id:?} under {parent:?}: {err:?}");
        }
    }

    /// Move `id` under the parking root.
    pub fn park(&mut self, id: VisualId) {
        if id != self.root && id != self.parking {
            self.attach(id, self.parking);
        }
    }

    /// Free `id` and its subtree. Stale handles resolve to nothing afterwards.
    pub fn remove(&mut self, id: VisualId) {
        if id != self.root && id != self.parking {
            id.remove_subtree(&mut self.arena);
        }
    }

    /// Nodes still held by the arena, both roots included.
    pub fn live_count(&self) -> usize {
        self.arena.iter().filter(|node| !node.is_removed()).count()
    }

    pub fn is_parked(&self, id: VisualId) -> bool {
        self.parent(id) == Some(self.parking)
    }

    /// Whether `id` is reachable from the attachment root.
    pub fn is_attached(&self, id: VisualId) -> bool {
        id.ancestors(&self.arena).any(|ancestor| ancestor == self.root)
    }

    pub fn children(&self, id: VisualId) -> Vec<VisualId> {
        id.children(&self.arena).collect()
    }

    /// Nodes reachable from the attachment root, the root itself excluded.
    pub fn attached(&self) -> Vec<VisualId> {
        self.root.descendants(&self.arena).skip(1).collect()
    }

    pub fn attached_count(&self) -> usize {
        self.root.descendants(&self.arena).skip(1).count()
    }

    /// Attached nodes materialized for `key`.
    pub fn find_by_key(&self, key: NodeKey) -> Option<VisualId> {
        self.root
            .descendants(&self.arena)
            .find(|id| self.get(*id).is_some_and(|node| node.key == Some(key)))
    }

    /// Indented outline of the attached tree, one node per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        self.outline_into(self.root, 0, &mut out);
        out
    }

    fn outline_into(&self, id: VisualId, depth: usize, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        let rect = node.rect;
        let _written = write!(
            out,
            "{:indent$}{} {:?} @ ({}, {}) {}x{}",
            "",
            node.name,
            node.kind,
            rect.x,
            rect.y,
            rect.width,
            rect.height,
            indent = depth * 2
        );
        if let Some(text) = &node.text {
            let _written = write!(out, " text={text:?}");
        }
        if let Some(image) = &node.image {
            let _written = write!(out, " image={}x{}", image.width(), image.height());
        }
        out.push('\n');
        for child in self.children(id) {
            self.outline_into(child, depth + 1, out);
        }
    }
}
