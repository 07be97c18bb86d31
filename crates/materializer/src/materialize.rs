//! Materialization passes: walk a laid-out tree and produce visual nodes.
//!
//! A pass fans out one task per root child and steps them round-robin. Below
//! the root every node finishes its subtree before the next sibling starts, so
//! siblings under one parent materialize strictly in document order. Images are
//! fetched by detached tasks and may land after the pass completes.
//!
//! Shared state sits behind `RefCell`s; no borrow is held across an `.await`.

use crate::instance_cache::NodeInstanceCache;
use crate::interaction::{InteractiveMap, ListenerRegistry};
use crate::visual::{ButtonBinding, LinkBinding, VisualId, VisualNode, VisualTree};
use core::cell::RefCell;
use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use log::{debug, error, trace, warn};
use loom_core::{Error, KindHint, LayoutNode, NodeKind, Result, TagRegistry};
use loom_resources::{ResourceServices, RoundRobin};
use std::rc::Rc;
use tracing::Instrument as _;
use tracing::info_span;

/// Mutable state of one document session.
#[derive(Debug, Default)]
pub struct ViewState {
    pub tree: VisualTree,
    pub instances: NodeInstanceCache,
    pub listeners: ListenerRegistry,
    pub interactive: InteractiveMap,
}

/// What a fresh instance of a node is built from.
struct Blueprint {
    name: String,
    kind: NodeKind,
    /// Template URI, `None` for bare structural nodes.
    source: Option<String>,
}

/// Runs passes for one document. Clones share the document's state.
#[derive(Clone)]
pub struct Materializer {
    services: ResourceServices,
    registry: Rc<RefCell<TagRegistry>>,
    state: Rc<RefCell<ViewState>>,
}

impl Materializer {
    pub const fn new(
        services: ResourceServices,
        registry: Rc<RefCell<TagRegistry>>,
        state: Rc<RefCell<ViewState>>,
    ) -> Self {
        Self {
            services,
            registry,
            state,
        }
    }

    /// Materialize the children of `root` under `attach`.
    ///
    /// Resolves to the number of nodes visited once the structural walk is
    /// done. Every root task runs to its end even when a sibling fails.
    ///
    /// # Errors
    /// The first fatal error any root-level subtree hit; that subtree stops
    /// descending at the failing node.
    pub fn run_pass(
        &self,
        root: Rc<LayoutNode>,
        attach: VisualId,
        pass: u64,
    ) -> LocalBoxFuture<'static, Result<usize>> {
        let this = self.clone();
        async move {
            debug!("pass {pass} starting with {} root children", root.children.len());
            let tasks = root
                .children
                .iter()
                .map(|child| this.materialize_recursive(child, attach));
            let outcomes = RoundRobin::new(tasks).await;
            this.restore_root_order(&root, attach);
            let mut nodes = 0;
            for outcome in outcomes {
                nodes += outcome?;
            }
            Ok(nodes)
        }
        .instrument(info_span!("materialize", pass))
        .boxed_local()
    }

    fn materialize_recursive<'tree>(
        &self,
        node: &'tree LayoutNode,
        parent: VisualId,
    ) -> LocalBoxFuture<'tree, Result<usize>> {
        let this = self.clone();
        async move {
            if let Some(target) = node.attrs.listen_target() {
                this.state.borrow_mut().listeners.register(target, node.key);
            }
            if node.is_skipped() {
                trace!("node {} skipped", node.key.0);
                return Ok(0);
            }

            let cached = this.state.borrow().instances.get(node.key);
            let (visual, reused) = match cached {
                Some(visual) => (visual, true),
                None => {
                    let fresh = this.instantiate(node).await?;
                    this.claim(node, fresh)
                }
            };
            this.apply(node, visual, parent);
            if !reused {
                this.spawn_image(node, visual);
            }

            let mut nodes = 1;
            for child in &node.children {
                nodes += this.materialize_recursive(child, visual).await?;
            }
            Ok(nodes)
        }
        .boxed_local()
    }

    async fn instantiate(&self, node: &LayoutNode) -> Result<VisualId> {
        let blueprint = self.blueprint(node)?;
        let mut visual = match blueprint.source {
            None => VisualNode::structural(blueprint.name, blueprint.kind),
            Some(source) => {
                let template = self.services.templates.load(&source).await?;
                VisualNode::from_template(&blueprint.name, blueprint.kind, template)
            }
        };
        visual.key = Some(node.key);
        Ok(self.state.borrow_mut().tree.create(visual))
    }

    /// Record `fresh` as the node's instance unless an overlapping pass
    /// recorded one while this pass awaited its template. The loser is freed.
    fn claim(&self, node: &LayoutNode, fresh: VisualId) -> (VisualId, bool) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if let Some(existing) = state.instances.get(node.key) {
            trace!("node {} already instantiated by another pass", node.key.0);
            state.tree.remove(fresh);
            return (existing, true);
        }
        state.instances.insert(node.key, fresh);
        (fresh, false)
    }

    fn blueprint(&self, node: &LayoutNode) -> Result<Blueprint> {
        let registry = self.registry.borrow();
        let name = registry.resolve_name(node.tag)?.to_owned();
        let kind = if node.kind == NodeKind::Unresolved {
            let hint = if node.attrs.text.is_some() {
                KindHint::Text
            } else {
                KindHint::Element
            };
            registry.kind_of(node.tag, hint)?
        } else {
            node.kind
        };
        let source = match kind {
            NodeKind::Container | NodeKind::CustomBox | NodeKind::ContentLineBreak => None,
            NodeKind::ContentImage | NodeKind::ContentText if registry.is_builtin(node.tag) => {
                Some(self.services.config.builtin_template_path(&name))
            }
            NodeKind::ContentImage
            | NodeKind::ContentText
            | NodeKind::CustomLayer
            | NodeKind::CustomEmptyLayer => Some(registry.load_path(node.tag, kind)?.to_owned()),
            NodeKind::Unresolved => return Err(Error::UnresolvedNode(node.key.0)),
        };
        Ok(Blueprint { name, kind, source })
    }

    /// Attach, position, and (re)bind content and handlers.
    fn apply(&self, node: &LayoutNode, visual: VisualId, parent: VisualId) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.tree.attach(visual, parent);
        state.instances.insert(node.key, visual);

        // A button's src wins over its href.
        let id = node.attrs.element_id();
        if node.attrs.button && !id.is_empty() {
            state.interactive.insert(id, visual, node.attrs.src());
        } else if let Some(href) = &node.attrs.href {
            state.interactive.insert(id, visual, href);
        }

        let Some(instance) = state.tree.get_mut(visual) else {
            return;
        };
        instance.rect = node.rect;
        if instance.kind == NodeKind::ContentText {
            instance.set_text(node.attrs.text.as_deref().unwrap_or_default());
        }
        instance.link = node.attrs.href.as_ref().map(|href| LinkBinding {
            id: id.to_owned(),
            href: href.clone(),
        });
        instance.button = node.attrs.button.then(|| ButtonBinding {
            id: id.to_owned(),
            src: node.attrs.src().to_owned(),
        });
    }

    /// Start the image fetch for a fresh image node without blocking the walk.
    fn spawn_image(&self, node: &LayoutNode, visual: VisualId) {
        let is_image = self
            .state
            .borrow()
            .tree
            .get(visual)
            .is_some_and(|instance| instance.kind == NodeKind::ContentImage);
        let src = node.attrs.src();
        if !is_image || src.is_empty() || node.rect.is_empty() {
            return;
        }
        let fetch = self.services.images.get_image(src);
        let state = Rc::clone(&self.state);
        let src = src.to_owned();
        self.services.spawner.spawn(async move {
            match fetch.await {
                Ok(image) => {
                    let mut state = state.borrow_mut();
                    if let Some(instance) = state.tree.get_mut(visual) {
                        instance.image = Some(image);
                    }
                }
                Err(err) if err.is_fatal() => error!("image `{src}` rejected: {err}"),
                Err(err) => warn!("node left without image `{src}`: {err}"),
            }
        });
    }

    /// Root tasks interleave, so put root-level instances back in document order.
    fn restore_root_order(&self, root: &LayoutNode, attach: VisualId) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        for child in &root.children {
            if child.is_skipped() {
                continue;
            }
            if let Some(visual) = state.instances.get(child.key) {
                if state.tree.parent(visual) == Some(attach) {
                    state.tree.attach(visual, attach);
                }
            }
        }
    }
}
