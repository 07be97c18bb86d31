//! A document view: the entry point the rendering collaborator drives.

use crate::interaction::{Interactive, ViewEvent};
use crate::materialize::{Materializer, ViewState};
use crate::visual::{VisualId, VisualTree};
use core::cell::{Ref, RefCell};
use futures::future::LocalBoxFuture;
use log::{debug, error, info, trace, warn};
use loom_core::{LayoutNode, NodeKey, Result, TagRegistry};
use loom_resources::ResourceServices;
use std::collections::HashSet;
use std::rc::Rc;
use tokio::sync::mpsc::UnboundedSender;

/// Recomputes positions after cascading visibility changed the tree.
pub trait Relayout {
    /// # Errors
    /// Whatever the layout stage reports; the tap that triggered it fails.
    fn relayout(&mut self, root: &mut LayoutNode) -> Result<()>;
}

/// Leaves positions as they are.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepLayout;

impl Relayout for KeepLayout {
    fn relayout(&mut self, _root: &mut LayoutNode) -> Result<()> {
        Ok(())
    }
}

/// One document session.
///
/// Resource caches are shared with every other view built from the same
/// [`ResourceServices`]; the tag registry, instance cache and listeners belong
/// to this view alone.
pub struct DocumentView {
    services: ResourceServices,
    registry: Rc<RefCell<TagRegistry>>,
    state: Rc<RefCell<ViewState>>,
    materializer: Materializer,
    layout: Option<Rc<LayoutNode>>,
    relayout: Box<dyn Relayout>,
    events: UnboundedSender<ViewEvent>,
    passes: u64,
}

impl DocumentView {
    pub fn new(services: ResourceServices, events: UnboundedSender<ViewEvent>) -> Self {
        let registry = Rc::new(RefCell::new(TagRegistry::new()));
        let state = Rc::new(RefCell::new(ViewState::default()));
        let materializer =
            Materializer::new(services.clone(), Rc::clone(&registry), Rc::clone(&state));
        Self {
            services,
            registry,
            state,
            materializer,
            layout: None,
            relayout: Box::new(KeepLayout),
            events,
            passes: 0,
        }
    }

    #[must_use]
    pub fn with_relayout(mut self, relayout: impl Relayout + 'static) -> Self {
        self.relayout = Box::new(relayout);
        self
    }

    /// Tag registry of this document; the parser interns custom tags here.
    pub fn registry(&self) -> Rc<RefCell<TagRegistry>> {
        Rc::clone(&self.registry)
    }

    /// Load the document's custom tag descriptor.
    ///
    /// # Errors
    /// See [`loom_resources::DescriptorLoader::load`]. A second request fails
    /// with `MultipleDescriptors`.
    pub fn load_descriptor(&self, uri: &str) -> LocalBoxFuture<'static, Result<()>> {
        info!("loading custom tag descriptor `{uri}`");
        self.services.descriptors.load(uri, &self.registry)
    }

    /// Download document markup for the parser; web URLs only.
    ///
    /// # Errors
    /// See [`loom_resources::DocumentDownloader::download_document`].
    pub fn download_document(&self, url: &str) -> LocalBoxFuture<'static, Result<String>> {
        info!("downloading document {url}");
        self.services.documents.download_document(url)
    }

    /// Replace the laid-out tree the next pass walks.
    pub fn set_tree(&mut self, root: LayoutNode) {
        debug!("layout tree set, root {}", root.key.0);
        self.layout = Some(Rc::new(root));
    }

    pub fn layout(&self) -> Option<&LayoutNode> {
        self.layout.as_deref()
    }

    /// Start a materialization pass on the scheduler.
    ///
    /// Completion is reported as [`ViewEvent::Materialized`] or
    /// [`ViewEvent::MaterializeFailed`]. Returns the pass number, or `None`
    /// when no tree has been set.
    pub fn materialize(&mut self) -> Option<u64> {
        let Some(root) = self.layout.clone() else {
            warn!("materialize requested before a layout tree was set");
            return None;
        };
        self.passes += 1;
        let pass = self.passes;
        let attach = self.state.borrow().tree.root();
        let run = self.materializer.run_pass(root, attach, pass);
        let events = self.events.clone();
        self.services.spawner.spawn(async move {
            let event = match run.await {
                Ok(nodes) => {
                    info!("pass {pass} materialized {nodes} nodes");
                    ViewEvent::Materialized { pass, nodes }
                }
                Err(error) => {
                    error!("pass {pass} failed: {error}");
                    ViewEvent::MaterializeFailed { pass, error }
                }
            };
            if events.send(event).is_err() {
                trace!("view event receiver dropped");
            }
        });
        Some(pass)
    }

    /// Park instances the current tree no longer shows, then run a pass.
    pub fn reload(&mut self) -> Option<u64> {
        let visible = self.layout.as_deref().map(LayoutNode::visible_keys)?;
        self.back_unused_nodes(&visible);
        self.materialize()
    }

    /// Park every cached instance whose key is not in `using`.
    pub fn back_unused_nodes(&self, using: &HashSet<NodeKey>) -> usize {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.instances.back_unused(using, &mut state.tree)
    }

    /// Dispatch a tap on the interactive element `id`.
    ///
    /// A button emits [`ViewEvent::NodeTapped`] and toggles the visibility of
    /// every node listening on it, then relayouts and reloads. A link emits
    /// [`ViewEvent::LinkTapped`]. Returns whether `id` was interactive.
    /// Elements whose node is hidden or parked do not react.
    ///
    /// # Errors
    /// Propagates relayout failures.
    pub fn tap(&mut self, id: &str) -> Result<bool> {
        let bindings = {
            let state = self.state.borrow();
            state
                .interactive
                .get(id)
                .filter(|entry| state.tree.is_attached(entry.visual))
                .and_then(|entry| state.tree.get(entry.visual))
                .map(|node| (node.button.clone(), node.link.clone()))
        };
        let Some((button, link)) = bindings else {
            debug!("tap on `{id}` ignored, not an attached interactive element");
            return Ok(false);
        };
        if let Some(link) = link {
            self.emit(ViewEvent::LinkTapped {
                id: link.id,
                href: link.href,
            });
        }
        if let Some(button) = button {
            let target = button.id.clone();
            self.emit(ViewEvent::NodeTapped {
                id: button.id,
                src: button.src,
            });
            self.toggle_listeners(&target)?;
        }
        Ok(true)
    }

    fn toggle_listeners(&mut self, target: &str) -> Result<()> {
        let listeners = self.state.borrow().listeners.listeners(target).to_vec();
        if listeners.is_empty() {
            return Ok(());
        }
        let Some(layout) = self.layout.as_mut() else {
            return Ok(());
        };
        let root = Rc::make_mut(layout);
        for key in listeners {
            if let Some(node) = root.find_mut(key) {
                let hidden = !node.attrs.is_hidden();
                node.attrs.hidden = Some(hidden);
                debug!("node {} now hidden={hidden}", key.0);
            }
        }
        self.relayout.relayout(root)?;
        self.reload();
        Ok(())
    }

    /// Park every instance and forget instances, listeners and handlers.
    pub fn reset(&self) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        state.instances.reset(&mut state.tree);
        state.listeners.clear();
        state.interactive.clear();
    }

    /// Interactive element `id`, if its node is currently attached.
    pub fn interactive(&self, id: &str) -> Option<Interactive> {
        let state = self.state.borrow();
        state
            .interactive
            .get(id)
            .filter(|entry| state.tree.is_attached(entry.visual))
            .cloned()
    }

    /// Nodes listening on `target`.
    pub fn listeners(&self, target: &str) -> Vec<NodeKey> {
        self.state.borrow().listeners.listeners(target).to_vec()
    }

    pub fn instance(&self, key: NodeKey) -> Option<VisualId> {
        self.state.borrow().instances.get(key)
    }

    pub fn tree(&self) -> Ref<'_, VisualTree> {
        Ref::map(self.state.borrow(), |state| &state.tree)
    }

    pub const fn services(&self) -> &ResourceServices {
        &self.services
    }

    fn emit(&self, event: ViewEvent) {
        if self.events.send(event).is_err() {
            trace!("view event receiver dropped");
        }
    }
}
