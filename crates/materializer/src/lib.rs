//! Turns laid-out trees into visual trees.
//!
//! A [`DocumentView`] owns one document session: its tag registry, the
//! instance cache that lets repeated passes reuse visual nodes, the
//! cascading-visibility listeners and the interactive element map. Passes run
//! as tasks on the shared [`loom_resources::Scheduler`].

pub mod instance_cache;
pub mod interaction;
pub mod materialize;
pub mod view;
pub mod visual;

pub use instance_cache::NodeInstanceCache;
pub use interaction::{Interactive, InteractiveMap, ListenerRegistry, ViewEvent};
pub use materialize::{Materializer, ViewState};
pub use view::{DocumentView, KeepLayout, Relayout};
pub use visual::{ButtonBinding, LinkBinding, VisualId, VisualNode, VisualTree};
