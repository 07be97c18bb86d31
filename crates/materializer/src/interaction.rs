//! Interaction wiring: cascading-visibility listeners, the interactive element
//! map, and the events a document view emits.

use crate::visual::VisualId;
use loom_core::{Error, NodeKey};
use std::collections::HashMap;

/// Nodes whose visibility follows taps on a listen target.
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    listeners: HashMap<String, Vec<NodeKey>>,
}

impl ListenerRegistry {
    /// Register `key` as listening on `target`. Registering twice is a no-op.
    pub fn register(&mut self, target: &str, key: NodeKey) {
        let keys = self.listeners.entry(target.to_owned()).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    pub fn listeners(&self, target: &str) -> &[NodeKey] {
        self.listeners.get(target).map_or(&[][..], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.listeners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn clear(&mut self) {
        self.listeners.clear();
    }
}

/// An interactive element exposed to the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interactive {
    pub visual: VisualId,
    /// `src` for buttons, `href` for links. A button's `src` wins when a node
    /// is both.
    pub uri: String,
}

#[derive(Debug, Default)]
pub struct InteractiveMap {
    entries: HashMap<String, Interactive>,
}

impl InteractiveMap {
    pub fn insert(&mut self, id: &str, visual: VisualId, uri: &str) {
        self.entries.insert(
            id.to_owned(),
            Interactive {
                visual,
                uri: uri.to_owned(),
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&Interactive> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Outbound notifications of a document view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewEvent {
    /// A pass finished its structural walk.
    Materialized { pass: u64, nodes: usize },
    /// A pass hit a fatal error.
    MaterializeFailed { pass: u64, error: Error },
    NodeTapped { id: String, src: String },
    LinkTapped { id: String, href: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_deduplicated() {
        let mut registry = ListenerRegistry::default();
        registry.register("b", NodeKey(2));
        registry.register("b", NodeKey(2));
        registry.register("b", NodeKey(5));
        assert_eq!(registry.listeners("b"), [NodeKey(2), NodeKey(5)]);
        assert!(registry.listeners("a").is_empty());
        assert_eq!(registry.len(), 2);
    }
}
