//! Per-document cache of materialized visual instances keyed by layout node.
//!
//! Unused instances are parked, not destroyed, so the templates and images
//! already applied to them come back for free when the node reappears. Only a
//! reset frees them.

use crate::visual::{VisualId, VisualTree};
use log::debug;
use loom_core::NodeKey;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct NodeInstanceCache {
    instances: HashMap<NodeKey, VisualId>,
}

impl NodeInstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: NodeKey) -> Option<VisualId> {
        self.instances.get(&key).copied()
    }

    pub fn insert(&mut self, key: NodeKey, visual: VisualId) {
        self.instances.insert(key, visual);
    }

    pub fn contains(&self, key: NodeKey) -> bool {
        self.instances.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Park every instance whose key is not in `using`. Entries stay cached.
    ///
    /// Returns how many instances were parked.
    pub fn back_unused(&self, using: &HashSet<NodeKey>, tree: &mut VisualTree) -> usize {
        let mut parked = 0;
        for (key, visual) in &self.instances {
            if !using.contains(key) && !tree.is_parked(*visual) {
                tree.park(*visual);
                parked += 1;
            }
        }
        debug!("parked {parked} unused node instances");
        parked
    }

    /// Park everything, forget every entry and free the forgotten instances.
    pub fn reset(&mut self, tree: &mut VisualTree) {
        // Parking first flattens nested instances, so each removal frees one node.
        for visual in self.instances.values() {
            tree.park(*visual);
        }
        for (_, visual) in self.instances.drain() {
            tree.remove(visual);
        }
        debug!("instance cache reset, {} nodes left in the tree", tree.live_count());
    }
}
