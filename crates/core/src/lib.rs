//! Shared vocabulary for the loom materialization engine.
//!
//! This crate holds what every stage agrees on: the error taxonomy, the tag
//! registry with its built-in and custom vocabularies, the custom tag
//! descriptor format, and the laid-out tree consumed from the layout stage.

pub mod descriptor;
pub mod error;
pub mod layout;
pub mod tags;

pub use descriptor::{BoxConstraint, BoxPos, ContentInfo, CustomTagDescriptor, LayerInfo};
pub use error::{Error, Result};
pub use layout::{Attributes, LayoutNode, NodeKey, Rect};
pub use tags::{BuiltinTag, KindHint, NodeKind, TagCode, TagRegistry};
