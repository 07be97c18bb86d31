//! Tag registry: bidirectional mapping between tag names and small integer codes.
//!
//! Built-in tags occupy a closed, statically known range assigned at
//! construction. Unknown names are interned on first sight past that range and
//! keep their code for the registry's lifetime. Interning is append-only.

use crate::descriptor::{BoxPos, BoxConstraint, CustomTagDescriptor};
use crate::error::{Error, Result};
use lasso::{Key as _, Rodeo, Spur};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Integer identifier for a tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TagCode(pub u32);

impl TagCode {
    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// The closed built-in vocabulary. Declaration order is the code order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum BuiltinTag {
    Html,
    Head,
    Title,
    Body,
    Div,
    Span,
    P,
    A,
    Img,
    Ul,
    Ol,
    Li,
    H1,
    H2,
    H3,
    H4,
    H5,
    H6,
    Hr,
    Br,
    /// Pseudo tag the parser gives to bare text runs.
    Text,
}

impl BuiltinTag {
    /// Every built-in tag in code order.
    pub const ALL: [Self; 21] = [
        Self::Html,
        Self::Head,
        Self::Title,
        Self::Body,
        Self::Div,
        Self::Span,
        Self::P,
        Self::A,
        Self::Img,
        Self::Ul,
        Self::Ol,
        Self::Li,
        Self::H1,
        Self::H2,
        Self::H3,
        Self::H4,
        Self::H5,
        Self::H6,
        Self::Hr,
        Self::Br,
        Self::Text,
    ];

    /// The highest code in the built-in range.
    pub const MAX_CODE: TagCode = TagCode(Self::Text as u32);

    pub const fn name(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Head => "head",
            Self::Title => "title",
            Self::Body => "body",
            Self::Div => "div",
            Self::Span => "span",
            Self::P => "p",
            Self::A => "a",
            Self::Img => "img",
            Self::Ul => "ul",
            Self::Ol => "ol",
            Self::Li => "li",
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
            Self::H4 => "h4",
            Self::H5 => "h5",
            Self::H6 => "h6",
            Self::Hr => "hr",
            Self::Br => "br",
            Self::Text => "_text",
        }
    }

    #[inline]
    pub const fn code(self) -> TagCode {
        TagCode(self as u32)
    }

    pub fn from_code(code: TagCode) -> Option<Self> {
        Self::ALL.get(code.index()).copied()
    }

    /// Static kind table for built-in tags.
    pub const fn kind(self) -> NodeKind {
        match self {
            Self::Img => NodeKind::ContentImage,
            Self::Hr | Self::Br => NodeKind::ContentLineBreak,
            Self::Text => NodeKind::ContentText,
            _ => NodeKind::Container,
        }
    }
}

/// How a layout node is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    /// Built-in structural wrapper, no template fetch.
    Container,
    /// Structural wrapper for a custom box tag.
    CustomBox,
    ContentImage,
    ContentText,
    /// Zero-size break, never materialized.
    ContentLineBreak,
    /// Custom tag backed by a fetched template that declares boxes.
    CustomLayer,
    /// Custom tag backed by a fetched template without boxes.
    CustomEmptyLayer,
    /// Tag code not found in the registry.
    Unresolved,
}

impl NodeKind {
    /// Whether materializing this kind needs a template fetch.
    #[inline]
    pub const fn needs_template(self) -> bool {
        matches!(
            self,
            Self::ContentImage | Self::ContentText | Self::CustomLayer | Self::CustomEmptyLayer
        )
    }
}

/// Context the parser supplies alongside a tag when classifying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindHint {
    #[default]
    Element,
    /// The node wraps a text run.
    Text,
}

#[derive(Debug, Clone, Copy)]
enum CustomEntry {
    Layer { layer: usize, boxed: bool },
    Box,
    Content { content: usize },
}

/// Descriptor data indexed for tag lookups.
#[derive(Debug)]
struct CustomTags {
    descriptor: CustomTagDescriptor,
    entries: HashMap<TagCode, CustomEntry>,
}

#[derive(Debug, Default)]
enum DescriptorState {
    #[default]
    Empty,
    Loading,
    Loaded(CustomTags),
}

/// Per-document tag registry and custom tag descriptor holder.
#[derive(Debug)]
pub struct TagRegistry {
    names: Rodeo<Spur>,
    descriptor: DescriptorState,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TagRegistry {
    pub fn new() -> Self {
        let mut names = Rodeo::default();
        // Seeded in declaration order so interner indices equal built-in codes.
        for tag in BuiltinTag::ALL {
            names.get_or_intern_static(tag.name());
        }
        Self {
            names,
            descriptor: DescriptorState::Empty,
        }
    }

    /// Code for `name`, interning it past the built-in range if unseen.
    pub fn resolve_code(&mut self, name: &str) -> TagCode {
        let spur = self.names.get_or_intern(name);
        TagCode(spur.into_usize() as u32)
    }

    /// Code for `name` without interning.
    pub fn lookup_code(&self, name: &str) -> Option<TagCode> {
        self.names
            .get(name)
            .map(|spur| TagCode(spur.into_usize() as u32))
    }

    /// # Errors
    /// `UnknownTagCode` when the code was never assigned.
    pub fn resolve_name(&self, code: TagCode) -> Result<&str> {
        Spur::try_from_usize(code.index())
            .and_then(|spur| self.names.try_resolve(&spur))
            .ok_or(Error::UnknownTagCode(code.0))
    }

    #[inline]
    pub const fn is_builtin(&self, code: TagCode) -> bool {
        code.0 <= BuiltinTag::MAX_CODE.0
    }

    /// Number of tags interned beyond the built-in vocabulary.
    pub fn additional_tag_count(&self) -> usize {
        self.names.len().saturating_sub(BuiltinTag::ALL.len())
    }

    /// Classify a tag.
    ///
    /// # Errors
    /// `UnknownTagCode` for an unassigned code, `DescriptorNotLoaded` for a
    /// custom code before the document descriptor is installed.
    pub fn kind_of(&self, code: TagCode, hint: KindHint) -> Result<NodeKind> {
        if let Some(builtin) = BuiltinTag::from_code(code) {
            return Ok(builtin.kind());
        }
        self.resolve_name(code)?;
        let tags = self.custom_tags()?;
        Ok(match tags.entries.get(&code) {
            Some(CustomEntry::Layer { boxed: true, .. }) => NodeKind::CustomLayer,
            Some(CustomEntry::Layer { boxed: false, .. }) => NodeKind::CustomEmptyLayer,
            Some(CustomEntry::Box) => NodeKind::CustomBox,
            Some(CustomEntry::Content { .. }) => match hint {
                KindHint::Text => NodeKind::ContentText,
                KindHint::Element => NodeKind::ContentImage,
            },
            None => NodeKind::Unresolved,
        })
    }

    /// Load path the descriptor declares for a custom tag of the given kind.
    ///
    /// # Errors
    /// `DescriptorNotLoaded` before install, `MissingLoadPath` when the tag has
    /// no entry of a matching kind.
    pub fn load_path(&self, code: TagCode, kind: NodeKind) -> Result<&str> {
        let tags = self.custom_tags()?;
        let found = match (tags.entries.get(&code), kind) {
            (
                Some(CustomEntry::Layer { layer, .. }),
                NodeKind::CustomLayer | NodeKind::CustomEmptyLayer,
            ) => tags.descriptor.layer_infos.get(*layer).map(|info| info.load_path.as_str()),
            (
                Some(CustomEntry::Content { content }),
                NodeKind::ContentImage | NodeKind::ContentText,
            ) => tags.descriptor.contents.get(*content).map(|info| info.load_path.as_str()),
            _ => None,
        };
        match found {
            Some(path) => Ok(path),
            None => Err(Error::MissingLoadPath(self.resolve_name(code)?.to_owned())),
        }
    }

    /// Box constraints of a custom layer tag.
    ///
    /// # Errors
    /// `DescriptorNotLoaded`, or `MissingLoadPath` when `code` is not a layer.
    pub fn constraints(&self, code: TagCode) -> Result<&[BoxConstraint]> {
        let tags = self.custom_tags()?;
        match tags.entries.get(&code) {
            Some(CustomEntry::Layer { layer, .. }) => Ok(tags
                .descriptor
                .layer_infos
                .get(*layer)
                .map_or(&[][..], |info| info.boxes.as_slice())),
            _ => Err(Error::MissingLoadPath(self.resolve_name(code)?.to_owned())),
        }
    }

    /// Natural size of a custom layer when laid out without boxes.
    ///
    /// # Errors
    /// Same as [`Self::constraints`].
    pub fn unboxed_layer_size(&self, code: TagCode) -> Result<BoxPos> {
        let tags = self.custom_tags()?;
        match tags.entries.get(&code) {
            Some(CustomEntry::Layer { layer, .. }) => Ok(tags
                .descriptor
                .layer_infos
                .get(*layer)
                .map(|info| info.unboxed_layer_size)
                .unwrap_or_default()),
            _ => Err(Error::MissingLoadPath(self.resolve_name(code)?.to_owned())),
        }
    }

    /// Tag name used for a box inside a layer.
    ///
    /// # Errors
    /// `UnknownTagCode` if either code is unassigned.
    pub fn layer_box_name(&self, layer: TagCode, box_tag: TagCode) -> Result<String> {
        Ok(format!(
            "{}_{}",
            self.resolve_name(layer)?,
            self.resolve_name(box_tag)?
        ))
    }

    pub fn descriptor(&self) -> Option<&CustomTagDescriptor> {
        match &self.descriptor {
            DescriptorState::Loaded(tags) => Some(&tags.descriptor),
            DescriptorState::Empty | DescriptorState::Loading => None,
        }
    }

    pub const fn is_loading_descriptor(&self) -> bool {
        matches!(self.descriptor, DescriptorState::Loading)
    }

    /// Claim the document's single descriptor slot.
    ///
    /// # Errors
    /// `MultipleDescriptors` when a load is in progress or already finished.
    pub fn begin_descriptor_load(&mut self) -> Result<()> {
        match self.descriptor {
            DescriptorState::Empty => {
                self.descriptor = DescriptorState::Loading;
                Ok(())
            }
            DescriptorState::Loading | DescriptorState::Loaded(_) => {
                Err(Error::MultipleDescriptors)
            }
        }
    }

    /// Release a claimed slot after a failed load.
    pub fn abort_descriptor_load(&mut self) {
        if matches!(self.descriptor, DescriptorState::Loading) {
            self.descriptor = DescriptorState::Empty;
        }
    }

    /// Install a fetched descriptor, interning every custom tag name it declares.
    ///
    /// Names are lower-cased. Box tags are registered as `<layer>_<box>`.
    ///
    /// # Errors
    /// `MultipleDescriptors` if a descriptor is already installed.
    pub fn install_descriptor(&mut self, descriptor: CustomTagDescriptor) -> Result<()> {
        if matches!(self.descriptor, DescriptorState::Loaded(_)) {
            return Err(Error::MultipleDescriptors);
        }
        let mut entries = HashMap::new();
        for (layer, info) in descriptor.layer_infos.iter().enumerate() {
            let layer_name = info.layer_name.to_ascii_lowercase();
            let code = self.resolve_code(&layer_name);
            entries.insert(
                code,
                CustomEntry::Layer {
                    layer,
                    boxed: !info.boxes.is_empty(),
                },
            );
            for constraint in &info.boxes {
                let box_name = format!(
                    "{layer_name}_{}",
                    constraint.box_name.to_ascii_lowercase()
                );
                let box_code = self.resolve_code(&box_name);
                entries.insert(box_code, CustomEntry::Box);
            }
        }
        for (content, info) in descriptor.contents.iter().enumerate() {
            let code = self.resolve_code(&info.content_name.to_ascii_lowercase());
            entries.insert(code, CustomEntry::Content { content });
        }
        debug!(
            "installed descriptor `{}` with {} custom tags",
            descriptor.view_name,
            entries.len()
        );
        self.descriptor = DescriptorState::Loaded(CustomTags {
            descriptor,
            entries,
        });
        Ok(())
    }

    fn custom_tags(&self) -> Result<&CustomTags> {
        match &self.descriptor {
            DescriptorState::Loaded(tags) => Ok(tags),
            DescriptorState::Empty | DescriptorState::Loading => Err(Error::DescriptorNotLoaded),
        }
    }
}
