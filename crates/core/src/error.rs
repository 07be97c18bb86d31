//! Error taxonomy shared by every loom crate.
//!
//! Errors fall into two classes. Configuration-shape errors mean the document
//! itself is malformed and abort whatever operation raised them. Per-resource
//! errors only degrade the node that needed the resource; the rest of the
//! materialization pass carries on.

use core::result;
use thiserror::Error;

/// Result alias used across the loom crates.
pub type Result<T> = result::Result<T, Error>;

/// Every failure the materialization engine can report.
///
/// The type is `Clone` because one failed in-flight fetch is observed by every
/// task that was waiting on the same cache key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The URI scheme has no fetch strategy, or the strategy cannot serve this
    /// kind of resource.
    #[error("unsupported scheme `{scheme}` in `{uri}`")]
    UnsupportedScheme { scheme: String, uri: String },

    /// The code is neither built-in nor previously interned.
    #[error("unknown tag code {0}")]
    UnknownTagCode(u32),

    /// Custom tag information was requested before the document descriptor loaded.
    #[error("custom tag descriptor has not been loaded")]
    DescriptorNotLoaded,

    /// A second descriptor load was requested for the same document.
    #[error("multiple custom tag descriptors requested; only one is valid per document")]
    MultipleDescriptors,

    /// The network request did not finish before its deadline.
    #[error("request to `{url}` timed out after {timeout_ms}ms")]
    NetworkTimeout { url: String, timeout_ms: u64 },

    /// Transport failure or a response the classifier rejected.
    #[error("request to `{url}` failed (status {status:?}): {reason}")]
    NetworkError {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// A template could not be produced from its source.
    #[error("failed to load template `{path}`: {reason}")]
    TemplateLoadFailed { path: String, reason: String },

    /// The remote-bundle strategy is reserved but not implemented.
    #[error("remote bundle loading is not implemented (`{0}`)")]
    NotImplemented(String),

    /// The local bundle holds nothing under the path.
    #[error("no bundled resource at `{0}`")]
    ResourceNotFound(String),

    /// Bytes were fetched but are not a decodable image.
    #[error("could not decode image `{uri}`: {reason}")]
    ImageDecode { uri: String, reason: String },

    /// The descriptor payload is not valid descriptor JSON.
    #[error("malformed custom tag descriptor from `{uri}`: {reason}")]
    DescriptorParse { uri: String, reason: String },

    /// A markup attribute failed validation.
    #[error("invalid value `{value}` for attribute `{name}`")]
    InvalidAttribute { name: String, value: String },

    /// The descriptor declares no load path for this custom tag.
    #[error("no load path declared for custom tag `{0}`")]
    MissingLoadPath(String),

    /// The layout stage handed over a node the registry could not classify.
    #[error("layout node {0} has an unresolved tag")]
    UnresolvedNode(u64),
}

impl Error {
    /// Whether the error means the document is malformed.
    ///
    /// Fatal errors abort the operation that raised them. Everything else is a
    /// per-resource failure that leaves its node degraded.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedScheme { .. }
                | Self::UnknownTagCode(_)
                | Self::DescriptorNotLoaded
                | Self::MultipleDescriptors
                | Self::DescriptorParse { .. }
                | Self::InvalidAttribute { .. }
                | Self::MissingLoadPath(_)
                | Self::UnresolvedNode(_)
        )
    }
}
