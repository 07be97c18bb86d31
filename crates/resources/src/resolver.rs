//! URI classification into fetch strategies.
//!
//! Pure string work: nothing here touches a bundle or the network.

use loom_core::{Error, Result};
use url::Url;

const RESOURCES_SCHEME: &str = "resources://";
const ASSETBUNDLE_SCHEME: &str = "assetbundle://";

/// How a resource URI is fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FetchStrategy {
    /// Asset name inside the local bundle, prefix and extension stripped.
    LocalBundle(String),
    /// Named asset inside a downloadable bundle.
    RemoteBundle(String),
    /// Absolute `http`/`https` URL.
    Network(String),
}

impl FetchStrategy {
    /// Short label for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::LocalBundle(_) => "local bundle",
            Self::RemoteBundle(_) => "remote bundle",
            Self::Network(_) => "network",
        }
    }
}

/// Classify `uri` by its scheme prefix.
///
/// A bare relative path is treated as `resources://`.
///
/// # Errors
/// `UnsupportedScheme` for any scheme other than `resources`, `assetbundle`,
/// `http` or `https`. `NetworkError` when an `http(s)` URI does not parse.
pub fn resolve(uri: &str) -> Result<FetchStrategy> {
    if let Some(path) = uri.strip_prefix(RESOURCES_SCHEME) {
        return Ok(FetchStrategy::LocalBundle(bundle_name(path)));
    }
    if let Some(name) = uri.strip_prefix(ASSETBUNDLE_SCHEME) {
        return Ok(FetchStrategy::RemoteBundle(name.to_owned()));
    }
    match uri.split_once("://") {
        Some((scheme, _)) if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") => {
            let parsed = Url::parse(uri).map_err(|err| Error::NetworkError {
                url: uri.to_owned(),
                status: None,
                reason: err.to_string(),
            })?;
            Ok(FetchStrategy::Network(parsed.into()))
        }
        Some((scheme, _)) => Err(Error::UnsupportedScheme {
            scheme: scheme.to_owned(),
            uri: uri.to_owned(),
        }),
        None => Ok(FetchStrategy::LocalBundle(bundle_name(uri))),
    }
}

/// Bundle lookup name: no leading `./` or `/`, no trailing extension.
fn bundle_name(path: &str) -> String {
    let trimmed = path.trim_start_matches("./").trim_start_matches('/');
    let file_start = trimmed.rfind('/').map_or(0, |slash| slash + 1);
    match trimmed[file_start..].rfind('.') {
        Some(dot) if dot > 0 => trimmed[..file_start + dot].to_owned(),
        _ => trimmed.to_owned(),
    }
}
