//! Downloads document markup from the web before it is parsed and laid out.

use crate::network::{NetworkHooks, Transport, fetch_network};
use crate::resolver::{FetchStrategy, resolve};
use core::time::Duration;
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, ready};
use log::{debug, warn};
use loom_core::{Error, Result};
use std::rc::Rc;

/// Fetches markup over HTTP with the shared header hook, classifier and timeout.
#[derive(Clone)]
pub struct DocumentDownloader {
    transport: Rc<dyn Transport>,
    hooks: NetworkHooks,
    timeout: Option<Duration>,
}

impl DocumentDownloader {
    pub fn new(transport: Rc<dyn Transport>, timeout: Option<Duration>) -> Self {
        Self {
            transport,
            hooks: NetworkHooks::default(),
            timeout,
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: NetworkHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Download the markup at `url` as text. Invalid UTF-8 is replaced.
    ///
    /// # Errors
    /// `UnsupportedScheme` right away for anything but `http(s)`;
    /// `NetworkTimeout` or `NetworkError` once the request settles.
    pub fn download_document(&self, url: &str) -> LocalBoxFuture<'static, Result<String>> {
        let target = match resolve(url) {
            Ok(FetchStrategy::Network(target)) => target,
            Ok(FetchStrategy::LocalBundle(_) | FetchStrategy::RemoteBundle(_)) => {
                let scheme = url.split_once("://").map_or("resources", |(scheme, _)| scheme);
                return ready(Err(Error::UnsupportedScheme {
                    scheme: scheme.to_owned(),
                    uri: url.to_owned(),
                }))
                .boxed_local();
            }
            Err(err) => return ready(Err(err)).boxed_local(),
        };
        let request = fetch_network(&*self.transport, &self.hooks, &target, self.timeout);
        async move {
            match request.await {
                Ok(response) => {
                    debug!("downloaded document {target} ({} bytes)", response.body.len());
                    Ok(String::from_utf8_lossy(&response.body).into_owned())
                }
                Err(err) => {
                    warn!("failed to download document {target}: {err}");
                    Err(err)
                }
            }
        }
        .boxed_local()
    }
}
