//! Loads a document's custom tag descriptor and installs it into its registry.

use crate::bundle::Bundle;
use crate::network::{NetworkHooks, Transport, fetch_network};
use crate::resolver::{FetchStrategy, resolve};
use bytes::Bytes;
use core::cell::RefCell;
use core::time::Duration;
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, ready};
use log::{error, info, warn};
use loom_core::{CustomTagDescriptor, Error, Result, TagRegistry};
use std::rc::Rc;

/// Fetches descriptors from the local bundle or over HTTP.
#[derive(Clone)]
pub struct DescriptorLoader {
    bundle: Rc<dyn Bundle>,
    transport: Rc<dyn Transport>,
    hooks: NetworkHooks,
    timeout: Option<Duration>,
}

impl DescriptorLoader {
    pub fn new(bundle: Rc<dyn Bundle>, transport: Rc<dyn Transport>, timeout: Option<Duration>) -> Self {
        Self {
            bundle,
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

    /// Fetch the descriptor at `uri` and install it into `registry`.
    ///
    /// The registry's descriptor slot is claimed before this returns, so a
    /// second call for the same document fails right away even while the
    /// first is still fetching. A failed load releases the slot again.
    ///
    /// # Errors
    /// `UnsupportedScheme` and `MultipleDescriptors` immediately;
    /// `ResourceNotFound`, `DescriptorParse`, `NetworkTimeout`, `NetworkError`
    /// or `NotImplemented` once the fetch settles.
    pub fn load(
        &self,
        uri: &str,
        registry: &Rc<RefCell<TagRegistry>>,
    ) -> LocalBoxFuture<'static, Result<()>> {
        let strategy = match resolve(uri) {
            Ok(strategy) => strategy,
            Err(err) => return ready(Err(err)).boxed_local(),
        };
        if let Err(err) = registry.borrow_mut().begin_descriptor_load() {
            error!("descriptor `{uri}` rejected: {err}");
            return ready(Err(err)).boxed_local();
        }
        let payload = self.fetch(strategy);
        let registry = Rc::clone(registry);
        let uri = uri.to_owned();
        async move {
            let outcome = match payload.await {
                Ok(data) => parse(&uri, &data),
                Err(err) => Err(err),
            };
            let mut registry = registry.borrow_mut();
            match outcome {
                Ok(descriptor) => {
                    info!(
                        "descriptor `{}` loaded from {uri}: {} layers, {} contents",
                        descriptor.view_name,
                        descriptor.layer_infos.len(),
                        descriptor.contents.len()
                    );
                    registry.install_descriptor(descriptor)
                }
                Err(err) => {
                    warn!("descriptor load from {uri} failed: {err}");
                    registry.abort_descriptor_load();
                    Err(err)
                }
            }
        }
        .boxed_local()
    }

    fn fetch(&self, strategy: FetchStrategy) -> LocalBoxFuture<'static, Result<Bytes>> {
        match strategy {
            FetchStrategy::LocalBundle(name) => {
                let load = self.bundle.load(&name);
                async move { load.await.ok_or(Error::ResourceNotFound(name)) }.boxed_local()
            }
            FetchStrategy::Network(url) => {
                let request = fetch_network(&*self.transport, &self.hooks, &url, self.timeout);
                async move { Ok(request.await?.body) }.boxed_local()
            }
            FetchStrategy::RemoteBundle(name) => {
                error!("remote bundle descriptor `{name}` requested; remote bundles are not implemented yet");
                ready(Err(Error::NotImplemented(name))).boxed_local()
            }
        }
    }
}

fn parse(uri: &str, data: &[u8]) -> Result<CustomTagDescriptor> {
    let text = String::from_utf8_lossy(data);
    CustomTagDescriptor::from_json(&text).map_err(|err| Error::DescriptorParse {
        uri: uri.to_owned(),
        reason: err.to_string(),
    })
}
