//! Process-wide cache of decoded images, keyed by the full source URI.

use crate::bundle::Bundle;
use crate::fetch_cache::FetchCache;
use crate::network::{NetworkHooks, Transport, fetch_network};
use crate::resolver::{FetchStrategy, resolve};
use crate::scheduler::Spawner;
use bytes::Bytes;
use core::time::Duration;
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, ready};
use image::RgbaImage;
use log::{debug, error, warn};
use loom_core::{Error, Result};
use std::rc::Rc;

/// A decoded RGBA image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pixels: RgbaImage,
}

impl Image {
    pub const fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    /// Decode an encoded image (PNG, JPEG or WebP).
    ///
    /// # Errors
    /// `ImageDecode` when the bytes are not a supported image.
    pub fn decode(uri: &str, data: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(data).map_err(|err| Error::ImageDecode {
            uri: uri.to_owned(),
            reason: err.to_string(),
        })?;
        Ok(Self::new(decoded.to_rgba8()))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub const fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

/// Images keyed by their source URI, scheme and query included.
#[derive(Clone)]
pub struct ImageCache {
    cache: FetchCache<String, Rc<Image>>,
    bundle: Rc<dyn Bundle>,
    transport: Rc<dyn Transport>,
    hooks: NetworkHooks,
    timeout: Option<Duration>,
}

impl ImageCache {
    pub fn new(
        bundle: Rc<dyn Bundle>,
        transport: Rc<dyn Transport>,
        spawner: Spawner,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            cache: FetchCache::new(spawner),
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

    /// Deadline for network fetches; `None` waits indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cached image for `uri`, fetched when missing.
    ///
    /// Failed fetches leave no cache entry and are not retried here.
    ///
    /// # Errors
    /// Resolver errors before anything is fetched; `NetworkTimeout`,
    /// `NetworkError`, `ResourceNotFound`, `ImageDecode` or `NotImplemented`
    /// from the fetch itself.
    pub fn get_image(&self, uri: &str) -> LocalBoxFuture<'static, Result<Rc<Image>>> {
        let strategy = match resolve(uri) {
            Ok(strategy) => strategy,
            Err(err) => return ready(Err(err)).boxed_local(),
        };
        let bundle = Rc::clone(&self.bundle);
        let transport = Rc::clone(&self.transport);
        let hooks = self.hooks.clone();
        let timeout = self.timeout;
        let key = uri.to_owned();
        let source = key.clone();
        self.cache.get_or_fetch(key, move || async move {
            let data = match strategy {
                FetchStrategy::LocalBundle(name) => bundle
                    .load(&name)
                    .await
                    .ok_or(Error::ResourceNotFound(name))?,
                FetchStrategy::Network(url) => {
                    fetch_network(&*transport, &hooks, &url, timeout).await?.body
                }
                FetchStrategy::RemoteBundle(name) => {
                    error!("remote bundle image `{name}` requested; remote bundles are not implemented yet");
                    return Err(Error::NotImplemented(name));
                }
            };
            decode(&source, &data)
        })
    }

    pub fn contains(&self, uri: &str) -> bool {
        self.cache.contains(&uri.to_owned())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Underlying image fetches started since construction.
    pub fn fetch_count(&self) -> u64 {
        self.cache.fetch_count()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

fn decode(uri: &str, data: &Bytes) -> Result<Rc<Image>> {
    match Image::decode(uri, data) {
        Ok(image) => {
            debug!("decoded image `{uri}` ({}x{})", image.width(), image.height());
            Ok(Rc::new(image))
        }
        Err(err) => {
            warn!("{err}");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::MemoryBundle;
    use crate::network::ScriptedTransport;
    use crate::scheduler::Scheduler;
    use core::cell::RefCell;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let pixels = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut encoded = Cursor::new(Vec::new());
        pixels
            .write_to(&mut encoded, ImageFormat::Png)
            .map(|()| encoded.into_inner())
            .unwrap_or_default()
    }

    fn run(
        scheduler: &mut Scheduler,
        fetch: LocalBoxFuture<'static, Result<Rc<Image>>>,
    ) -> Result<Rc<Image>> {
        let result = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&result);
        scheduler.spawn(async move {
            let outcome = fetch.await;
            *sink.borrow_mut() = Some(outcome);
        });
        scheduler.run_until_idle(50);
        result
            .take()
            .unwrap_or_else(|| Err(Error::NotImplemented(String::from("fetch never finished"))))
    }

    #[test]
    fn bundled_image_decodes() -> Result<()> {
        let mut scheduler = Scheduler::new();
        let bundle = MemoryBundle::new();
        bundle.insert("icons/logo", png(3, 2));
        let cache = ImageCache::new(
            Rc::new(bundle),
            Rc::new(ScriptedTransport::new()),
            scheduler.spawner(),
            None,
        );
        let image = run(&mut scheduler, cache.get_image("resources://icons/logo.png"))?;
        assert_eq!((image.width(), image.height()), (3, 2));
        assert!(cache.contains("resources://icons/logo.png"));
        assert!(!cache.contains("icons/logo"));
        Ok(())
    }

    #[test]
    fn query_strings_do_not_collide() -> Result<()> {
        let mut scheduler = Scheduler::new();
        let transport = ScriptedTransport::new();
        transport.respond("https://cdn.test/a.png?size=1", 200, png(1, 1));
        transport.respond("https://cdn.test/a.png?size=2", 200, png(2, 2));
        let cache = ImageCache::new(
            Rc::new(MemoryBundle::new()),
            Rc::new(transport),
            scheduler.spawner(),
            None,
        );
        let small = run(&mut scheduler, cache.get_image("https://cdn.test/a.png?size=1"))?;
        let large = run(&mut scheduler, cache.get_image("https://cdn.test/a.png?size=2"))?;
        assert_eq!(small.width(), 1);
        assert_eq!(large.width(), 2);
        assert_eq!(cache.len(), 2);
        Ok(())
    }

    #[test]
    fn undecodable_payload_is_not_cached() {
        let mut scheduler = Scheduler::new();
        let bundle = MemoryBundle::new();
        bundle.insert("icons/broken", &b"not an image"[..]);
        let cache = ImageCache::new(
            Rc::new(bundle),
            Rc::new(ScriptedTransport::new()),
            scheduler.spawner(),
            None,
        );
        let outcome = run(&mut scheduler, cache.get_image("icons/broken"));
        assert!(matches!(outcome, Err(Error::ImageDecode { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn unsupported_scheme_fails_before_fetching() {
        let mut scheduler = Scheduler::new();
        let cache = ImageCache::new(
            Rc::new(MemoryBundle::new()),
            Rc::new(ScriptedTransport::new()),
            scheduler.spawner(),
            None,
        );
        let outcome = run(&mut scheduler, cache.get_image("data://inline"));
        assert!(matches!(outcome, Err(Error::UnsupportedScheme { .. })));
        assert_eq!(cache.fetch_count(), 0);
    }
}
