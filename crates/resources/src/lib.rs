//! Resource side of the loom engine.
//!
//! Everything here runs on one cooperative [`scheduler::Scheduler`]. The
//! caches are shared handles: clone them freely, every clone sees the same
//! entries and the same in-flight fetches.

pub mod bundle;
pub mod config;
pub mod descriptor_loader;
pub mod fetch_cache;
pub mod image_cache;
pub mod markup;
pub mod network;
pub mod resolver;
pub mod scheduler;
pub mod template;

pub use bundle::{Bundle, DirBundle, MemoryBundle};
pub use config::LoomConfig;
pub use descriptor_loader::DescriptorLoader;
pub use fetch_cache::FetchCache;
pub use image_cache::{Image, ImageCache};
pub use markup::DocumentDownloader;
pub use network::{HttpResponse, NetworkHooks, PendingResponse, ReqwestTransport, ScriptedTransport, Transport};
pub use resolver::{FetchStrategy, resolve};
pub use scheduler::{RoundRobin, Scheduler, Spawner, next_tick};
pub use template::{Template, TemplateCache};

use std::rc::Rc;

/// The process-wide services every document view shares.
#[derive(Clone)]
pub struct ResourceServices {
    pub config: Rc<LoomConfig>,
    pub spawner: Spawner,
    pub templates: TemplateCache,
    pub images: ImageCache,
    pub descriptors: DescriptorLoader,
    pub documents: DocumentDownloader,
}

impl ResourceServices {
    pub fn new(
        config: LoomConfig,
        spawner: Spawner,
        bundle: Rc<dyn Bundle>,
        transport: Rc<dyn Transport>,
    ) -> Self {
        let timeout = config.timeout();
        Self {
            templates: TemplateCache::new(Rc::clone(&bundle), spawner.clone()),
            images: ImageCache::new(
                Rc::clone(&bundle),
                Rc::clone(&transport),
                spawner.clone(),
                timeout,
            ),
            documents: DocumentDownloader::new(Rc::clone(&transport), timeout),
            descriptors: DescriptorLoader::new(bundle, transport, timeout),
            config: Rc::new(config),
            spawner,
        }
    }

    /// Use `hooks` for every network request these services make.
    #[must_use]
    pub fn with_hooks(mut self, hooks: &NetworkHooks) -> Self {
        self.images = self.images.with_hooks(hooks.clone());
        self.descriptors = self.descriptors.with_hooks(hooks.clone());
        self.documents = self.documents.with_hooks(hooks.clone());
        self
    }
}
