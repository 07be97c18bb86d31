//! Process-wide template cache.

use crate::bundle::Bundle;
use crate::fetch_cache::FetchCache;
use crate::resolver::{FetchStrategy, resolve};
use crate::scheduler::Spawner;
use bytes::Bytes;
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, ready};
use log::{debug, error, warn};
use loom_core::{Error, Result};
use std::rc::Rc;
use url::Url;

/// Name prefix carried by placeholder templates.
pub const PLACEHOLDER_PREFIX: &str = "failed to load element:";

/// A reusable blueprint from which visual nodes are instantiated.
///
/// The blueprint bytes are opaque here; the rendering collaborator interprets
/// them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    path: String,
    blueprint: Bytes,
    placeholder: bool,
}

impl Template {
    pub fn new(name: impl Into<String>, path: impl Into<String>, blueprint: Bytes) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            blueprint,
            placeholder: false,
        }
    }

    /// Empty stand-in for a template that failed to load.
    pub fn placeholder(path: &str) -> Self {
        Self {
            name: format!("{PLACEHOLDER_PREFIX}{path}"),
            path: path.to_owned(),
            blueprint: Bytes::new(),
            placeholder: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn blueprint(&self) -> &Bytes {
        &self.blueprint
    }

    pub const fn is_placeholder(&self) -> bool {
        self.placeholder
    }
}

/// Templates keyed by resolved bundle name.
#[derive(Clone)]
pub struct TemplateCache {
    cache: FetchCache<String, Rc<Template>>,
    bundle: Rc<dyn Bundle>,
}

impl TemplateCache {
    pub fn new(bundle: Rc<dyn Bundle>, spawner: Spawner) -> Self {
        Self {
            cache: FetchCache::new(spawner),
            bundle,
        }
    }

    /// Resolve `uri` and fetch its template.
    ///
    /// # Errors
    /// See [`Self::get_template`]; also any fatal resolver error.
    pub fn load(&self, uri: &str) -> LocalBoxFuture<'static, Result<Rc<Template>>> {
        match resolve(uri) {
            Ok(strategy) => {
                let key = match &strategy {
                    FetchStrategy::LocalBundle(name) | FetchStrategy::RemoteBundle(name) => {
                        name.clone()
                    }
                    FetchStrategy::Network(url) => url.clone(),
                };
                self.get_template(&key, strategy)
            }
            Err(err) if err.is_fatal() => ready(Err(err)).boxed_local(),
            Err(err) => {
                warn!("template `{uri}` unavailable: {err}");
                ready(Ok(Rc::new(Template::placeholder(uri)))).boxed_local()
            }
        }
    }

    /// Cached template for `key`, fetched through `strategy` when missing.
    ///
    /// Non-fatal failures resolve to a placeholder template, which is not
    /// cached.
    ///
    /// # Errors
    /// `UnsupportedScheme` for a network strategy: templates are never fetched
    /// over HTTP.
    pub fn get_template(
        &self,
        key: &str,
        strategy: FetchStrategy,
    ) -> LocalBoxFuture<'static, Result<Rc<Template>>> {
        if let FetchStrategy::Network(url) = &strategy {
            let scheme = Url::parse(url)
                .map(|parsed| parsed.scheme().to_owned())
                .unwrap_or_else(|_| String::from("http"));
            return ready(Err(Error::UnsupportedScheme {
                scheme,
                uri: url.clone(),
            }))
            .boxed_local();
        }
        let bundle = Rc::clone(&self.bundle);
        let path = key.to_owned();
        let fetch = self
            .cache
            .get_or_fetch(path.clone(), move || fetch_template(bundle, strategy));
        async move {
            match fetch.await {
                Ok(template) => Ok(template),
                Err(err) if err.is_fatal() => Err(err),
                Err(err) => {
                    warn!("template `{path}` replaced by placeholder: {err}");
                    Ok(Rc::new(Template::placeholder(&path)))
                }
            }
        }
        .boxed_local()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.cache.contains(&key.to_owned())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Underlying template loads started since construction.
    pub fn fetch_count(&self) -> u64 {
        self.cache.fetch_count()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}

async fn fetch_template(bundle: Rc<dyn Bundle>, strategy: FetchStrategy) -> Result<Rc<Template>> {
    match strategy {
        FetchStrategy::LocalBundle(name) => {
            let Some(blueprint) = bundle.load(&name).await else {
                return Err(Error::TemplateLoadFailed {
                    path: name,
                    reason: String::from("not present in the local bundle"),
                });
            };
            debug!("loaded template `{name}` ({} bytes)", blueprint.len());
            let short = name.rsplit('/').next().unwrap_or(&name).to_owned();
            Ok(Rc::new(Template::new(short, name, blueprint)))
        }
        FetchStrategy::RemoteBundle(name) => {
            error!("remote bundle template `{name}` requested; remote bundles are not implemented yet");
            Err(Error::NotImplemented(name))
        }
        FetchStrategy::Network(url) => Err(Error::UnsupportedScheme {
            scheme: String::from("http"),
            uri: url,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::MemoryBundle;
    use crate::scheduler::Scheduler;
    use core::cell::RefCell;

    fn run(
        scheduler: &mut Scheduler,
        fetch: LocalBoxFuture<'static, Result<Rc<Template>>>,
    ) -> Result<Rc<Template>> {
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
    fn local_template_is_cached_by_name() -> Result<()> {
        let mut scheduler = Scheduler::new();
        let bundle = MemoryBundle::new();
        bundle.insert("Views/Default/img", &b"{}"[..]);
        let cache = TemplateCache::new(Rc::new(bundle.clone()), scheduler.spawner());

        let template = run(&mut scheduler, cache.load("resources://Views/Default/img.prefab"))?;
        assert_eq!(template.name(), "img");
        assert_eq!(template.path(), "Views/Default/img");
        assert!(!template.is_placeholder());
        assert!(cache.contains("Views/Default/img"));

        let again = run(&mut scheduler, cache.load("Views/Default/img"))?;
        assert!(Rc::ptr_eq(&template, &again));
        assert_eq!(bundle.load_count("Views/Default/img"), 1);
        Ok(())
    }

    #[test]
    fn missing_template_becomes_uncached_placeholder() -> Result<()> {
        let mut scheduler = Scheduler::new();
        let cache = TemplateCache::new(Rc::new(MemoryBundle::new()), scheduler.spawner());
        let template = run(&mut scheduler, cache.load("resources://Views/demo/gone"))?;
        assert!(template.is_placeholder());
        assert_eq!(template.name(), "failed to load element:Views/demo/gone");
        assert!(cache.is_empty());
        Ok(())
    }

    #[test]
    fn network_templates_are_rejected() {
        let mut scheduler = Scheduler::new();
        let cache = TemplateCache::new(Rc::new(MemoryBundle::new()), scheduler.spawner());
        let outcome = run(&mut scheduler, cache.load("https://example.com/card"));
        assert_eq!(
            outcome,
            Err(Error::UnsupportedScheme {
                scheme: String::from("https"),
                uri: String::from("https://example.com/card"),
            })
        );
        assert_eq!(cache.fetch_count(), 0);
    }

    #[test]
    fn remote_bundle_yields_placeholder() -> Result<()> {
        let mut scheduler = Scheduler::new();
        let cache = TemplateCache::new(Rc::new(MemoryBundle::new()), scheduler.spawner());
        let template = run(&mut scheduler, cache.load("assetbundle://ui/card"))?;
        assert!(template.is_placeholder());
        Ok(())
    }
}
