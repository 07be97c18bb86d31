//! Local bundle seam: asynchronous load-by-name of packaged assets.
//!
//! Names arrive already stripped of any scheme prefix and file extension, see
//! [`crate::resolver::resolve`].

use crate::scheduler::next_tick;
use bytes::Bytes;
use core::cell::RefCell;
use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use log::{debug, trace};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tokio::fs;
use tokio::runtime::Handle;

/// Extensions tried, in order, when a name has no file on disk as given.
pub const KNOWN_EXTENSIONS: [&str; 6] = ["json", "png", "jpg", "jpeg", "webp", "txt"];

/// Asynchronous load-by-name of bundled assets.
pub trait Bundle {
    /// Start loading `name`; resolves to `None` when the bundle has no such asset.
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Option<Bytes>>;
}

impl<B: Bundle + ?Sized> Bundle for Rc<B> {
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Option<Bytes>> {
        (**self).load(name)
    }
}

/// In-memory bundle. Every load takes one scheduler tick.
#[derive(Clone, Default)]
pub struct MemoryBundle {
    assets: Rc<RefCell<HashMap<String, Bytes>>>,
    loads: Rc<RefCell<HashMap<String, u32>>>,
}

impl MemoryBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        self.assets.borrow_mut().insert(name.into(), data.into());
    }

    pub fn remove(&self, name: &str) -> Option<Bytes> {
        self.assets.borrow_mut().remove(name)
    }

    /// Loads requested for `name` so far, hits and misses alike.
    pub fn load_count(&self, name: &str) -> u32 {
        self.loads.borrow().get(name).copied().unwrap_or_default()
    }

    /// Loads requested for any name so far.
    pub fn total_loads(&self) -> u32 {
        self.loads.borrow().values().sum()
    }
}

impl Bundle for MemoryBundle {
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Option<Bytes>> {
        *self.loads.borrow_mut().entry(name.to_owned()).or_default() += 1;
        let found = self.assets.borrow().get(name).cloned();
        trace!("memory bundle load `{name}` (hit: {})", found.is_some());
        async move {
            next_tick().await;
            found
        }
        .boxed_local()
    }
}

/// Bundle backed by a directory, read on a tokio runtime.
pub struct DirBundle {
    root: PathBuf,
    handle: Handle,
}

impl DirBundle {
    pub fn new(root: impl Into<PathBuf>, handle: Handle) -> Self {
        Self {
            root: root.into(),
            handle,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let exact = self.root.join(name);
        let mut paths = Vec::with_capacity(KNOWN_EXTENSIONS.len() + 1);
        paths.push(exact.clone());
        for extension in KNOWN_EXTENSIONS {
            paths.push(exact.with_extension(extension));
        }
        paths
    }
}

impl Bundle for DirBundle {
    fn load(&self, name: &str) -> LocalBoxFuture<'static, Option<Bytes>> {
        let candidates = self.candidates(name);
        let name = name.to_owned();
        let read = self.handle.spawn(async move {
            for path in candidates {
                match fs::read(&path).await {
                    Ok(data) => {
                        debug!("bundle `{name}` read from {}", path.display());
                        return Some(Bytes::from(data));
                    }
                    Err(err) => trace!("bundle candidate {} skipped: {err}", path.display()),
                }
            }
            None
        });
        async move { read.await.ok().flatten() }.boxed_local()
    }
}
