//! Keyed cache with at most one fetch in flight per key.
//!
//! The first requester for a missing key starts the fetch as a detached
//! scheduler task and becomes a waiter like everyone after it. Waiters re-poll
//! the shared outcome slot once per tick. A success is stored before any waiter
//! sees it; a failure is handed to every waiter and never stored, so the next
//! request for the key fetches again.

use crate::scheduler::{Spawner, next_tick};
use core::cell::RefCell;
use core::future::Future;
use core::hash::Hash;
use futures::FutureExt as _;
use futures::future::LocalBoxFuture;
use log::trace;
use loom_core::Result;
use std::collections::HashMap;
use std::rc::Rc;

type Slot<V> = Rc<RefCell<Option<Result<V>>>>;

struct CacheState<K, V> {
    entries: HashMap<K, V>,
    in_flight: HashMap<K, Slot<V>>,
    fetches: u64,
}

enum Claim<V> {
    Cached(V),
    Waiting(Slot<V>),
    Leader(Slot<V>),
}

/// In-flight-deduplicating cache shared by clones of the handle.
pub struct FetchCache<K, V> {
    state: Rc<RefCell<CacheState<K, V>>>,
    spawner: Spawner,
}

impl<K, V> Clone for FetchCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            spawner: self.spawner.clone(),
        }
    }
}

impl<K, V> FetchCache<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    pub fn new(spawner: Spawner) -> Self {
        Self {
            state: Rc::new(RefCell::new(CacheState {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
                fetches: 0,
            })),
            spawner,
        }
    }

    /// Cached value for `key`, without fetching.
    pub fn get(&self, key: &K) -> Option<V> {
        self.state.borrow().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.state.borrow().entries.contains_key(key)
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.state.borrow().in_flight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().entries.is_empty()
    }

    /// Underlying fetches started since construction.
    pub fn fetch_count(&self) -> u64 {
        self.state.borrow().fetches
    }

    pub fn insert(&self, key: K, value: V) {
        self.state.borrow_mut().entries.insert(key, value);
    }

    /// Drop every cached value. Fetches in flight still complete and store.
    pub fn clear(&self) {
        self.state.borrow_mut().entries.clear();
    }

    /// Cached value for `key`, fetching it with `fetch` if nobody else is.
    ///
    /// `fetch` is only invoked when this call starts the underlying fetch. The
    /// fetch keeps running if the returned future is dropped.
    ///
    /// # Errors
    /// Whatever the underlying fetch failed with, shared by every waiter.
    pub fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> LocalBoxFuture<'static, Result<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + 'static,
    {
        let slot = match self.claim(&key) {
            Claim::Cached(value) => return async move { Ok(value) }.boxed_local(),
            Claim::Waiting(slot) => slot,
            Claim::Leader(slot) => {
                self.spawner.spawn(settle(
                    Rc::clone(&self.state),
                    key,
                    Rc::clone(&slot),
                    fetch(),
                ));
                slot
            }
        };
        async move {
            loop {
                let outcome = slot.borrow().clone();
                if let Some(outcome) = outcome {
                    return outcome;
                }
                next_tick().await;
            }
        }
        .boxed_local()
    }

    fn claim(&self, key: &K) -> Claim<V> {
        let mut state = self.state.borrow_mut();
        if let Some(value) = state.entries.get(key) {
            return Claim::Cached(value.clone());
        }
        if let Some(slot) = state.in_flight.get(key) {
            return Claim::Waiting(Rc::clone(slot));
        }
        let slot = Rc::new(RefCell::new(None));
        state.in_flight.insert(key.clone(), Rc::clone(&slot));
        state.fetches += 1;
        Claim::Leader(slot)
    }
}

async fn settle<K, V, Fut>(state: Rc<RefCell<CacheState<K, V>>>, key: K, slot: Slot<V>, fetch: Fut)
where
    K: Eq + Hash,
    V: Clone,
    Fut: Future<Output = Result<V>>,
{
    let outcome = fetch.await;
    {
        let mut state = state.borrow_mut();
        state.in_flight.remove(&key);
        if let Ok(value) = &outcome {
            state.entries.insert(key, value.clone());
        } else {
            trace!("fetch failed; key left uncached");
        }
    }
    *slot.borrow_mut() = Some(outcome);
}
