//! HTTP GET seam with per-tick deadline checks.
//!
//! A [`Transport`] only starts requests. [`fetch_network`] owns the shared
//! request loop: it asks the caller's hooks for headers, polls the pending
//! response once per scheduler tick, aborts it when the deadline passes, and
//! hands the response to the caller's classifier.

use crate::scheduler::next_tick;
use bytes::Bytes;
use core::cell::{Cell, RefCell};
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use futures::FutureExt as _;
use futures::future::{LocalBoxFuture, pending};
use log::{debug, trace};
use loom_core::Error;
use reqwest::Client;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;

/// A finished HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub body: Bytes,
}

impl HttpResponse {
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// An HTTP request in progress.
///
/// Resolves to the response, or to a transport failure reason.
pub struct PendingResponse {
    inner: LocalBoxFuture<'static, Result<HttpResponse, String>>,
    abort: Option<Box<dyn FnOnce()>>,
}

impl PendingResponse {
    pub fn new<F>(inner: F, abort: Option<Box<dyn FnOnce()>>) -> Self
    where
        F: Future<Output = Result<HttpResponse, String>> + 'static,
    {
        Self {
            inner: inner.boxed_local(),
            abort,
        }
    }

    /// A response that is already known.
    pub fn ready(outcome: Result<HttpResponse, String>) -> Self {
        Self::new(async move { outcome }, None)
    }

    /// Tell the transport to stop working on this request.
    pub fn abort(mut self) {
        if let Some(abort) = self.abort.take() {
            abort();
        }
    }
}

impl Future for PendingResponse {
    type Output = Result<HttpResponse, String>;

    fn poll(mut self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(context)
    }
}

impl fmt::Debug for PendingResponse {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("PendingResponse")
            .field("abortable", &self.abort.is_some())
            .finish_non_exhaustive()
    }
}

/// Starts HTTP GET requests.
pub trait Transport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> PendingResponse;
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn get(&self, url: &str, headers: &[(String, String)]) -> PendingResponse {
        (**self).get(url, headers)
    }
}

/// `reqwest` transport running its requests on a tokio runtime.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
    handle: Handle,
}

impl ReqwestTransport {
    pub fn new(handle: Handle) -> Self {
        Self::with_client(Client::new(), handle)
    }

    pub const fn with_client(client: Client, handle: Handle) -> Self {
        Self { client, handle }
    }
}

impl Transport for ReqwestTransport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> PendingResponse {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        let url_final = url.to_owned();
        let (sender, receiver) = oneshot::channel();
        let task = self.handle.spawn(async move {
            let outcome = async {
                let response = request.send().await.map_err(|err| err.to_string())?;
                let status = response.status().as_u16();
                let body = response.bytes().await.map_err(|err| err.to_string())?;
                Ok::<_, String>(HttpResponse {
                    url: url_final,
                    status,
                    body,
                })
            }
            .await;
            if sender.send(outcome).is_err() {
                trace!("response receiver dropped before delivery");
            }
        });
        let abort_handle = task.abort_handle();
        PendingResponse::new(
            async move {
                receiver
                    .await
                    .unwrap_or_else(|_| Err(String::from("request task ended without a response")))
            },
            Some(Box::new(move || abort_handle.abort())),
        )
    }
}

/// Builds outgoing request headers for a URL.
pub type HeaderHook = Rc<dyn Fn(&str) -> Vec<(String, String)>>;
/// Accepts a response or explains why it is unusable.
pub type ClassifyHook = Rc<dyn Fn(&HttpResponse) -> Result<(), String>>;

/// Caller-supplied request customization.
#[derive(Clone)]
pub struct NetworkHooks {
    pub request_headers: HeaderHook,
    pub classify: ClassifyHook,
}

impl Default for NetworkHooks {
    fn default() -> Self {
        Self {
            request_headers: Rc::new(|_: &str| Vec::new()),
            classify: Rc::new(default_classify),
        }
    }
}

impl fmt::Debug for NetworkHooks {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_struct("NetworkHooks").finish_non_exhaustive()
    }
}

/// 2xx is success, anything else is rejected with its status line.
///
/// # Errors
/// The rejection reason for a non-2xx status.
pub fn default_classify(response: &HttpResponse) -> Result<(), String> {
    if response.is_success() {
        Ok(())
    } else {
        Err(format!("unexpected status {}", response.status))
    }
}

/// Run one GET against `transport`, polling once per tick.
///
/// The request starts immediately; the deadline counts from here.
///
/// # Errors
/// `NetworkTimeout` when `timeout` elapses first (the request is aborted),
/// `NetworkError` for transport failures and rejected responses.
pub fn fetch_network(
    transport: &dyn Transport,
    hooks: &NetworkHooks,
    url: &str,
    timeout: Option<Duration>,
) -> LocalBoxFuture<'static, Result<HttpResponse, Error>> {
    let headers = (hooks.request_headers)(url);
    let classify = Rc::clone(&hooks.classify);
    let url = url.to_owned();
    let started = Instant::now();
    let mut pending = transport.get(&url, &headers);
    async move {
        let outcome = loop {
            if let Some(outcome) = (&mut pending).now_or_never() {
                break outcome;
            }
            if let Some(limit) = timeout.filter(|limit| started.elapsed() >= *limit) {
                pending.abort();
                return Err(Error::NetworkTimeout {
                    url,
                    timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                });
            }
            next_tick().await;
        };
        let response = outcome.map_err(|reason| Error::NetworkError {
            url: url.clone(),
            status: None,
            reason,
        })?;
        classify(&response).map_err(|reason| Error::NetworkError {
            url: url.clone(),
            status: Some(response.status),
            reason,
        })?;
        debug!(
            "fetched {url} ({} bytes) in {:?}",
            response.body.len(),
            started.elapsed()
        );
        Ok(response)
    }
    .boxed_local()
}

#[derive(Clone)]
enum Route {
    Respond { status: u16, body: Bytes, ticks: u32 },
    Fail(String),
    Hang,
}

/// Transport answering from a fixed script, for tests and offline runs.
///
/// Unscripted URLs answer 404.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    routes: Rc<RefCell<HashMap<String, Route>>>,
    requests: Rc<RefCell<Vec<(String, Vec<(String, String)>)>>>,
    aborted: Rc<Cell<u32>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, status: u16, body: impl Into<Bytes>) {
        self.respond_after(url, 0, status, body);
    }

    /// Answer after `ticks` extra scheduler ticks.
    pub fn respond_after(&self, url: &str, ticks: u32, status: u16, body: impl Into<Bytes>) {
        self.routes.borrow_mut().insert(
            url.to_owned(),
            Route::Respond {
                status,
                body: body.into(),
                ticks,
            },
        );
    }

    /// Fail at the transport level.
    pub fn fail(&self, url: &str, reason: &str) {
        self.routes
            .borrow_mut()
            .insert(url.to_owned(), Route::Fail(reason.to_owned()));
    }

    /// Never answer.
    pub fn hang(&self, url: &str) {
        self.routes.borrow_mut().insert(url.to_owned(), Route::Hang);
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(requested, _)| requested == url)
            .count()
    }

    /// Headers sent with the latest request for `url`.
    pub fn last_headers(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.requests
            .borrow()
            .iter()
            .rev()
            .find(|(requested, _)| requested == url)
            .map(|(_, headers)| headers.clone())
    }

    /// Requests aborted by their callers.
    pub fn aborted(&self) -> u32 {
        self.aborted.get()
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, url: &str, headers: &[(String, String)]) -> PendingResponse {
        self.requests
            .borrow_mut()
            .push((url.to_owned(), headers.to_vec()));
        let route = self.routes.borrow().get(url).cloned();
        let aborted = Rc::clone(&self.aborted);
        let abort: Option<Box<dyn FnOnce()>> =
            Some(Box::new(move || aborted.set(aborted.get() + 1)));
        let url = url.to_owned();
        match route {
            Some(Route::Respond {
                status,
                body,
                ticks,
            }) => PendingResponse::new(
                async move {
                    for _ in 0..ticks {
                        next_tick().await;
                    }
                    Ok(HttpResponse { url, status, body })
                },
                abort,
            ),
            Some(Route::Fail(reason)) => PendingResponse::new(async move { Err(reason) }, abort),
            Some(Route::Hang) => PendingResponse::new(pending(), abort),
            None => PendingResponse::new(
                async move {
                    Ok(HttpResponse {
                        url,
                        status: 404,
                        body: Bytes::new(),
                    })
                },
                abort,
            ),
        }
    }
}
