pub mod builtins;
mod consumer;
mod context;

pub use consumer::{MiddlewareConsumer, MiddlewareRouteConfigurer};
pub use context::MiddlewareContext;

use crate::exception::Exception;
use crate::http::{HttpRequest, HttpResponse, RequestMethod};
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which routes a scoped middleware applies to.
///
/// A path matches when the request path starts with it; `"*"` and the empty
/// string match everything. An absent method matches any verb; a present
/// one matches case-insensitively.
#[derive(Debug, Clone)]
pub struct RouteInfo {
    pub path: String,
    pub method: Option<RequestMethod>,
}

impl RouteInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: None,
        }
    }

    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = Some(method);
        self
    }
}

impl From<&str> for RouteInfo {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl From<String> for RouteInfo {
    fn from(path: String) -> Self {
        Self::new(path)
    }
}

/// One `apply(...).for_routes(...)` declaration harvested from a module.
pub struct MiddlewareConfiguration {
    pub middlewares: Vec<Arc<dyn Middleware>>,
    pub routes: Vec<RouteInfo>,
}

/// The continuation a middleware must run for the chain to proceed.
///
/// Consuming `run` hands control to the rest of the chain. Dropping the
/// continuation without running it blocks the chain: no handler runs and
/// the pipeline aborts.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    index: usize,
    request: &'a HttpRequest,
    response: &'a HttpResponse,
    completed: &'a AtomicBool,
}

impl<'a> Next<'a> {
    pub(crate) fn start(
        chain: &'a [Arc<dyn Middleware>],
        request: &'a HttpRequest,
        response: &'a HttpResponse,
        completed: &'a AtomicBool,
    ) -> Self {
        Self {
            chain,
            index: 0,
            request,
            response,
            completed,
        }
    }

    pub async fn run(self) -> Result<(), Exception> {
        let Next {
            chain,
            index,
            request,
            response,
            completed,
        } = self;

        match chain.get(index) {
            None => {
                completed.store(true, Ordering::SeqCst);
                Ok(())
            }
            Some(middleware) => {
                let next = Next {
                    chain,
                    index: index + 1,
                    request,
                    response,
                    completed,
                };
                middleware.handle(request, response, next).await
            }
        }
    }
}

/// A pre-pipeline function given explicit continuation control.
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    async fn handle(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        next: Next<'_>,
    ) -> Result<(), Exception>;
}

pub type MiddlewareFuture<'a> = Pin<Box<dyn Future<Output = Result<(), Exception>> + Send + 'a>>;

/// Adapter turning a plain closure into a [`Middleware`].
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: for<'a> Fn(&'a HttpRequest, &'a HttpResponse, Next<'a>) -> MiddlewareFuture<'a>
        + Send
        + Sync
        + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a HttpRequest, &'a HttpResponse, Next<'a>) -> MiddlewareFuture<'a>
        + Send
        + Sync
        + 'static,
{
    async fn handle(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        next: Next<'_>,
    ) -> Result<(), Exception> {
        (self.f)(request, response, next).await
    }
}
