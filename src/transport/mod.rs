//! Transport layer.
//!
//! The framework core treats the HTTP listener as an external collaborator
//! behind [`HttpAdapter`]: handlers register under a composite
//! `"<verb> <path>"` key, and the adapter owns socket handling, body
//! collection, and response serialization. [`server::HyperAdapter`] is the
//! bundled implementation.

mod server;

pub use server::HyperAdapter;

use crate::exception::Exception;
use crate::http::{HttpRequest, HttpResponse, RequestMethod};
use crate::metadata::HandlerFuture;
use async_trait::async_trait;
use std::sync::Arc;

/// A fully-composed route handler as registered by the application: the
/// whole pipeline behind one `(verb, path)` pair.
pub type ComposedHandler = Arc<dyn Fn(HttpRequest, HttpResponse) -> HandlerFuture + Send + Sync>;

/// Invoked once the listener is bound.
pub type ListenCallback = Box<dyn FnOnce() + Send>;

#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// Register a handler under `"<verb> <path>"`.
    fn register(&self, method: RequestMethod, path: &str, handler: ComposedHandler);

    fn get(&self, path: &str, handler: ComposedHandler) {
        self.register(RequestMethod::Get, path, handler);
    }

    fn post(&self, path: &str, handler: ComposedHandler) {
        self.register(RequestMethod::Post, path, handler);
    }

    fn put(&self, path: &str, handler: ComposedHandler) {
        self.register(RequestMethod::Put, path, handler);
    }

    fn delete(&self, path: &str, handler: ComposedHandler) {
        self.register(RequestMethod::Delete, path, handler);
    }

    fn patch(&self, path: &str, handler: ComposedHandler) {
        self.register(RequestMethod::Patch, path, handler);
    }

    /// Bind the listener and serve until the task is dropped. The callback
    /// fires once the socket is bound.
    async fn listen(&self, port: u16, callback: Option<ListenCallback>) -> Result<(), Exception>;
}
