mod context;

pub use context::GuardContext;

use crate::exception::Exception;
use crate::http::{HttpRequest, HttpResponse};
use async_trait::async_trait;

/// The per-request view handed to guards: request, response, and the
/// identity of the controller/handler about to run.
pub struct ExecutionContext {
    request: HttpRequest,
    response: HttpResponse,
    class_name: &'static str,
    handler_name: &'static str,
}

impl ExecutionContext {
    pub fn new(
        request: HttpRequest,
        response: HttpResponse,
        class_name: &'static str,
        handler_name: &'static str,
    ) -> Self {
        Self {
            request,
            response,
            class_name,
            handler_name,
        }
    }

    pub fn get_request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn get_response(&self) -> &HttpResponse {
        &self.response
    }

    /// Name of the controller the route belongs to.
    pub fn get_class(&self) -> &'static str {
        self.class_name
    }

    /// Name of the handler method about to be invoked.
    pub fn get_handler(&self) -> &'static str {
        self.handler_name
    }
}

/// A pre-handler check deciding whether a request may proceed.
///
/// Returning `Ok(false)` or `Err(_)` denies the request; an error is
/// normalized to a denial rather than propagated.
#[async_trait]
pub trait CanActivate: Send + Sync + 'static {
    async fn can_activate(&self, context: &ExecutionContext) -> Result<bool, Exception>;
}
