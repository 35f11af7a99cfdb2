use super::{Middleware, Next};
use crate::exception::Exception;
use crate::http::{HttpRequest, HttpResponse};
use async_trait::async_trait;
use std::time::Instant;

/// Tags every response with an `x-request-id` header.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdMiddleware;

#[async_trait]
impl Middleware for RequestIdMiddleware {
    async fn handle(
        &self,
        _request: &HttpRequest,
        response: &HttpResponse,
        next: Next<'_>,
    ) -> Result<(), Exception> {
        let id = uuid::Uuid::new_v4();
        response.header("x-request-id", id.to_string());
        next.run().await
    }
}

/// Logs request timing and the final status.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
        next: Next<'_>,
    ) -> Result<(), Exception> {
        let start = Instant::now();
        tracing::debug!(method = %request.method, path = %request.path, "request started");

        let outcome = next.run().await;
        let elapsed = start.elapsed();
        match &outcome {
            Ok(()) => tracing::info!(
                method = %request.method,
                path = %request.path,
                status = response.status_code().as_u16(),
                ?elapsed,
                "request completed"
            ),
            Err(err) => tracing::warn!(
                method = %request.method,
                path = %request.path,
                error = %err,
                ?elapsed,
                "request failed in middleware chain"
            ),
        }
        outcome
    }
}
