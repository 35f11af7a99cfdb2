use super::{Exception, HttpException};
use crate::http::{HttpRequest, HttpResponse};
use http::StatusCode;
use serde_json::json;
use std::sync::{Arc, OnceLock};

/// The per-request view handed to exception filters.
pub struct ArgumentsHost {
    request: HttpRequest,
    response: HttpResponse,
}

impl ArgumentsHost {
    pub fn new(request: HttpRequest, response: HttpResponse) -> Self {
        Self { request, response }
    }

    pub fn switch_to_http(&self) -> HttpArgumentsHost<'_> {
        HttpArgumentsHost { host: self }
    }
}

/// HTTP-flavored accessor over an [`ArgumentsHost`].
pub struct HttpArgumentsHost<'a> {
    host: &'a ArgumentsHost,
}

impl HttpArgumentsHost<'_> {
    pub fn request(&self) -> &HttpRequest {
        &self.host.request
    }

    pub fn response(&self) -> &HttpResponse {
        &self.host.response
    }
}

/// What a filter declares it catches.
///
/// `HttpAny` is the base-class special case: a filter declaring it matches
/// every HTTP exception subtype. `Http(status)` matches only the canonical
/// subclass with that status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchScope {
    HttpAny,
    Http(StatusCode),
    Validation,
    Runtime,
}

impl CatchScope {
    pub fn matches(&self, exception: &Exception) -> bool {
        match (self, exception) {
            (Self::HttpAny, Exception::Http(_)) => true,
            (Self::Http(status), Exception::Http(e)) => e.status() == *status,
            (Self::Validation, Exception::Validation(_)) => true,
            (Self::Runtime, Exception::Runtime(_)) => true,
            _ => false,
        }
    }
}

/// A handler selected by exception type to produce a custom error response.
///
/// Declaring no scopes means the filter catches everything. `catch` returns
/// `Ok(())` when the exception is handled, or `Err` to rethrow to the
/// fallback converter. A filter that returns `Ok(())` without sending a
/// response silently swallows the exception.
pub trait ExceptionFilter: Send + Sync + 'static {
    fn catch_scopes(&self) -> &[CatchScope] {
        &[]
    }

    fn catch(&self, exception: Exception, host: &ArgumentsHost) -> Result<(), Exception>;
}

enum RegistrationKind {
    Factory {
        create: Box<dyn Fn() -> Arc<dyn ExceptionFilter> + Send + Sync>,
        cell: OnceLock<Arc<dyn ExceptionFilter>>,
    },
    Instance(Arc<dyn ExceptionFilter>),
}

/// A filter attached to a controller or route.
///
/// Factory registrations are instantiated zero-argument the first time they
/// are resolved and cached for the process lifetime; pre-built instances are
/// reused as-is.
pub struct FilterRegistration {
    kind: RegistrationKind,
}

impl FilterRegistration {
    pub fn factory<F>(create: F) -> Self
    where
        F: Fn() -> Arc<dyn ExceptionFilter> + Send + Sync + 'static,
    {
        Self {
            kind: RegistrationKind::Factory {
                create: Box::new(create),
                cell: OnceLock::new(),
            },
        }
    }

    /// Register a filter type constructed via `Default` on first resolution.
    pub fn of<F: ExceptionFilter + Default>() -> Self {
        Self::factory(|| Arc::new(F::default()))
    }

    pub fn instance(filter: Arc<dyn ExceptionFilter>) -> Self {
        Self {
            kind: RegistrationKind::Instance(filter),
        }
    }

    pub fn resolve(&self) -> Arc<dyn ExceptionFilter> {
        match &self.kind {
            RegistrationKind::Factory { create, cell } => cell.get_or_init(|| create()).clone(),
            RegistrationKind::Instance(filter) => filter.clone(),
        }
    }
}

/// Catch-all filter writing the plain `{statusCode, message}` body.
#[derive(Default)]
pub struct BaseExceptionFilter;

impl ExceptionFilter for BaseExceptionFilter {
    fn catch(&self, exception: Exception, host: &ArgumentsHost) -> Result<(), Exception> {
        let response = host.switch_to_http().response().clone();
        if response.headers_sent() {
            return Ok(());
        }

        let (status, message) = match &exception {
            Exception::Http(e) => (e.status(), e.message()),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        response.status(status).json(json!({
            "statusCode": status.as_u16(),
            "message": message,
        }));
        Ok(())
    }
}

/// Logs HTTP exceptions with their request context, then rethrows so the
/// next handler in line produces the actual response.
#[derive(Default)]
pub struct LoggingExceptionFilter;

impl ExceptionFilter for LoggingExceptionFilter {
    fn catch_scopes(&self) -> &[CatchScope] {
        &[CatchScope::HttpAny]
    }

    fn catch(&self, exception: Exception, host: &ArgumentsHost) -> Result<(), Exception> {
        let http = host.switch_to_http();
        let request = http.request();

        if let Exception::Http(e) = &exception {
            tracing::error!(status = e.status().as_u16(), message = %e.message(), "http exception");
        }
        tracing::debug!(method = %request.method, path = %request.path, "failing request");

        Err(exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::{RuntimeError, ValidationException};
    use crate::http::RequestMethod;

    #[test]
    fn http_any_matches_every_http_subtype() {
        let scope = CatchScope::HttpAny;
        assert!(scope.matches(&Exception::Http(HttpException::not_found("x"))));
        assert!(scope.matches(&Exception::Http(HttpException::conflict("x"))));
        assert!(!scope.matches(&Exception::Runtime(RuntimeError::other("x"))));
    }

    #[test]
    fn status_scope_matches_only_its_subclass() {
        let scope = CatchScope::Http(StatusCode::NOT_FOUND);
        assert!(scope.matches(&Exception::Http(HttpException::not_found("x"))));
        assert!(!scope.matches(&Exception::Http(HttpException::bad_request("x"))));
    }

    #[test]
    fn factory_registration_instantiates_once() {
        let registration = FilterRegistration::of::<BaseExceptionFilter>();
        let first = registration.resolve();
        let second = registration.resolve();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn base_filter_writes_status_and_message() {
        let host = ArgumentsHost::new(
            HttpRequest::new(RequestMethod::Get, "/x"),
            HttpResponse::new(),
        );
        BaseExceptionFilter
            .catch(Exception::Http(HttpException::conflict("taken")), &host)
            .unwrap();

        let response = host.switch_to_http().response().clone();
        assert!(response.headers_sent());
        assert_eq!(response.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn logging_filter_rethrows() {
        let host = ArgumentsHost::new(
            HttpRequest::new(RequestMethod::Get, "/x"),
            HttpResponse::new(),
        );
        let result = LoggingExceptionFilter
            .catch(Exception::Http(HttpException::not_found("gone")), &host);
        assert!(result.is_err());
        assert!(!host.switch_to_http().response().headers_sent());
    }

    #[test]
    fn validation_scope_does_not_match_http() {
        let scope = CatchScope::Validation;
        assert!(scope.matches(&Exception::Validation(ValidationException::new(
            Vec::new(),
            "bad"
        ))));
        assert!(!scope.matches(&Exception::Http(HttpException::bad_request("x"))));
    }
}
