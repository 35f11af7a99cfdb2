//! Exception taxonomy.
//!
//! Three kinds of failure flow through the request pipeline:
//! [`HttpException`] for intentional client-facing errors,
//! [`ValidationException`] for field-level constraint violations (distinct
//! from the HTTP hierarchy until explicitly converted), and [`RuntimeError`]
//! for everything else. [`Exception`] unifies them for propagation.

mod context;
mod filter;

pub use context::{ExceptionFilterContext, ExceptionHandler};
pub use filter::{
    ArgumentsHost, BaseExceptionFilter, CatchScope, ExceptionFilter, FilterRegistration,
    HttpArgumentsHost, LoggingExceptionFilter,
};

use http::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Response payload carried by an [`HttpException`]: a bare message or a
/// structured object.
#[derive(Debug, Clone)]
pub enum ErrorPayload {
    Message(String),
    Object(Value),
}

impl ErrorPayload {
    /// The human-readable message: the string itself, or the object's
    /// `message` field, or the whole object rendered as JSON.
    pub fn message(&self) -> String {
        match self {
            Self::Message(message) => message.clone(),
            Self::Object(object) => object
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| object.to_string()),
        }
    }
}

impl From<&str> for ErrorPayload {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for ErrorPayload {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<Value> for ErrorPayload {
    fn from(object: Value) -> Self {
        Self::Object(object)
    }
}

/// Base of the HTTP exception hierarchy: a status code plus a response
/// payload. The canonical constructors below fix the status/message pairs
/// the framework recognizes.
#[derive(Debug, Clone)]
pub struct HttpException {
    status: StatusCode,
    payload: ErrorPayload,
}

impl HttpException {
    pub fn new(payload: impl Into<ErrorPayload>, status: StatusCode) -> Self {
        Self {
            status,
            payload: payload.into(),
        }
    }

    /// Build the canonical exception for a status, with its stock message.
    pub fn from_status(status: StatusCode) -> Self {
        Self::new(Self::canonical_message(status), status)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn response(&self) -> &ErrorPayload {
        &self.payload
    }

    pub fn message(&self) -> String {
        self.payload.message()
    }

    pub fn bad_request(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::FORBIDDEN)
    }

    pub fn not_found(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::NOT_FOUND)
    }

    pub fn conflict(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::CONFLICT)
    }

    pub fn unprocessable_entity(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::UNPROCESSABLE_ENTITY)
    }

    pub fn internal_server_error(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn service_unavailable(payload: impl Into<ErrorPayload>) -> Self {
        Self::new(payload, StatusCode::SERVICE_UNAVAILABLE)
    }

    fn canonical_message(status: StatusCode) -> &'static str {
        match status {
            StatusCode::BAD_REQUEST => "Bad Request",
            StatusCode::UNAUTHORIZED => "Unauthorized",
            StatusCode::FORBIDDEN => "Forbidden",
            StatusCode::NOT_FOUND => "Not Found",
            StatusCode::CONFLICT => "Conflict",
            StatusCode::UNPROCESSABLE_ENTITY => "Unprocessable Entity",
            StatusCode::SERVICE_UNAVAILABLE => "Service Unavailable",
            _ => "Internal Server Error",
        }
    }
}

impl std::fmt::Display for HttpException {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for HttpException {}

/// One field-level constraint violation.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub property: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    pub constraints: HashMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<ValidationError>,
}

impl ValidationError {
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: None,
            constraints: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn constraint(mut self, name: impl Into<String>, message: impl Into<String>) -> Self {
        self.constraints.insert(name.into(), message.into());
        self
    }
}

/// Raised by validation pipes. Not an [`HttpException`]: the built-in
/// converter maps it to 422 only when no filter claimed it first.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationException {
    pub errors: Vec<ValidationError>,
    pub message: String,
}

impl ValidationException {
    pub fn new(errors: Vec<ValidationError>, message: impl Into<String>) -> Self {
        Self {
            errors,
            message: message.into(),
        }
    }
}

/// Generic runtime failures: type mismatches map to 400, the rest to 500.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("type error: {0}")]
    Type(String),

    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("{0}")]
    Other(String),
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Anything the pipeline can raise.
#[derive(Debug, Clone, Error)]
pub enum Exception {
    #[error("{0}")]
    Http(#[from] HttpException),

    #[error(transparent)]
    Validation(#[from] ValidationException),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl From<crate::error::CoreError> for Exception {
    fn from(err: crate::error::CoreError) -> Self {
        Self::Runtime(RuntimeError::Other(err.to_string()))
    }
}
