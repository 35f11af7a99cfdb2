//! Framework-owned request/response model.
//!
//! The transport adapter translates wire-level messages into these types; the
//! pipeline stages (middleware, guards, pipes, handlers, exception filters)
//! only ever see them. The response is a shared handle so that any stage may
//! write it and later stages can observe that it has already been sent.

use http::StatusCode;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use strum_macros::{Display, EnumString};

/// HTTP verbs supported by the routing layer.
///
/// Renders lowercase (`get`, `post`, ...) so route keys match the
/// `"<verb> <path>"` convention of the transport adapter; parses
/// case-insensitively for method matching against route patterns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RequestMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

/// An incoming request after body collection and JSON parsing.
///
/// `body` is `Value::Null` when the request carried no payload. `params` is
/// filled by the transport's path-segment matching; `query` from the query
/// string.
#[derive(Debug, Clone, Default)]
pub struct HttpRequest {
    pub method: RequestMethod,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub params: HashMap<String, String>,
    pub body: Value,
}

impl HttpRequest {
    pub fn new(method: RequestMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug)]
struct ResponseState {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Option<Value>,
    sent: bool,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body: None,
            sent: false,
        }
    }
}

/// A cheaply-cloneable handle onto the response being built for one request.
///
/// Every stage of the pipeline holds the same underlying state; once any
/// stage calls [`HttpResponse::json`] the response counts as sent and later
/// writes are ignored.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    state: Arc<Mutex<ResponseState>>,
}

impl HttpResponse {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ResponseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the status code. Chainable: `res.status(code).json(body)`.
    pub fn status(&self, status: StatusCode) -> &Self {
        self.lock().status = status;
        self
    }

    pub fn header(&self, name: impl Into<String>, value: impl Into<String>) -> &Self {
        self.lock().headers.push((name.into(), value.into()));
        self
    }

    /// Write a JSON body and mark the response as sent.
    ///
    /// A second write is dropped: the first responder wins.
    pub fn json(&self, body: Value) {
        let mut state = self.lock();
        if state.sent {
            tracing::warn!("response already sent, dropping duplicate write");
            return;
        }
        state.body = Some(body);
        state.sent = true;
    }

    /// Whether some stage has already produced the response.
    pub fn headers_sent(&self) -> bool {
        self.lock().sent
    }

    pub fn status_code(&self) -> StatusCode {
        self.lock().status
    }

    /// Snapshot of the accumulated state, for the transport to render.
    pub fn to_parts(&self) -> (StatusCode, Vec<(String, String)>, Option<Value>) {
        let state = self.lock();
        (state.status, state.headers.clone(), state.body.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_renders_lowercase_and_parses_case_insensitively() {
        assert_eq!(RequestMethod::Get.to_string(), "get");
        assert_eq!("POST".parse::<RequestMethod>().unwrap(), RequestMethod::Post);
        assert_eq!("Delete".parse::<RequestMethod>().unwrap(), RequestMethod::Delete);
        assert!("connect".parse::<RequestMethod>().is_err());
    }

    #[test]
    fn response_tracks_sent_state() {
        let res = HttpResponse::new();
        assert!(!res.headers_sent());

        res.status(StatusCode::FORBIDDEN).json(json!({"message": "Forbidden"}));
        assert!(res.headers_sent());
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn first_write_wins() {
        let res = HttpResponse::new();
        res.json(json!({"first": true}));
        res.status(StatusCode::INTERNAL_SERVER_ERROR)
            .json(json!({"second": true}));

        let (_, _, body) = res.to_parts();
        assert_eq!(body.unwrap(), json!({"first": true}));
    }

    #[test]
    fn clones_share_state() {
        let res = HttpResponse::new();
        let other = res.clone();
        other.json(json!(null));
        assert!(res.headers_sent());
    }
}
