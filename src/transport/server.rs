use super::{ComposedHandler, HttpAdapter, ListenCallback};
use crate::exception::{Exception, RuntimeError};
use crate::http::{HttpRequest, HttpResponse, RequestMethod};
use bytes::Bytes;
use dashmap::DashMap;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

struct RouteEntry {
    method: RequestMethod,
    path: String,
    handler: ComposedHandler,
}

/// HTTP/1 transport stub on hyper.
///
/// Routes live in a map keyed `"<verb> <path>"`. Lookup is exact-match
/// first; when that misses, registered paths containing `:segment` markers
/// are matched segment-wise and the captured values become
/// `request.params`. The request body is collected whole (unbounded) and
/// JSON-parsed when non-empty.
#[derive(Clone, Default)]
pub struct HyperAdapter {
    routes: Arc<DashMap<String, Arc<RouteEntry>>>,
}

impl HyperAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve connections on an already-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Exception> {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "connection accepted");
                    let adapter = self.clone();
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(move |request| {
                            let adapter = adapter.clone();
                            async move { adapter.handle(request).await }
                        });
                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            tracing::debug!(error = %err, "connection error");
                        }
                    });
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to accept connection");
                }
            }
        }
    }

    async fn handle(&self, request: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
        let (parts, body) = request.into_parts();

        let Ok(method) = parts.method.as_str().parse::<RequestMethod>() else {
            return Ok(json_response(
                StatusCode::NOT_FOUND,
                &json!({"message": "Not Found"}),
            ));
        };

        let path = parts.uri.path().to_string();
        let query = parse_query(parts.uri.query());
        let headers = parts
            .headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                return Ok(json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &json!({"message": err.to_string()}),
                ))
            }
        };
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(err) => {
                    return Ok(json_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &json!({"message": err.to_string()}),
                    ))
                }
            }
        };

        Ok(self.dispatch(method, path, headers, query, body).await)
    }

    /// Route lookup plus handler invocation on already-parsed request parts.
    async fn dispatch(
        &self,
        method: RequestMethod,
        path: String,
        headers: HashMap<String, String>,
        query: HashMap<String, String>,
        body: Value,
    ) -> Response<Full<Bytes>> {
        let Some((handler, params)) = self.match_route(method, &path) else {
            return json_response(StatusCode::NOT_FOUND, &json!({"message": "Not Found"}));
        };

        let request = HttpRequest {
            method,
            path,
            headers,
            query,
            params,
            body,
        };
        let response = HttpResponse::new();

        let result = handler(request, response.clone()).await;

        if response.headers_sent() {
            return render_sent(&response);
        }

        match result {
            Ok(value) => {
                let payload = if value.is_null() {
                    json!({"message": "success"})
                } else {
                    value
                };
                json_response(StatusCode::OK, &payload)
            }
            Err(err) => json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"message": err.to_string()}),
            ),
        }
    }

    fn match_route(
        &self,
        method: RequestMethod,
        path: &str,
    ) -> Option<(ComposedHandler, HashMap<String, String>)> {
        if let Some(entry) = self.routes.get(&route_key(method, path)) {
            return Some((entry.handler.clone(), HashMap::new()));
        }

        for entry in self.routes.iter() {
            if entry.method != method {
                continue;
            }
            if let Some(params) = pattern_params(&entry.path, path) {
                return Some((entry.handler.clone(), params));
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl HttpAdapter for HyperAdapter {
    fn register(&self, method: RequestMethod, path: &str, handler: ComposedHandler) {
        tracing::debug!(%method, path, "route registered");
        self.routes.insert(
            route_key(method, path),
            Arc::new(RouteEntry {
                method,
                path: path.to_string(),
                handler,
            }),
        );
    }

    async fn listen(&self, port: u16, callback: Option<ListenCallback>) -> Result<(), Exception> {
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| Exception::from(RuntimeError::other(err.to_string())))?;
        tracing::info!(%addr, "listening");

        if let Some(callback) = callback {
            callback();
        }

        self.serve(listener).await
    }
}

fn route_key(method: RequestMethod, path: &str) -> String {
    format!("{method} {path}")
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let Some(query) = query else {
        return map;
    };
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        match pair.split_once('=') {
            Some((name, value)) => map.insert(name.to_string(), value.to_string()),
            None => map.insert(pair.to_string(), String::new()),
        };
    }
    map
}

/// Segment-wise match of a `:name`-style registered path against a request
/// path. Returns the captured parameters, or `None` when the pattern has no
/// markers or the shapes differ.
fn pattern_params(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    if !pattern.contains(':') {
        return None;
    }

    let pattern_segments: Vec<&str> = pattern.split('/').collect();
    let path_segments: Vec<&str> = path.split('/').collect();
    if pattern_segments.len() != path_segments.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (expected, actual) in pattern_segments.iter().zip(&path_segments) {
        if let Some(name) = expected.strip_prefix(':') {
            params.insert(name.to_string(), actual.to_string());
        } else if expected != actual {
            return None;
        }
    }
    Some(params)
}

fn json_response(status: StatusCode, body: &Value) -> Response<Full<Bytes>> {
    let bytes = serde_json::to_vec(body).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(bytes)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn render_sent(response: &HttpResponse) -> Response<Full<Bytes>> {
    let (status, headers, body) = response.to_parts();
    let bytes = body
        .map(|value| serde_json::to_vec(&value).unwrap_or_default())
        .unwrap_or_default();

    let mut rendered = Response::new(Full::new(Bytes::from(bytes)));
    *rendered.status_mut() = status;
    rendered
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    for (name, value) in headers {
        match (
            name.parse::<HeaderName>(),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                rendered.headers_mut().insert(name, value);
            }
            _ => tracing::warn!(header = name, "dropping invalid response header"),
        }
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::HandlerFuture;
    use http_body_util::BodyExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn echo_params_handler() -> ComposedHandler {
        Arc::new(|request: HttpRequest, _response: HttpResponse| {
            Box::pin(async move { Ok(json!({"params": request.params, "body": request.body})) })
                as HandlerFuture
        })
    }

    async fn body_json(response: Response<Full<Bytes>>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn route_keys_are_verb_space_path() {
        assert_eq!(route_key(RequestMethod::Get, "/users"), "get /users");
        assert_eq!(route_key(RequestMethod::Patch, "/a/b"), "patch /a/b");
    }

    #[test]
    fn query_strings_split_into_pairs() {
        let parsed = parse_query(Some("a=1&b=two&flag"));
        assert_eq!(parsed["a"], "1");
        assert_eq!(parsed["b"], "two");
        assert_eq!(parsed["flag"], "");
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn pattern_matching_captures_segments() {
        let params = pattern_params("/users/:id/posts/:post", "/users/42/posts/7").unwrap();
        assert_eq!(params["id"], "42");
        assert_eq!(params["post"], "7");

        assert!(pattern_params("/users/:id", "/orders/42").is_none());
        assert!(pattern_params("/users/:id", "/users/42/extra").is_none());
        assert!(pattern_params("/users/list", "/users/list").is_none());
    }

    #[tokio::test]
    async fn unmatched_route_is_404() {
        let adapter = HyperAdapter::new();
        let response = adapter
            .dispatch(
                RequestMethod::Get,
                "/nope".to_string(),
                HashMap::new(),
                HashMap::new(),
                Value::Null,
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({"message": "Not Found"}));
    }

    #[tokio::test]
    async fn pattern_route_fills_params() {
        let adapter = HyperAdapter::new();
        adapter.get("/users/:id", echo_params_handler());

        let response = adapter
            .dispatch(
                RequestMethod::Get,
                "/users/42".to_string(),
                HashMap::new(),
                HashMap::new(),
                Value::Null,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["params"]["id"], "42");
    }

    #[tokio::test]
    async fn null_result_becomes_success_message() {
        let adapter = HyperAdapter::new();
        adapter.post(
            "/fire",
            Arc::new(|_request, _response| {
                Box::pin(async { Ok(Value::Null) }) as HandlerFuture
            }),
        );

        let response = adapter
            .dispatch(
                RequestMethod::Post,
                "/fire".to_string(),
                HashMap::new(),
                HashMap::new(),
                Value::Null,
            )
            .await;
        assert_eq!(body_json(response).await, json!({"message": "success"}));
    }

    #[tokio::test]
    async fn handler_error_with_nothing_sent_is_500() {
        let adapter = HyperAdapter::new();
        adapter.get(
            "/boom",
            Arc::new(|_request, _response| {
                Box::pin(async {
                    Err(Exception::from(RuntimeError::other("kaboom")))
                }) as HandlerFuture
            }),
        );

        let response = adapter
            .dispatch(
                RequestMethod::Get,
                "/boom".to_string(),
                HashMap::new(),
                HashMap::new(),
                Value::Null,
            )
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({"message": "kaboom"}));
    }

    #[tokio::test]
    async fn sent_response_is_rendered_verbatim() {
        let adapter = HyperAdapter::new();
        adapter.get(
            "/teapot",
            Arc::new(|_request, response: HttpResponse| {
                Box::pin(async move {
                    response
                        .status(StatusCode::IM_A_TEAPOT)
                        .header("x-kettle", "on");
                    response.json(json!({"short": true}));
                    Ok(Value::Null)
                }) as HandlerFuture
            }),
        );

        let response = adapter
            .dispatch(
                RequestMethod::Get,
                "/teapot".to_string(),
                HashMap::new(),
                HashMap::new(),
                Value::Null,
            )
            .await;
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(response.headers().get("x-kettle").unwrap(), "on");
        assert_eq!(body_json(response).await, json!({"short": true}));
    }

    #[tokio::test]
    async fn end_to_end_over_a_real_socket() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let adapter = HyperAdapter::new();
        adapter.get(
            "/ping",
            Arc::new(|_request, _response| {
                Box::pin(async { Ok(json!({"pong": true})) }) as HandlerFuture
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = adapter.clone();
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200"));
        assert!(raw.contains(r#"{"pong":true}"#));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 404"));
        assert!(raw.contains(r#"{"message":"Not Found"}"#));
    }
}
