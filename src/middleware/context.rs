use super::{Middleware, Next, RouteInfo};
use crate::http::{HttpRequest, HttpResponse, RequestMethod};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

struct ScopedMiddleware {
    middleware: Arc<dyn Middleware>,
    route: RouteInfo,
}

/// Registry of global and module-scoped middleware, plus route resolution
/// and chain execution.
///
/// Module entries keep registration order: modules in the order the scanner
/// harvested them, entries within a module in declaration order.
#[derive(Default)]
pub struct MiddlewareContext {
    global_middlewares: RwLock<Vec<Arc<dyn Middleware>>>,
    module_middlewares: RwLock<Vec<(String, Vec<ScopedMiddleware>)>>,
}

impl MiddlewareContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.global_middlewares
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(middleware);
    }

    /// Register route-scoped middleware harvested from one module's
    /// `configure` hook.
    pub fn add_module_middlewares(
        &self,
        module_name: &str,
        entries: Vec<(Arc<dyn Middleware>, RouteInfo)>,
    ) {
        let mut modules = self
            .module_middlewares
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let entries = entries
            .into_iter()
            .map(|(middleware, route)| ScopedMiddleware { middleware, route });

        match modules.iter_mut().find(|(name, _)| name == module_name) {
            Some((_, existing)) => existing.extend(entries),
            None => modules.push((module_name.to_string(), entries.collect())),
        }
    }

    /// The ordered middleware list for a dispatch: every global middleware,
    /// then each module-scoped entry whose route info matches.
    pub fn middlewares_for_route(
        &self,
        path: &str,
        method: Option<RequestMethod>,
    ) -> Vec<Arc<dyn Middleware>> {
        let mut middlewares: Vec<Arc<dyn Middleware>> = self
            .global_middlewares
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let modules = self
            .module_middlewares
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, entries) in modules.iter() {
            for entry in entries {
                if route_matches(path, method, &entry.route) {
                    middlewares.push(entry.middleware.clone());
                }
            }
        }

        middlewares
    }

    /// Execute the chain. Returns `true` when every middleware ran its
    /// continuation through to the end; `false` ("blocked") when one errors
    /// or drops its continuation, in which case the pipeline must abort
    /// without assuming a response was sent.
    pub async fn apply(
        &self,
        middlewares: &[Arc<dyn Middleware>],
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> bool {
        let completed = AtomicBool::new(false);
        let outcome = Next::start(middlewares, request, response, &completed)
            .run()
            .await;

        match outcome {
            Ok(()) => {
                let reached_end = completed.load(Ordering::SeqCst);
                if !reached_end {
                    tracing::debug!(path = %request.path, "middleware chain stopped before its end");
                }
                reached_end
            }
            Err(err) => {
                tracing::error!(error = %err, path = %request.path, "middleware chain failed");
                false
            }
        }
    }
}

fn route_matches(path: &str, method: Option<RequestMethod>, info: &RouteInfo) -> bool {
    let path_matched = path.starts_with(&info.path) || info.path == "*" || info.path.is_empty();
    let method_matched = match (info.method, method) {
        (None, _) | (_, None) => true,
        (Some(declared), Some(actual)) => declared == actual,
    };
    path_matched && method_matched
}
