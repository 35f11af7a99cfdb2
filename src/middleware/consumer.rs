use super::{Middleware, MiddlewareConfiguration, RouteInfo};
use std::sync::Arc;

/// Collects a module's route-scoped middleware declarations.
///
/// Passed into a module's `configure` hook; the scanner drains the
/// accumulated configurations into the [`MiddlewareContext`]
/// (`crate::middleware::MiddlewareContext`) afterwards.
#[derive(Default)]
pub struct MiddlewareConsumer {
    configs: Vec<MiddlewareConfiguration>,
}

impl MiddlewareConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a declaration for one or more middleware; finish it with
    /// [`MiddlewareRouteConfigurer::for_routes`].
    pub fn apply(
        &mut self,
        middlewares: Vec<Arc<dyn Middleware>>,
    ) -> MiddlewareRouteConfigurer<'_> {
        MiddlewareRouteConfigurer {
            middlewares,
            configs: &mut self.configs,
        }
    }

    pub fn configs(&self) -> &[MiddlewareConfiguration] {
        &self.configs
    }

    /// Flatten every declaration into (middleware, route) pairs, preserving
    /// declaration order.
    pub fn into_entries(self) -> Vec<(Arc<dyn Middleware>, RouteInfo)> {
        let mut entries = Vec::new();
        for config in self.configs {
            for route in &config.routes {
                for middleware in &config.middlewares {
                    entries.push((middleware.clone(), route.clone()));
                }
            }
        }
        entries
    }
}

/// Second half of the consumer's fluent API: binds pending middleware to
/// route patterns.
pub struct MiddlewareRouteConfigurer<'a> {
    middlewares: Vec<Arc<dyn Middleware>>,
    configs: &'a mut Vec<MiddlewareConfiguration>,
}

impl MiddlewareRouteConfigurer<'_> {
    pub fn for_routes<R>(self, routes: impl IntoIterator<Item = R>)
    where
        R: Into<RouteInfo>,
    {
        self.configs.push(MiddlewareConfiguration {
            middlewares: self.middlewares,
            routes: routes.into_iter().map(Into::into).collect(),
        });
    }
}
