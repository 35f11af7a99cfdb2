use super::Container;
use crate::metadata::{Injectable, InjectionToken, ModuleDescriptor};
use crate::middleware::{MiddlewareConsumer, MiddlewareContext};
use std::collections::HashSet;
use std::sync::Arc;

/// Walks the module import graph from an entry module, registering every
/// module found into the container.
///
/// Registration happens before descending into a module's imports; a
/// visited set makes re-walks of shared or repeated subtrees no-ops.
pub struct ModuleScanner {
    container: Arc<Container>,
    middleware_context: Arc<MiddlewareContext>,
}

impl ModuleScanner {
    pub fn new(container: Arc<Container>, middleware_context: Arc<MiddlewareContext>) -> Self {
        Self {
            container,
            middleware_context,
        }
    }

    pub fn scan(&self, entry_module: &Arc<ModuleDescriptor>) {
        let mut visited = HashSet::new();
        self.scan_module(entry_module, &mut visited);
    }

    fn scan_module(&self, module: &Arc<ModuleDescriptor>, visited: &mut HashSet<InjectionToken>) {
        if !visited.insert(module.token()) {
            return;
        }

        self.container.register_module(module);
        self.harvest_middlewares(module);

        for imported in module.imports() {
            self.scan_module(imported, visited);
        }
    }

    /// Run the module's `configure` hook and move the declarations it made
    /// into the middleware context, keyed by the declaring module's name.
    fn harvest_middlewares(&self, module: &Arc<ModuleDescriptor>) {
        let Some(hook) = module.configure_hook() else {
            return;
        };

        let mut consumer = MiddlewareConsumer::new();
        hook(&mut consumer);
        let entries = consumer.into_entries();
        if !entries.is_empty() {
            tracing::debug!(
                module = module.name(),
                count = entries.len(),
                "registering module middleware"
            );
            self.middleware_context
                .add_module_middlewares(module.name(), entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::Exception;
    use crate::http::{HttpRequest, HttpResponse, RequestMethod};
    use crate::middleware::{Middleware, Next};
    use async_trait::async_trait;

    #[derive(Default)]
    struct RootModule;

    #[derive(Default)]
    struct SharedModule;

    #[derive(Default)]
    struct LeafModule;

    struct Noop;

    #[async_trait]
    impl Middleware for Noop {
        async fn handle(
            &self,
            _request: &HttpRequest,
            _response: &HttpResponse,
            next: Next<'_>,
        ) -> Result<(), Exception> {
            next.run().await
        }
    }

    fn scanner() -> (ModuleScanner, Arc<Container>, Arc<MiddlewareContext>) {
        let container = Arc::new(Container::new());
        let middleware_context = Arc::new(MiddlewareContext::new());
        (
            ModuleScanner::new(container.clone(), middleware_context.clone()),
            container,
            middleware_context,
        )
    }

    #[test]
    fn scan_registers_every_module_once() {
        let shared = ModuleDescriptor::builder::<SharedModule>()
            .import(ModuleDescriptor::builder::<LeafModule>().build())
            .build();
        // The shared module appears twice in the import sequence.
        let root = ModuleDescriptor::builder::<RootModule>()
            .import(shared.clone())
            .import(shared)
            .build();

        let (scanner, container, _) = scanner();
        scanner.scan(&root);

        let modules = container.get_modules();
        assert_eq!(modules.len(), 3);
        assert_eq!(modules[0].name(), "RootModule");
        assert_eq!(modules[1].name(), "SharedModule");
        assert_eq!(modules[2].name(), "LeafModule");
    }

    #[test]
    fn configure_hooks_feed_the_middleware_context() {
        let root = ModuleDescriptor::builder::<RootModule>()
            .configure(|consumer| {
                consumer
                    .apply(vec![Arc::new(Noop)])
                    .for_routes(["/users"]);
            })
            .build();

        let (scanner, _, middleware_context) = scanner();
        scanner.scan(&root);

        let matched = middleware_context.middlewares_for_route("/users/1", Some(RequestMethod::Get));
        assert_eq!(matched.len(), 1);
        let unmatched = middleware_context.middlewares_for_route("/orders", Some(RequestMethod::Get));
        assert!(unmatched.is_empty());
    }
}
