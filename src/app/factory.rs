use super::{Application, ApplicationOptions, ExceptionsZone};
use crate::di::{Container, Injector, ModuleScanner};
use crate::exception::{Exception, ExceptionFilter, ExceptionFilterContext};
use crate::guard::{CanActivate, GuardContext};
use crate::metadata::ModuleDescriptor;
use crate::middleware::{Middleware, MiddlewareContext};
use crate::pipe::{PipeContext, PipeTransform};
use crate::transport::{HttpAdapter, HyperAdapter};
use std::sync::Arc;

/// Creates and wires applications.
///
/// Owns the four stage registries so that global registrations made before
/// `create` are visible to every application it builds; the contexts are
/// handed into the [`Application`] by reference rather than living as
/// process-wide singletons.
#[derive(Default)]
pub struct Factory {
    pipe_context: Arc<PipeContext>,
    guard_context: Arc<GuardContext>,
    middleware_context: Arc<MiddlewareContext>,
    filter_context: Arc<ExceptionFilterContext>,
}

impl Factory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_global_pipes(&self, pipes: Vec<Arc<dyn PipeTransform>>) -> &Self {
        for pipe in pipes {
            self.pipe_context.add_global_pipe(pipe);
        }
        self
    }

    pub fn use_global_guards(&self, guards: Vec<Arc<dyn CanActivate>>) -> &Self {
        for guard in guards {
            self.guard_context.add_global_guard(guard);
        }
        self
    }

    pub fn use_global_middleware(&self, middlewares: Vec<Arc<dyn Middleware>>) -> &Self {
        for middleware in middlewares {
            self.middleware_context.add_global_middleware(middleware);
        }
        self
    }

    pub fn use_global_filters(&self, filters: Vec<Arc<dyn ExceptionFilter>>) -> &Self {
        for filter in filters {
            self.filter_context.add_global_filter(filter);
        }
        self
    }

    /// Boot an application on the bundled hyper transport.
    pub fn create(
        &self,
        entry_module: Arc<ModuleDescriptor>,
        options: ApplicationOptions,
    ) -> Result<Application, Exception> {
        self.create_with_adapter(entry_module, options, Arc::new(HyperAdapter::new()))
    }

    /// Boot against an externally-constructed transport adapter.
    ///
    /// Scanning and instantiation run inside a guarded zone: with
    /// `abort_on_error` a failure propagates out of here and boot stops,
    /// otherwise it is logged and absorbed.
    pub fn create_with_adapter(
        &self,
        entry_module: Arc<ModuleDescriptor>,
        options: ApplicationOptions,
        adapter: Arc<dyn HttpAdapter>,
    ) -> Result<Application, Exception> {
        let container = Arc::new(Container::new());
        container.set_http_adapter(adapter.clone());

        let scanner = ModuleScanner::new(container.clone(), self.middleware_context.clone());
        let injector = Injector::new(container.clone());

        ExceptionsZone::run(
            || {
                scanner.scan(&entry_module);
                injector.create_instances(&entry_module);
                Ok(())
            },
            options.teardown(),
            options.auto_flush_logs,
        )?;

        let app = Application::new(
            container,
            adapter,
            self.pipe_context.clone(),
            self.guard_context.clone(),
            self.middleware_context.clone(),
            self.filter_context.clone(),
            options,
        );
        app.register_routes();

        tracing::info!("application initialized");
        Ok(app)
    }
}
