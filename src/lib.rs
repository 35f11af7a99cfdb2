//! # Nidus
//!
//! A miniature web framework kernel: dependency injection container, module
//! scanning, descriptor-driven route registration, middleware chains,
//! guards, pipes, and exception filters.
//!
//! Instead of decorators and reflection, every module, controller, and route
//! registers an explicit descriptor built at definition time; the boot
//! machinery wires them into a container and composes one asynchronous
//! handler per route.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nidus::prelude::*;
//! use serde_json::json;
//!
//! // 1. Define your service
//! #[derive(Default)]
//! pub struct UserService;
//!
//! impl UserService {
//!     pub fn find_one(&self, id: i64) -> serde_json::Value {
//!         json!({ "id": id, "name": format!("user-{id}") })
//!     }
//! }
//!
//! // 2. Define your controller: a marker type plus a descriptor
//! #[derive(Default)]
//! pub struct UserController {
//!     service: UserService,
//! }
//!
//! fn user_controller() -> Arc<ControllerDescriptor> {
//!     ControllerDescriptor::builder::<UserController>("/users")
//!         .route(
//!             RouteDescriptor::get("/:id", "get_user")
//!                 .param(ParamDescriptor::path(0, "id").pipe(ParseIntPipe))
//!                 .handler(|ctrl: Arc<UserController>, invocation| async move {
//!                     let id = invocation.args.arg(0).as_i64().unwrap_or_default();
//!                     Ok(ctrl.service.find_one(id))
//!                 })
//!                 .build(),
//!         )
//!         .build()
//! }
//!
//! // 3. Define your module
//! #[derive(Default)]
//! pub struct AppModule;
//!
//! fn app_module() -> Arc<ModuleDescriptor> {
//!     ModuleDescriptor::builder::<AppModule>()
//!         .provider(ProviderDescriptor::of::<UserService>())
//!         .controller(user_controller())
//!         .build()
//! }
//!
//! // 4. Bootstrap
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Exception> {
//!     let factory = Factory::new();
//!     let app = factory.create(app_module(), ApplicationOptions::default())?;
//!     app.listen(3000).await
//! }
//! ```

pub mod app;
pub mod config;
pub mod di;
pub mod error;
pub mod exception;
pub mod guard;
pub mod http;
pub mod metadata;
pub mod middleware;
pub mod pipe;
pub mod transport;

// Re-export core types
pub use app::{Application, ApplicationOptions, ExceptionsZone, Factory, Teardown};
pub use di::{Container, Injector, ModuleScanner};
pub use error::{CoreError, Result};
pub use exception::{Exception, HttpException};
pub use metadata::{ControllerDescriptor, ModuleDescriptor, ProviderDescriptor, RouteDescriptor};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use nidus::prelude::*;
/// ```
pub mod prelude {
    pub use crate::app::{Application, ApplicationOptions, ExceptionsZone, Factory, Teardown};
    pub use crate::config::ConfigService;
    pub use crate::di::{Container, Injector, ModuleScanner};
    pub use crate::error::{CoreError, Result};
    pub use crate::exception::{
        ArgumentsHost, BaseExceptionFilter, CatchScope, ErrorPayload, Exception, ExceptionFilter,
        ExceptionFilterContext, FilterRegistration, HttpException, LoggingExceptionFilter,
        RuntimeError, ValidationError, ValidationException,
    };
    pub use crate::guard::{CanActivate, ExecutionContext, GuardContext};
    pub use crate::http::{HttpRequest, HttpResponse, RequestMethod};
    pub use crate::metadata::{
        ControllerDescriptor, HandlerArgs, InjectionToken, Invocation, ModuleDescriptor,
        ParamDescriptor, ProviderDescriptor, RouteDescriptor,
    };
    pub use crate::middleware::builtins::{LoggingMiddleware, RequestIdMiddleware};
    pub use crate::middleware::{
        FnMiddleware, Middleware, MiddlewareConsumer, MiddlewareContext, Next, RouteInfo,
    };
    pub use crate::pipe::builtins::{ParseIntPipe, ValidationOptions, ValidationPipe};
    pub use crate::pipe::{ArgumentMetadata, Metatype, ParamSource, PipeContext, PipeTransform};
    pub use crate::transport::{HttpAdapter, HyperAdapter};
    pub use async_trait::async_trait;
    pub use http::StatusCode;
    pub use std::sync::Arc;
}
