use super::{ApplicationOptions, ExceptionsZone};
use crate::di::Container;
use crate::exception::{
    ArgumentsHost, Exception, ExceptionFilterContext, ExceptionHandler, HttpException,
    RuntimeError,
};
use crate::guard::{CanActivate, ExecutionContext, GuardContext};
use crate::http::{HttpRequest, HttpResponse};
use crate::metadata::{
    ControllerDescriptor, HandlerArgs, HandlerFuture, Injectable, Invocation, ParamDescriptor,
    RouteDescriptor,
};
use crate::middleware::MiddlewareContext;
use crate::pipe::{ArgumentMetadata, ParamSource, PipeContext};
use crate::transport::{ComposedHandler, HttpAdapter, ListenCallback};
use http::StatusCode;
use serde_json::{json, Value};
use std::any::Any;
use std::sync::Arc;

/// The running application: registers composed route handlers with the
/// transport adapter and owns the per-request pipeline.
///
/// The four stage registries are explicit objects handed in at construction;
/// there is no hidden global state.
pub struct Application {
    container: Arc<Container>,
    adapter: Arc<dyn HttpAdapter>,
    pipes: Arc<PipeContext>,
    guards: Arc<GuardContext>,
    middlewares: Arc<MiddlewareContext>,
    filters: Arc<ExceptionFilterContext>,
    options: ApplicationOptions,
}

impl Application {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        container: Arc<Container>,
        adapter: Arc<dyn HttpAdapter>,
        pipes: Arc<PipeContext>,
        guards: Arc<GuardContext>,
        middlewares: Arc<MiddlewareContext>,
        filters: Arc<ExceptionFilterContext>,
        options: ApplicationOptions,
    ) -> Self {
        Self {
            container,
            adapter,
            pipes,
            guards,
            middlewares,
            filters,
            options,
        }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    /// Walk every registered module's controllers and register one composed
    /// handler per route: `(verb, prefix + suffix)`.
    pub fn register_routes(&self) {
        for module in self.container.get_modules() {
            for controller in self.container.get_controllers(module.token()) {
                let instance = self.container.get_instance(controller.as_ref());
                for route in controller.routes() {
                    let full_path = format!("{}{}", controller.prefix(), route.path());
                    let handler = self.create_route_handler(&controller, route, instance.clone());
                    self.adapter.register(route.method(), &full_path, handler);
                    tracing::info!(
                        method = %route.method(),
                        path = %full_path,
                        controller = controller.name(),
                        handler = route.handler_name(),
                        "route mapped"
                    );
                }
            }
        }
    }

    /// Serve on the transport adapter inside a guarded zone driven by the
    /// boot options.
    pub async fn listen(&self, port: u16) -> Result<(), Exception> {
        let callback: ListenCallback = Box::new(move || {
            tracing::info!(port, "application is running");
        });
        let adapter = self.adapter.clone();
        ExceptionsZone::async_run(
            adapter.listen(port, Some(callback)),
            self.options.teardown(),
            self.options.auto_flush_logs,
        )
        .await
        .map(|_| ())
    }

    fn create_route_handler(
        &self,
        controller: &Arc<ControllerDescriptor>,
        route: &Arc<RouteDescriptor>,
        instance: Arc<dyn Any + Send + Sync>,
    ) -> ComposedHandler {
        let pipeline = Arc::new(RoutePipeline {
            controller: controller.clone(),
            route: route.clone(),
            instance,
            pipes: self.pipes.clone(),
            guards: self.guards.clone(),
            middlewares: self.middlewares.clone(),
            exception_handler: self.filters.create_exception_handler(controller, route),
            options: self.options,
        });

        Arc::new(move |request, response| {
            let pipeline = pipeline.clone();
            Box::pin(async move { pipeline.execute(request, response).await }) as HandlerFuture
        })
    }
}

/// Everything one route needs at dispatch time, captured at registration.
struct RoutePipeline {
    controller: Arc<ControllerDescriptor>,
    route: Arc<RouteDescriptor>,
    instance: Arc<dyn Any + Send + Sync>,
    pipes: Arc<PipeContext>,
    guards: Arc<GuardContext>,
    middlewares: Arc<MiddlewareContext>,
    exception_handler: ExceptionHandler,
    options: ApplicationOptions,
}

impl RoutePipeline {
    async fn execute(&self, request: HttpRequest, response: HttpResponse) -> Result<Value, Exception> {
        match self.dispatch(&request, &response).await {
            Ok(value) => Ok(value),
            Err(exception) => self.handle_exception(exception, request, response),
        }
    }

    /// Stages 1-4, strictly ordered; each may short-circuit the rest.
    async fn dispatch(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<Value, Exception> {
        let chain = self
            .middlewares
            .middlewares_for_route(&request.path, Some(request.method));
        let proceed = self.middlewares.apply(&chain, request, response).await;
        if !proceed || response.headers_sent() {
            return Ok(Value::Null);
        }

        let context = ExecutionContext::new(
            request.clone(),
            response.clone(),
            self.controller.name(),
            self.route.handler_name(),
        );
        let scoped: Vec<Arc<dyn CanActivate>> = self
            .controller
            .guards()
            .iter()
            .chain(self.route.guards())
            .cloned()
            .collect();
        if !self.guards.apply_guards(&scoped, &context).await {
            response
                .status(StatusCode::FORBIDDEN)
                .json(json!({"message": "Forbidden"}));
            return Ok(Value::Null);
        }

        let args = self.build_arguments(request).await?;

        let invocation = Invocation {
            args,
            request: request.clone(),
            response: response.clone(),
        };
        (self.route.handler())(self.instance.clone(), invocation).await
    }

    /// Extract each declared parameter from its request section, run it
    /// through the pipes, and place it at its index. Undeclared indices stay
    /// `Null`.
    async fn build_arguments(&self, request: &HttpRequest) -> Result<HandlerArgs, Exception> {
        let params = self.route.params();
        let arity = params.iter().map(|p| p.index() + 1).max().unwrap_or(0);
        let mut args = vec![Value::Null; arity];

        for param in params {
            let raw = extract_value(request, param);
            let metadata = ArgumentMetadata {
                source: param.source(),
                name: param.name_in_source().map(str::to_string),
                metatype: param.expected_metatype(),
            };
            let transformed = self.pipes.apply_pipes(raw, param.pipes(), &metadata).await?;
            args[param.index()] = transformed;
        }

        Ok(HandlerArgs::new(args))
    }

    /// Stage 5: offer the error to the route's filters, then fall back to
    /// the built-in converter, writing the canonical error body when the
    /// response is still unsent.
    fn handle_exception(
        &self,
        exception: Exception,
        request: HttpRequest,
        response: HttpResponse,
    ) -> Result<Value, Exception> {
        if self.options.auto_flush_logs {
            tracing::error!(
                error = %exception,
                controller = self.controller.name(),
                handler = self.route.handler_name(),
                "error while handling request"
            );
        }

        let host = ArgumentsHost::new(request, response.clone());
        match (self.exception_handler)(exception, &host) {
            Ok(()) => Ok(Value::Null),
            Err(unhandled) => {
                if !response.headers_sent() {
                    let http = convert_to_http_exception(&unhandled);
                    response.status(http.status()).json(json!({
                        "statusCode": http.status().as_u16(),
                        "message": http.message(),
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                    }));
                }
                if self.options.abort_on_error {
                    Err(unhandled)
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }
}

fn extract_value(request: &HttpRequest, param: &ParamDescriptor) -> Value {
    match param.source() {
        ParamSource::Body => match param.name_in_source() {
            Some(name) => request.body.get(name).cloned().unwrap_or(Value::Null),
            None => request.body.clone(),
        },
        ParamSource::Query => match param.name_in_source() {
            Some(name) => request
                .query
                .get(name)
                .map(|value| Value::String(value.clone()))
                .unwrap_or(Value::Null),
            None => serde_json::to_value(&request.query).unwrap_or_default(),
        },
        ParamSource::Param => match param.name_in_source() {
            Some(name) => request
                .params
                .get(name)
                .map(|value| Value::String(value.clone()))
                .unwrap_or(Value::Null),
            None => serde_json::to_value(&request.params).unwrap_or_default(),
        },
        ParamSource::Custom => Value::Null,
    }
}

/// Map any pipeline error onto the HTTP hierarchy: HTTP exceptions keep
/// their status, type mismatches become 400, validation failures 422,
/// everything else 500.
fn convert_to_http_exception(exception: &Exception) -> HttpException {
    match exception {
        Exception::Http(http) => http.clone(),
        Exception::Validation(validation) => {
            HttpException::unprocessable_entity(validation.message.clone())
        }
        Exception::Runtime(RuntimeError::Type(message)) => {
            HttpException::bad_request(message.clone())
        }
        Exception::Runtime(runtime) => HttpException::internal_server_error(runtime.to_string()),
    }
}
