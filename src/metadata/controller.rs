use super::{Injectable, InjectionToken, InstanceFactory};
use crate::exception::{Exception, FilterRegistration, RuntimeError};
use crate::guard::CanActivate;
use crate::http::{HttpRequest, HttpResponse, RequestMethod};
use crate::pipe::{Metatype, ParamSource, PipeTransform};
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// How one handler parameter is produced: where to read it from, which key
/// inside that section (none = the whole section), and the pipes it passes
/// through afterwards.
pub struct ParamDescriptor {
    index: usize,
    source: ParamSource,
    name: Option<String>,
    metatype: Option<Metatype>,
    pipes: Vec<Arc<dyn PipeTransform>>,
}

impl ParamDescriptor {
    fn new(index: usize, source: ParamSource, name: Option<String>) -> Self {
        Self {
            index,
            source,
            name,
            metatype: None,
            pipes: Vec::new(),
        }
    }

    /// The request body, as a whole.
    pub fn body(index: usize) -> Self {
        Self::new(index, ParamSource::Body, None)
    }

    /// A named field of the request body.
    pub fn body_field(index: usize, name: impl Into<String>) -> Self {
        Self::new(index, ParamSource::Body, Some(name.into()))
    }

    pub fn query(index: usize, name: impl Into<String>) -> Self {
        Self::new(index, ParamSource::Query, Some(name.into()))
    }

    /// A path parameter.
    pub fn path(index: usize, name: impl Into<String>) -> Self {
        Self::new(index, ParamSource::Param, Some(name.into()))
    }

    /// A custom marker. Extraction yields `Null`; handlers reach the raw
    /// request/response through their [`Invocation`] instead.
    pub fn custom(index: usize) -> Self {
        Self::new(index, ParamSource::Custom, None)
    }

    pub fn metatype(mut self, metatype: Metatype) -> Self {
        self.metatype = Some(metatype);
        self
    }

    pub fn pipe<P: PipeTransform>(mut self, pipe: P) -> Self {
        self.pipes.push(Arc::new(pipe));
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn source(&self) -> ParamSource {
        self.source
    }

    pub fn name_in_source(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn expected_metatype(&self) -> Option<Metatype> {
        self.metatype
    }

    pub fn pipes(&self) -> &[Arc<dyn PipeTransform>] {
        &self.pipes
    }
}

/// Positionally-assembled handler arguments; indices never declared by a
/// parameter descriptor hold `Null`.
#[derive(Debug, Clone, Default)]
pub struct HandlerArgs {
    args: Vec<Value>,
}

impl HandlerArgs {
    pub fn new(args: Vec<Value>) -> Self {
        Self { args }
    }

    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Everything a handler invocation receives besides `self`: the transformed
/// arguments plus the raw request/response pair.
pub struct Invocation {
    pub args: HandlerArgs,
    pub request: HttpRequest,
    pub response: HttpResponse,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, Exception>> + Send>>;

/// Type-erased route handler. Every handler is uniformly deferred;
/// synchronous bodies are wrapped into an immediately-ready future by the
/// builder.
pub type RouteHandlerFn =
    Arc<dyn Fn(Arc<dyn Any + Send + Sync>, Invocation) -> HandlerFuture + Send + Sync>;

/// One exposed HTTP route: verb, path suffix, parameter plan, scoped guards
/// and filters, and the handler itself.
pub struct RouteDescriptor {
    method: RequestMethod,
    path: String,
    handler_name: &'static str,
    params: Vec<ParamDescriptor>,
    guards: Vec<Arc<dyn CanActivate>>,
    filters: Vec<FilterRegistration>,
    handler: RouteHandlerFn,
}

impl RouteDescriptor {
    pub fn builder(
        method: RequestMethod,
        path: impl Into<String>,
        handler_name: &'static str,
    ) -> RouteDescriptorBuilder {
        RouteDescriptorBuilder {
            method,
            path: path.into(),
            handler_name,
            params: Vec::new(),
            guards: Vec::new(),
            filters: Vec::new(),
            handler: None,
        }
    }

    pub fn get(path: impl Into<String>, handler_name: &'static str) -> RouteDescriptorBuilder {
        Self::builder(RequestMethod::Get, path, handler_name)
    }

    pub fn post(path: impl Into<String>, handler_name: &'static str) -> RouteDescriptorBuilder {
        Self::builder(RequestMethod::Post, path, handler_name)
    }

    pub fn put(path: impl Into<String>, handler_name: &'static str) -> RouteDescriptorBuilder {
        Self::builder(RequestMethod::Put, path, handler_name)
    }

    pub fn delete(path: impl Into<String>, handler_name: &'static str) -> RouteDescriptorBuilder {
        Self::builder(RequestMethod::Delete, path, handler_name)
    }

    pub fn patch(path: impl Into<String>, handler_name: &'static str) -> RouteDescriptorBuilder {
        Self::builder(RequestMethod::Patch, path, handler_name)
    }

    pub fn method(&self) -> RequestMethod {
        self.method
    }

    /// Path suffix, concatenated after the controller prefix at registration.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handler_name(&self) -> &'static str {
        self.handler_name
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn guards(&self) -> &[Arc<dyn CanActivate>] {
        &self.guards
    }

    pub fn filters(&self) -> &[FilterRegistration] {
        &self.filters
    }

    pub fn handler(&self) -> &RouteHandlerFn {
        &self.handler
    }
}

pub struct RouteDescriptorBuilder {
    method: RequestMethod,
    path: String,
    handler_name: &'static str,
    params: Vec<ParamDescriptor>,
    guards: Vec<Arc<dyn CanActivate>>,
    filters: Vec<FilterRegistration>,
    handler: Option<RouteHandlerFn>,
}

impl RouteDescriptorBuilder {
    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn guard(mut self, guard: Arc<dyn CanActivate>) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn filter(mut self, filter: FilterRegistration) -> Self {
        self.filters.push(filter);
        self
    }

    /// Attach the handler body. The closure receives the controller instance
    /// (downcast from the container's type-erased cache) and the
    /// [`Invocation`]; a mismatched instance type surfaces as a runtime type
    /// error at dispatch.
    pub fn handler<C, F, Fut>(mut self, handler: F) -> Self
    where
        C: Send + Sync + 'static,
        F: Fn(Arc<C>, Invocation) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Exception>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        self.handler = Some(Arc::new(
            move |instance: Arc<dyn Any + Send + Sync>, invocation: Invocation| {
                let handler = handler.clone();
                let instance = instance.downcast::<C>();
                Box::pin(async move {
                    let instance = instance.map_err(|_| {
                        Exception::from(RuntimeError::type_error(format!(
                            "route handler expected an instance of {}",
                            std::any::type_name::<C>()
                        )))
                    })?;
                    handler(instance, invocation).await
                }) as HandlerFuture
            },
        ));
        self
    }

    pub fn build(self) -> Arc<RouteDescriptor> {
        let handler = self.handler.unwrap_or_else(|| {
            let name = self.handler_name;
            Arc::new(move |_, _| {
                Box::pin(async move {
                    Err(Exception::from(RuntimeError::other(format!(
                        "route handler '{name}' was never attached"
                    ))))
                }) as HandlerFuture
            })
        });
        Arc::new(RouteDescriptor {
            method: self.method,
            path: self.path,
            handler_name: self.handler_name,
            params: self.params,
            guards: self.guards,
            filters: self.filters,
            handler,
        })
    }
}

/// A class whose methods are exposed as HTTP route handlers.
pub struct ControllerDescriptor {
    token: InjectionToken,
    prefix: String,
    routes: Vec<Arc<RouteDescriptor>>,
    guards: Vec<Arc<dyn CanActivate>>,
    filters: Vec<FilterRegistration>,
    factory: InstanceFactory,
}

impl ControllerDescriptor {
    pub fn builder<C: Default + Send + Sync + 'static>(
        prefix: impl Into<String>,
    ) -> ControllerDescriptorBuilder {
        ControllerDescriptorBuilder {
            token: InjectionToken::of::<C>(),
            prefix: prefix.into(),
            routes: Vec::new(),
            guards: Vec::new(),
            filters: Vec::new(),
            factory: Arc::new(|| Arc::new(C::default()) as Arc<dyn Any + Send + Sync>),
        }
    }

    /// Route prefix; the empty string means routes mount at the root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn routes(&self) -> &[Arc<RouteDescriptor>] {
        &self.routes
    }

    pub fn guards(&self) -> &[Arc<dyn CanActivate>] {
        &self.guards
    }

    pub fn filters(&self) -> &[FilterRegistration] {
        &self.filters
    }
}

impl Injectable for ControllerDescriptor {
    fn token(&self) -> InjectionToken {
        self.token
    }

    fn name(&self) -> &'static str {
        self.token.short_name()
    }

    fn instantiate(&self) -> Arc<dyn Any + Send + Sync> {
        (self.factory)()
    }
}

pub struct ControllerDescriptorBuilder {
    token: InjectionToken,
    prefix: String,
    routes: Vec<Arc<RouteDescriptor>>,
    guards: Vec<Arc<dyn CanActivate>>,
    filters: Vec<FilterRegistration>,
    factory: InstanceFactory,
}

impl ControllerDescriptorBuilder {
    pub fn route(mut self, route: Arc<RouteDescriptor>) -> Self {
        self.routes.push(route);
        self
    }

    /// Class-level guard, run before any method-level guard.
    pub fn guard(mut self, guard: Arc<dyn CanActivate>) -> Self {
        self.guards.push(guard);
        self
    }

    /// Class-level filter, consulted before method and global filters.
    pub fn filter(mut self, filter: FilterRegistration) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn build(self) -> Arc<ControllerDescriptor> {
        Arc::new(ControllerDescriptor {
            token: self.token,
            prefix: self.prefix,
            routes: self.routes,
            guards: self.guards,
            filters: self.filters,
            factory: self.factory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct UsersController;

    #[derive(Default)]
    struct OtherController;

    fn sample_route() -> Arc<RouteDescriptor> {
        RouteDescriptor::get("/users/:id", "get_user")
            .param(ParamDescriptor::path(0, "id"))
            .handler(|_ctrl: Arc<UsersController>, invocation| async move {
                Ok(json!({"id": invocation.args.arg(0)}))
            })
            .build()
    }

    #[tokio::test]
    async fn handler_receives_downcast_instance_and_args() {
        let route = sample_route();
        let instance: Arc<dyn std::any::Any + Send + Sync> = Arc::new(UsersController);
        let invocation = Invocation {
            args: HandlerArgs::new(vec![json!(42)]),
            request: HttpRequest::default(),
            response: HttpResponse::new(),
        };

        let result = (route.handler())(instance, invocation).await.unwrap();
        assert_eq!(result, json!({"id": 42}));
    }

    #[tokio::test]
    async fn handler_rejects_wrong_instance_type() {
        let route = sample_route();
        let instance: Arc<dyn std::any::Any + Send + Sync> = Arc::new(OtherController);
        let invocation = Invocation {
            args: HandlerArgs::default(),
            request: HttpRequest::default(),
            response: HttpResponse::new(),
        };

        let result = (route.handler())(instance, invocation).await;
        assert!(matches!(
            result,
            Err(Exception::Runtime(RuntimeError::Type(_)))
        ));
    }

    #[test]
    fn missing_arg_indices_read_as_null() {
        let args = HandlerArgs::new(vec![json!(1)]);
        assert_eq!(args.arg(0), json!(1));
        assert_eq!(args.arg(5), Value::Null);
    }

    #[test]
    fn controller_builder_assembles_descriptor() {
        let controller = ControllerDescriptor::builder::<UsersController>("/api")
            .route(sample_route())
            .build();

        assert_eq!(controller.prefix(), "/api");
        assert_eq!(controller.routes().len(), 1);
        assert_eq!(controller.name(), "UsersController");
        assert_eq!(controller.routes()[0].method(), RequestMethod::Get);
    }
}
