use super::{ControllerDescriptor, Injectable, InjectionToken, InstanceFactory};
use crate::middleware::MiddlewareConsumer;
use std::any::Any;
use std::sync::Arc;

/// Hook through which a module contributes route-scoped middleware.
pub type ConfigureFn = Arc<dyn Fn(&mut MiddlewareConsumer) + Send + Sync>;

/// An injectable service registered by a module.
pub struct ProviderDescriptor {
    token: InjectionToken,
    factory: InstanceFactory,
}

impl ProviderDescriptor {
    pub fn new<T, F>(factory: F) -> Arc<Self>
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Arc::new(Self {
            token: InjectionToken::of::<T>(),
            factory: Arc::new(move || Arc::new(factory()) as Arc<dyn Any + Send + Sync>),
        })
    }

    /// Provider constructed through `Default`.
    pub fn of<T: Default + Send + Sync + 'static>() -> Arc<Self> {
        Self::new(T::default)
    }
}

impl Injectable for ProviderDescriptor {
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

/// A declared grouping of controllers, providers, and imported modules.
///
/// Built once at definition time; read-only afterwards. `imports` is an
/// ordered sequence and may repeat modules; registration is idempotent by
/// token, so duplicates are harmless.
pub struct ModuleDescriptor {
    token: InjectionToken,
    imports: Vec<Arc<ModuleDescriptor>>,
    controllers: Vec<Arc<ControllerDescriptor>>,
    providers: Vec<Arc<ProviderDescriptor>>,
    exports: Vec<InjectionToken>,
    configure: Option<ConfigureFn>,
    factory: InstanceFactory,
}

impl ModuleDescriptor {
    pub fn builder<M: Default + Send + Sync + 'static>() -> ModuleDescriptorBuilder {
        ModuleDescriptorBuilder {
            token: InjectionToken::of::<M>(),
            imports: Vec::new(),
            controllers: Vec::new(),
            providers: Vec::new(),
            exports: Vec::new(),
            configure: None,
            factory: Arc::new(|| Arc::new(M::default()) as Arc<dyn Any + Send + Sync>),
        }
    }

    pub fn imports(&self) -> &[Arc<ModuleDescriptor>] {
        &self.imports
    }

    pub fn controllers(&self) -> &[Arc<ControllerDescriptor>] {
        &self.controllers
    }

    pub fn providers(&self) -> &[Arc<ProviderDescriptor>] {
        &self.providers
    }

    /// Exported provider tokens. Carried for completeness; nothing consumes
    /// them downstream.
    pub fn exports(&self) -> &[InjectionToken] {
        &self.exports
    }

    pub fn configure_hook(&self) -> Option<&ConfigureFn> {
        self.configure.as_ref()
    }
}

impl Injectable for ModuleDescriptor {
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

pub struct ModuleDescriptorBuilder {
    token: InjectionToken,
    imports: Vec<Arc<ModuleDescriptor>>,
    controllers: Vec<Arc<ControllerDescriptor>>,
    providers: Vec<Arc<ProviderDescriptor>>,
    exports: Vec<InjectionToken>,
    configure: Option<ConfigureFn>,
    factory: InstanceFactory,
}

impl ModuleDescriptorBuilder {
    pub fn import(mut self, module: Arc<ModuleDescriptor>) -> Self {
        self.imports.push(module);
        self
    }

    pub fn controller(mut self, controller: Arc<ControllerDescriptor>) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn provider(mut self, provider: Arc<ProviderDescriptor>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn export(mut self, token: InjectionToken) -> Self {
        self.exports.push(token);
        self
    }

    /// Attach the middleware-consumer hook the scanner will invoke.
    pub fn configure<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut MiddlewareConsumer) + Send + Sync + 'static,
    {
        self.configure = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Arc<ModuleDescriptor> {
        Arc::new(ModuleDescriptor {
            token: self.token,
            imports: self.imports,
            controllers: self.controllers,
            providers: self.providers,
            exports: self.exports,
            configure: self.configure,
            factory: self.factory,
        })
    }
}
