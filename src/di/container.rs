use crate::error::{CoreError, Result};
use crate::metadata::{
    ControllerDescriptor, Injectable, InjectionToken, ModuleDescriptor, ProviderDescriptor,
};
use crate::transport::HttpAdapter;
use dashmap::DashMap;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Thread-safe dependency injection container.
///
/// Holds every registered module descriptor, a per-module name-to-provider
/// listing, and the single shared instance cache: one instance per token
/// for the process lifetime, created lazily on first request.
#[derive(Default)]
pub struct Container {
    modules: DashMap<InjectionToken, Arc<ModuleDescriptor>>,
    module_order: std::sync::Mutex<Vec<InjectionToken>>,
    providers: DashMap<InjectionToken, HashMap<&'static str, Arc<ProviderDescriptor>>>,
    instances: DashMap<InjectionToken, Arc<dyn Any + Send + Sync>>,
    http_adapter: OnceLock<Arc<dyn HttpAdapter>>,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module. Idempotent by token: registering the same module
    /// twice leaves the stored descriptor and provider mapping untouched.
    ///
    /// Provider names within one module collide last-write-wins; the
    /// instance cache is keyed by token, so only this listing is affected.
    pub fn register_module(&self, module: &Arc<ModuleDescriptor>) {
        if self.modules.contains_key(&module.token()) {
            return;
        }

        let mut providers: HashMap<&'static str, Arc<ProviderDescriptor>> = HashMap::new();
        for provider in module.providers() {
            if providers.insert(provider.name(), provider.clone()).is_some() {
                tracing::warn!(
                    module = module.name(),
                    provider = provider.name(),
                    "duplicate provider name in module, keeping the later registration"
                );
            }
        }

        self.providers.insert(module.token(), providers);
        self.modules.insert(module.token(), module.clone());
        self.module_order
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(module.token());
        tracing::debug!(module = module.name(), "module registered");
    }

    /// The name-to-provider mapping captured when the module was registered.
    pub fn get_providers(&self, token: InjectionToken) -> Vec<Arc<ProviderDescriptor>> {
        self.providers
            .get(&token)
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn get_provider_by_name(
        &self,
        token: InjectionToken,
        name: &str,
    ) -> Option<Arc<ProviderDescriptor>> {
        self.providers
            .get(&token)
            .and_then(|entry| entry.get(name).cloned())
    }

    pub fn get_controllers(&self, token: InjectionToken) -> Vec<Arc<ControllerDescriptor>> {
        self.modules
            .get(&token)
            .map(|module| module.controllers().to_vec())
            .unwrap_or_default()
    }

    /// Registered modules in registration order.
    pub fn get_modules(&self) -> Vec<Arc<ModuleDescriptor>> {
        self.module_order
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .filter_map(|token| self.modules.get(token).map(|entry| entry.clone()))
            .collect()
    }

    /// The cached instance for this descriptor's token, constructing it
    /// through the descriptor's zero-argument factory at most once.
    pub fn get_instance(&self, injectable: &dyn Injectable) -> Arc<dyn Any + Send + Sync> {
        self.instances
            .entry(injectable.token())
            .or_insert_with(|| {
                tracing::debug!(name = injectable.name(), "instantiating");
                injectable.instantiate()
            })
            .clone()
    }

    /// Typed view of the instance cache.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        let entry = self
            .instances
            .get(&InjectionToken::of::<T>())
            .ok_or_else(CoreError::dependency_not_found::<T>)?;
        entry
            .clone()
            .downcast::<T>()
            .map_err(|_| CoreError::downcast_failed::<T>())
    }

    /// Escape hatch for externally-constructed singletons.
    pub fn set_instance<T: Send + Sync + 'static>(&self, instance: T) {
        self.instances
            .insert(InjectionToken::of::<T>(), Arc::new(instance));
    }

    pub fn set_http_adapter(&self, adapter: Arc<dyn HttpAdapter>) {
        let _ = self.http_adapter.set(adapter);
    }

    pub fn http_adapter(&self) -> Result<Arc<dyn HttpAdapter>> {
        self.http_adapter
            .get()
            .cloned()
            .ok_or(CoreError::AdapterMissing)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
