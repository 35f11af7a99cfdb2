use super::Container;
use crate::metadata::{Injectable, InjectionToken, ModuleDescriptor};
use std::collections::HashSet;
use std::sync::Arc;

/// Eagerly instantiates every module, provider, and controller reachable
/// from the entry module.
///
/// Mirrors the scanner's traversal order and must run after scanning,
/// a boot-sequence ordering the caller is responsible for.
pub struct Injector {
    container: Arc<Container>,
}

impl Injector {
    pub fn new(container: Arc<Container>) -> Self {
        Self { container }
    }

    pub fn create_instances(&self, entry_module: &Arc<ModuleDescriptor>) {
        let mut visited = HashSet::new();
        self.create_module_instances(entry_module, &mut visited);
    }

    fn create_module_instances(
        &self,
        module: &Arc<ModuleDescriptor>,
        visited: &mut HashSet<InjectionToken>,
    ) {
        if !visited.insert(module.token()) {
            return;
        }

        self.container.get_instance(module.as_ref());

        for provider in self.container.get_providers(module.token()) {
            self.container.get_instance(provider.as_ref());
        }

        for controller in self.container.get_controllers(module.token()) {
            self.container.get_instance(controller.as_ref());
        }

        for imported in module.imports() {
            self.create_module_instances(imported, visited);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::di::ModuleScanner;
    use crate::metadata::{ControllerDescriptor, ProviderDescriptor};
    use crate::middleware::MiddlewareContext;

    #[derive(Default)]
    struct RootModule;

    #[derive(Default)]
    struct ChildModule;

    #[derive(Default)]
    struct RootService;

    #[derive(Default)]
    struct ChildService;

    #[derive(Default)]
    struct RootController;

    #[test]
    fn create_instances_reaches_everything() {
        let child = ModuleDescriptor::builder::<ChildModule>()
            .provider(ProviderDescriptor::of::<ChildService>())
            .build();
        let root = ModuleDescriptor::builder::<RootModule>()
            .provider(ProviderDescriptor::of::<RootService>())
            .controller(ControllerDescriptor::builder::<RootController>("").build())
            .import(child)
            .build();

        let container = Arc::new(Container::new());
        let scanner = ModuleScanner::new(container.clone(), Arc::new(MiddlewareContext::new()));
        scanner.scan(&root);

        Injector::new(container.clone()).create_instances(&root);

        assert!(container.resolve::<RootService>().is_ok());
        assert!(container.resolve::<ChildService>().is_ok());
        assert!(container.resolve::<RootController>().is_ok());
        assert!(container.resolve::<RootModule>().is_ok());
        assert!(container.resolve::<ChildModule>().is_ok());
    }

    #[test]
    fn instances_survive_repeat_traversals() {
        let root = ModuleDescriptor::builder::<RootModule>()
            .provider(ProviderDescriptor::of::<RootService>())
            .build();

        let container = Arc::new(Container::new());
        let scanner = ModuleScanner::new(container.clone(), Arc::new(MiddlewareContext::new()));
        scanner.scan(&root);

        let injector = Injector::new(container.clone());
        injector.create_instances(&root);
        let first = container.resolve::<RootService>().unwrap();
        injector.create_instances(&root);
        let second = container.resolve::<RootService>().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }
}
