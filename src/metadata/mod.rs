//! Explicit metadata registry.
//!
//! Where the framework this reproduces attached annotations to classes and
//! read them back through reflection, here every module, controller, and
//! route registers an explicit descriptor built at definition time. The
//! descriptors are plain values; nothing is introspected at runtime.

mod controller;
mod module;
mod token;

pub use controller::{
    ControllerDescriptor, ControllerDescriptorBuilder, HandlerArgs, HandlerFuture, Invocation,
    ParamDescriptor, RouteDescriptor, RouteDescriptorBuilder, RouteHandlerFn,
};
pub use module::{ConfigureFn, ModuleDescriptor, ModuleDescriptorBuilder, ProviderDescriptor};
pub use token::InjectionToken;

use std::any::Any;
use std::sync::Arc;

/// Zero-argument instance construction.
///
/// Constructor dependency injection is deliberately unimplemented: factories
/// take no arguments, so a type that needs collaborators must reach them
/// some other way (or own defaults).
pub type InstanceFactory = Arc<dyn Fn() -> Arc<dyn Any + Send + Sync> + Send + Sync>;

/// Anything the container can place in its instance cache: a module, a
/// provider, or a controller descriptor.
pub trait Injectable: Send + Sync {
    fn token(&self) -> InjectionToken;

    fn name(&self) -> &'static str;

    fn instantiate(&self) -> Arc<dyn Any + Send + Sync>;
}
