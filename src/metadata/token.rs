use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// Unique identity of a module, provider, or controller.
///
/// Keyed by the marker type's `TypeId`, so two same-named types in different
/// modules never collide in the instance cache; the type name rides along
/// for diagnostics and the per-module provider listing.
#[derive(Debug, Clone, Copy)]
pub struct InjectionToken {
    id: TypeId,
    name: &'static str,
}

impl InjectionToken {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully-qualified type name.
    pub fn type_name(&self) -> &'static str {
        self.name
    }

    /// The bare type name, without module path.
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit("::").next().unwrap_or(self.name)
    }
}

impl PartialEq for InjectionToken {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InjectionToken {}

impl Hash for InjectionToken {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
