use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Faults raised by the container and boot machinery, as opposed to
/// request-time [`Exception`](crate::exception::Exception)s.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Dependency not found: {type_name}")]
    DependencyNotFound { type_name: String },

    #[error("Failed to downcast type: {type_name}")]
    DowncastFailed { type_name: String },

    #[error("Module registration failed: {message}")]
    ModuleRegistrationFailed { message: String },

    #[error("No HTTP adapter has been set on the container")]
    AdapterMissing,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn dependency_not_found<T: ?Sized>() -> Self {
        Self::DependencyNotFound {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }

    pub fn downcast_failed<T: ?Sized>() -> Self {
        Self::DowncastFailed {
            type_name: std::any::type_name::<T>().to_string(),
        }
    }
}
