use super::{ArgumentMetadata, PipeTransform};
use crate::exception::Exception;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Registry of global pipes plus the chaining logic for applying them.
///
/// Constructed once at boot and shared by reference into the application;
/// the global list only grows, in registration order.
#[derive(Default)]
pub struct PipeContext {
    global_pipes: RwLock<Vec<Arc<dyn PipeTransform>>>,
}

impl PipeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_global_pipe(&self, pipe: Arc<dyn PipeTransform>) {
        self.global_pipes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pipe);
    }

    /// Run every global pipe in registration order, then every scoped pipe
    /// in declaration order, each transform receiving the previous stage's
    /// output. Errors propagate untouched.
    pub async fn apply_pipes(
        &self,
        value: Value,
        scoped_pipes: &[Arc<dyn PipeTransform>],
        metadata: &ArgumentMetadata,
    ) -> Result<Value, Exception> {
        let global: Vec<Arc<dyn PipeTransform>> = self
            .global_pipes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut transformed = value;
        for pipe in global.iter().chain(scoped_pipes) {
            transformed = pipe.transform(transformed, metadata).await?;
        }
        Ok(transformed)
    }
}
