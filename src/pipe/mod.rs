pub mod builtins;
mod context;

pub use context::PipeContext;

use crate::exception::Exception;
use async_trait::async_trait;
use serde_json::Value;

/// Which section of the request a parameter is extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    Body,
    Query,
    Param,
    Custom,
}

/// Primitive shape a parameter is declared to have. Validation only runs
/// when a metatype is declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metatype {
    String,
    Boolean,
    Number,
    Array,
    Object,
}

/// Metadata handed to every pipe alongside the value being transformed.
#[derive(Debug, Clone)]
pub struct ArgumentMetadata {
    pub source: ParamSource,
    /// Key name within the source section, when one was declared.
    pub name: Option<String>,
    pub metatype: Option<Metatype>,
}

impl ArgumentMetadata {
    /// The field name for error messages, falling back to the source kind.
    pub fn field_label(&self) -> &str {
        self.name.as_deref().unwrap_or(match self.source {
            ParamSource::Body => "body",
            ParamSource::Query => "query",
            ParamSource::Param => "param",
            ParamSource::Custom => "custom",
        })
    }
}

/// A value-transformation/validation step applied to an extracted parameter.
///
/// Pipes signal invalid input by returning an error; the context never
/// catches it, propagation is the caller's responsibility.
#[async_trait]
pub trait PipeTransform: Send + Sync + 'static {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, Exception>;
}
