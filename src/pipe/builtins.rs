use super::{ArgumentMetadata, Metatype, PipeTransform};
use crate::exception::{Exception, RuntimeError, ValidationError, ValidationException};
use async_trait::async_trait;
use serde_json::Value;

/// Parses a string parameter into an integer.
///
/// A value that is already a number passes through; anything else is a type
/// error, which the built-in converter maps to 400.
#[derive(Debug, Default, Clone, Copy)]
pub struct ParseIntPipe;

#[async_trait]
impl PipeTransform for ParseIntPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, Exception> {
        if value.is_i64() || value.is_u64() {
            return Ok(value);
        }

        value
            .as_str()
            .and_then(|text| text.parse::<i64>().ok())
            .map(Value::from)
            .ok_or_else(|| {
                RuntimeError::type_error(format!("{} must be an integer", metadata.field_label()))
                    .into()
            })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ValidationOptions {
    /// When set, a missing value passes through unchanged instead of
    /// raising a required-field error.
    pub optional: bool,
}

/// Checks a parameter against its declared metatype.
///
/// Parameters without a declared metatype are never validated. A missing
/// value is `Null` or an empty object (an empty request body parses to
/// `{}`).
#[derive(Debug, Default)]
pub struct ValidationPipe {
    options: ValidationOptions,
}

impl ValidationPipe {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    fn is_missing(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::Object(fields) => fields.is_empty(),
            _ => false,
        }
    }
}

#[async_trait]
impl PipeTransform for ValidationPipe {
    async fn transform(&self, value: Value, metadata: &ArgumentMetadata) -> Result<Value, Exception> {
        let Some(metatype) = metadata.metatype else {
            return Ok(value);
        };

        if Self::is_missing(&value) {
            if self.options.optional {
                return Ok(value);
            }
            let field = metadata.field_label().to_string();
            return Err(ValidationException::new(
                vec![ValidationError::new(&field)
                    .constraint("required", format!("{field} is a required field"))],
                format!("{field} is a required field"),
            )
            .into());
        }

        if metatype == Metatype::Object && !value.is_object() {
            let field = metadata.field_label().to_string();
            return Err(ValidationException::new(
                vec![ValidationError::new(&field)
                    .with_value(value.clone())
                    .constraint("object", format!("{field} must be an object"))],
                format!("{field} must be an object"),
            )
            .into());
        }

        Ok(value)
    }
}
