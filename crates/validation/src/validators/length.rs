//! Length validator for strings and arrays

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{ValidationError, ValidationResult};
use crate::traits::ValidationRule;

/// Inclusive length bounds; null values pass (pair with `RequiredValidator`)
#[derive(Debug, Clone, Default)]
pub struct LengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
    pub message: Option<String>,
}

impl LengthValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn length_of(value: &Value) -> Option<usize> {
        match value {
            Value::String(s) => Some(s.chars().count()),
            Value::Array(arr) => Some(arr.len()),
            _ => None,
        }
    }

    fn error_message(&self, field: &str) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        match (self.min, self.max) {
            (Some(min), Some(max)) if min == max => {
                format!("{} must be exactly {} characters long", field, min)
            }
            (Some(min), Some(max)) => {
                format!("{} must be between {} and {} characters long", field, min, max)
            }
            (Some(min), None) => format!("{} must be at least {} characters long", field, min),
            (None, Some(max)) => format!("{} must be at most {} characters long", field, max),
            (None, None) => format!("{} has an invalid length", field),
        }
    }
}

#[async_trait]
impl ValidationRule for LengthValidator {
    async fn validate(&self, value: &Value, field: &str) -> ValidationResult<()> {
        if value.is_null() {
            return Ok(());
        }

        let Some(length) = Self::length_of(value) else {
            return Err(ValidationError::with_code(
                field,
                format!("{} must be a string or array for length validation", field),
                "invalid_type",
            )
            .into());
        };

        let too_short = self.min.is_some_and(|min| length < min);
        let too_long = self.max.is_some_and(|max| length > max);
        if too_short || too_long {
            return Err(
                ValidationError::with_code(field, self.error_message(field), "length").into(),
            );
        }
        Ok(())
    }

    fn rule_name(&self) -> &'static str {
        "length"
    }
}
