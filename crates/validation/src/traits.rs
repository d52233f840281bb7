//! Core validation traits

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::ValidationResult;

/// A single rule applied to one column value
#[async_trait]
pub trait ValidationRule: Send + Sync {
    /// Validate `value`, reporting failures against `field`
    async fn validate(&self, value: &Value, field: &str) -> ValidationResult<()>;

    /// Rule name used in logs and error codes
    fn rule_name(&self) -> &'static str;
}

/// Validates a whole row: `validate(data, rules) -> errors`
#[async_trait]
pub trait Validate: Send + Sync {
    async fn validate(&self, data: &Map<String, Value>) -> ValidationResult<()>;
}
