//! Regular-expression validator

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::{ValidationError, ValidationResult};
use crate::traits::ValidationRule;

/// Matches the whole string value against a pattern
#[derive(Debug, Clone)]
pub struct PatternValidator {
    pattern: Regex,
    pub message: Option<String>,
}

impl PatternValidator {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self::from_regex(Regex::new(pattern)?))
    }

    pub fn from_regex(pattern: Regex) -> Self {
        Self {
            pattern,
            message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn pattern_string(&self) -> &str {
        self.pattern.as_str()
    }

    fn full_match(&self, text: &str) -> bool {
        self.pattern
            .find(text)
            .is_some_and(|m| m.start() == 0 && m.end() == text.len())
    }
}

#[async_trait]
impl ValidationRule for PatternValidator {
    async fn validate(&self, value: &Value, field: &str) -> ValidationResult<()> {
        if value.is_null() {
            return Ok(());
        }

        let Some(text) = value.as_str() else {
            return Err(ValidationError::with_code(
                field,
                format!("{} must be a string for pattern validation", field),
                "invalid_type",
            )
            .into());
        };

        if self.full_match(text) {
            return Ok(());
        }
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("{} does not match the required pattern", field));
        Err(ValidationError::with_code(field, message, "pattern_mismatch").into())
    }

    fn rule_name(&self) -> &'static str {
        "pattern"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pattern_requires_full_match() {
        let validator = PatternValidator::new(r"[a-z]+").unwrap();
        assert!(validator.validate(&Value::from("slug"), "slug").await.is_ok());
        assert!(validator.validate(&Value::from("slug-1"), "slug").await.is_err());
    }

    #[tokio::test]
    async fn test_pattern_custom_message() {
        let validator = PatternValidator::new(r"\d{5}").unwrap().message("Invalid zip");
        let errors = validator.validate(&Value::from("12"), "zip").await.unwrap_err();
        assert_eq!(errors.first("zip", ":msg").as_deref(), Some("Invalid zip"));
    }
}
