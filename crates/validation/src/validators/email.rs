//! E-mail format validator

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::{ValidationError, ValidationResult};
use crate::traits::ValidationRule;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9]([a-zA-Z0-9._%+-]*[a-zA-Z0-9])?@[a-zA-Z0-9]([a-zA-Z0-9.-]*[a-zA-Z0-9])?\.[a-zA-Z]{2,}$";

/// ASCII e-mail address with a top-level domain
#[derive(Debug, Clone, Default)]
pub struct EmailValidator {
    pub message: Option<String>,
}

impl EmailValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    fn is_valid(pattern: &Regex, email: &str) -> bool {
        let Some((local, domain)) = email.split_once('@') else {
            return false;
        };
        !local.is_empty()
            && local.len() <= 64
            && !domain.is_empty()
            && domain.len() <= 255
            && !email.contains("..")
            && pattern.is_match(email)
    }
}

#[async_trait]
impl ValidationRule for EmailValidator {
    async fn validate(&self, value: &Value, field: &str) -> ValidationResult<()> {
        if value.is_null() {
            return Ok(());
        }

        let pattern = Regex::new(EMAIL_PATTERN).map_err(|e| {
            ValidationError::with_code(field, format!("invalid e-mail pattern: {}", e), "email")
        })?;

        match value.as_str() {
            Some(email) if Self::is_valid(&pattern, email) => Ok(()),
            _ => {
                let message = self
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("{} must be a valid email address", field));
                Err(ValidationError::with_code(field, message, "email").into())
            }
        }
    }

    fn rule_name(&self) -> &'static str {
        "email"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_valid_addresses() {
        let validator = EmailValidator::new();
        for email in ["user@example.com", "first.last+tag@sub.example.org"] {
            assert!(validator.validate(&Value::from(email), "email").await.is_ok(), "{}", email);
        }
    }

    #[tokio::test]
    async fn test_invalid_addresses() {
        let validator = EmailValidator::new();
        for email in ["plain", "a@b", "@example.com", "a..b@example.com", "a@b@c.com"] {
            assert!(validator.validate(&Value::from(email), "email").await.is_err(), "{}", email);
        }
        assert!(validator.validate(&Value::from(5), "email").await.is_err());
    }
}
