//! Column rule sets

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::{ValidationErrors, ValidationResult};
use crate::traits::{Validate, ValidationRule};
use crate::validators::{EmailValidator, LengthValidator, RequiredValidator};

/// Rules keyed by column name.
///
/// Every column that has rules is checked, present in the row or not; a
/// missing column is validated as `null`.
#[derive(Clone, Default)]
pub struct Rules {
    field_rules: BTreeMap<String, Vec<Arc<dyn ValidationRule>>>,
}

impl std::fmt::Debug for Rules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rules")
            .field("validated_fields", &self.validated_fields())
            .finish()
    }
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for a column
    pub fn field<R>(mut self, field: impl Into<String>, rule: R) -> Self
    where
        R: ValidationRule + 'static,
    {
        self.field_rules
            .entry(field.into())
            .or_default()
            .push(Arc::new(rule));
        self
    }

    /// Required string column with optional length bounds
    pub fn required_string(
        self,
        field: impl Into<String>,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Self {
        let field = field.into();
        let rules = self.field(field.clone(), RequiredValidator::new());
        if min.is_none() && max.is_none() {
            return rules;
        }
        let mut length = LengthValidator::new();
        if let Some(min) = min {
            length = length.min(min);
        }
        if let Some(max) = max {
            length = length.max(max);
        }
        rules.field(field, length)
    }

    /// Required e-mail column
    pub fn required_email(self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.field(field.clone(), RequiredValidator::new())
            .field(field, EmailValidator::new())
    }

    pub fn is_empty(&self) -> bool {
        self.field_rules.is_empty()
    }

    pub fn validated_fields(&self) -> Vec<&str> {
        self.field_rules.keys().map(String::as_str).collect()
    }
}

#[async_trait]
impl Validate for Rules {
    async fn validate(&self, data: &Map<String, Value>) -> ValidationResult<()> {
        let mut errors = ValidationErrors::new();

        for (field, rules) in &self.field_rules {
            let value = data.get(field).unwrap_or(&Value::Null);
            for rule in rules {
                if let Err(rule_errors) = rule.validate(value, field).await {
                    errors.merge(rule_errors);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
