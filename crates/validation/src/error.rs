//! Validation error types and the per-column message container

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ValidationResult<T> = Result<T, ValidationErrors>;

/// Placeholder replaced by the message text in formatted output
const MESSAGE_PLACEHOLDER: &str = ":msg";

/// A single failed rule for a column
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationError {
    /// The column that failed validation
    pub field: String,
    /// Human-readable error message
    pub message: String,
    /// Rule code for programmatic handling
    pub code: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: "validation_failed".to_string(),
        }
    }

    pub fn with_code(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: code.into(),
        }
    }

    /// Render the message through a template such as `"<li>:msg</li>"`
    pub fn format(&self, template: &str) -> String {
        template.replace(MESSAGE_PLACEHOLDER, &self.message)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Collection of validation errors grouped by column.
///
/// Columns are kept in name order; messages for one column keep the order in
/// which the rules reported them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Error)]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<ValidationError>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors
            .entry(error.field.clone())
            .or_default()
            .push(error);
    }

    /// Add a plain message for a column
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.add(ValidationError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of columns with errors
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn total_errors(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }

    pub fn has_field_errors(&self, field: &str) -> bool {
        self.errors.get(field).is_some_and(|errors| !errors.is_empty())
    }

    pub fn get_field_errors(&self, field: &str) -> Option<&Vec<ValidationError>> {
        self.errors.get(field)
    }

    /// Every message for `field`, each rendered through `template`
    pub fn get(&self, field: &str, template: &str) -> Vec<String> {
        self.errors
            .get(field)
            .map(|errors| errors.iter().map(|e| e.format(template)).collect())
            .unwrap_or_default()
    }

    /// The first message for `field`, rendered through `template`
    pub fn first(&self, field: &str, template: &str) -> Option<String> {
        self.errors
            .get(field)
            .and_then(|errors| errors.first())
            .map(|e| e.format(template))
    }

    /// All messages of all columns, rendered through `template`
    pub fn all(&self, template: &str) -> Vec<String> {
        self.errors
            .values()
            .flatten()
            .map(|e| e.format(template))
            .collect()
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, errors) in other.errors {
            self.errors.entry(field).or_default().extend(errors);
        }
    }

    pub fn from_error(error: ValidationError) -> Self {
        let mut errors = Self::new();
        errors.add(error);
        errors
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "No validation errors");
        }
        write!(f, "Validation failed for {} field(s):", self.errors.len())?;
        for error in self.errors.values().flatten() {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self::from_error(error)
    }
}
