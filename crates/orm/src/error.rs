//! Error types for the record-set layer
//!
//! Recoverable outcomes (nothing to save, no current row, missing primary key
//! on save/delete) are reported as `bool`/`Option` by the engine. The variants
//! below are for refused operations and collaborator failures.

use springy_validation::ValidationErrors;
use thiserror::Error;

/// Result type alias for record-set operations
pub type OrmResult<T> = Result<T, OrmError>;

#[derive(Debug, Clone, Error)]
pub enum OrmError {
    /// A bulk operation was refused because its filter renders to nothing
    #[error("Refusing to run without filter conditions")]
    AbortedEmptyFilter,

    /// The current row did not pass its validation rules
    #[error("{0}")]
    ValidationFailed(ValidationErrors),

    /// An operator key in a filter map is not recognised
    #[error("Invalid filter operator '{0}'")]
    InvalidFilterOperator(String),

    /// A condition operand has the wrong shape for its operator
    #[error("Invalid value for column '{column}': {reason}")]
    InvalidConditionValue { column: String, reason: String },

    /// Primary key columns are not configured or not populated
    #[error("Primary key is not defined for table '{table}'")]
    PrimaryKeyUndefined { table: String },

    /// The execution collaborator failed
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// Conditions were supplied in a shape the operation cannot use
    #[error("Unsupported condition type: {0}")]
    UnsupportedConditionType(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

impl OrmError {
    pub fn invalid_value(column: impl Into<String>, reason: impl Into<String>) -> Self {
        OrmError::InvalidConditionValue {
            column: column.into(),
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::QueryExecution(err.to_string())
    }
}

impl From<ValidationErrors> for OrmError {
    fn from(errors: ValidationErrors) -> Self {
        OrmError::ValidationFailed(errors)
    }
}
