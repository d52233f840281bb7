//! # springy-validation
//!
//! Validation collaborator for the Springy record-set engine. A `Rules` set maps
//! column names to rules and is evaluated against a row's column map before it
//! is persisted.

pub mod error;
pub mod rules;
pub mod traits;
pub mod validators;

pub use error::{ValidationError, ValidationErrors, ValidationResult};
pub use rules::Rules;
pub use traits::{Validate, ValidationRule};

pub use validators::{
    email::EmailValidator,
    length::LengthValidator,
    pattern::PatternValidator,
    required::RequiredValidator,
};
