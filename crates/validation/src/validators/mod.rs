//! Built-in column validators

pub mod email;
pub mod length;
pub mod pattern;
pub mod required;

pub use email::EmailValidator;
pub use length::LengthValidator;
pub use pattern::PatternValidator;
pub use required::RequiredValidator;
