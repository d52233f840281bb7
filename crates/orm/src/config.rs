//! Environment-driven configuration for record sets and executors

use std::env;

use thiserror::Error;

use crate::backends::Dialect;
use crate::error::OrmError;

const DEFAULT_DRIVER: &str = "pgsql";
const DEFAULT_MAX_EMBED_DEPTH: u32 = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: '{value}', expected {expected}")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },

    #[error("Configuration validation failed for {field}: {reason}")]
    ValidationFailed { field: String, reason: String },
}

impl From<ConfigError> for OrmError {
    fn from(err: ConfigError) -> Self {
        OrmError::Configuration(err.to_string())
    }
}

/// Settings shared by every record set created through
/// [`RecordSet::with_config`](crate::model::RecordSet::with_config).
#[derive(Debug, Clone, PartialEq)]
pub struct OrmConfig {
    /// Connection string for [`PgExecutor::from_config`](crate::backends::postgres::PgExecutor::from_config)
    pub database_url: Option<String>,
    /// Driver name used to pick the SQL dialect
    pub driver: String,
    /// Refuse unfiltered queries
    pub abort_on_empty_filter: bool,
    /// Upper bound applied to requested embed depths
    pub max_embed_depth: u32,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            driver: DEFAULT_DRIVER.to_string(),
            abort_on_empty_filter: true,
            max_embed_depth: DEFAULT_MAX_EMBED_DEPTH,
        }
    }
}

impl OrmConfig {
    /// Load configuration from `DATABASE_URL`, `DB_DRIVER`,
    /// `ORM_ABORT_ON_EMPTY_FILTER` and `ORM_MAX_EMBED_DEPTH`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_source(|key| env::var(key).ok())
    }

    fn from_source<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|url| !url.is_empty());
        let driver = lookup("DB_DRIVER").unwrap_or_else(|| DEFAULT_DRIVER.to_string());

        let abort_on_empty_filter = match lookup("ORM_ABORT_ON_EMPTY_FILTER") {
            Some(value) => parse_bool("abort_on_empty_filter", &value)?,
            None => true,
        };

        let max_embed_depth = match lookup("ORM_MAX_EMBED_DEPTH") {
            Some(value) => value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                field: "max_embed_depth".to_string(),
                value,
                expected: "a non-negative integer".to_string(),
            })?,
            None => DEFAULT_MAX_EMBED_DEPTH,
        };

        let config = OrmConfig {
            database_url,
            driver,
            abort_on_empty_filter,
            max_embed_depth,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                field: "driver".to_string(),
                reason: "Driver name cannot be empty".to_string(),
            });
        }

        if let Some(url) = &self.database_url {
            if !url.contains("://") {
                return Err(ConfigError::ValidationFailed {
                    field: "database_url".to_string(),
                    reason: "Database URL must include a scheme".to_string(),
                });
            }
        }

        Ok(())
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::from_driver_name(&self.driver)
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            expected: "true or false".to_string(),
        }),
    }
}
