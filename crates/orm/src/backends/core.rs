//! SQL execution seam and dialect handling

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::OrmResult;

/// Column name to value map of one fetched row
pub type ResultRow = Map<String, Value>;

/// Executes statements with `?` placeholders and exposes the last result.
///
/// One statement is in flight at a time: `execute` replaces whatever result
/// the previous statement left behind.
#[async_trait]
pub trait SqlExecutor: Send {
    /// Run a statement with its positional parameters
    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<()>;

    /// Remaining rows of the last statement
    async fn fetch_all(&mut self) -> OrmResult<Vec<ResultRow>>;

    /// Next row of the last statement
    async fn fetch_next(&mut self) -> OrmResult<Option<ResultRow>>;

    /// Rows affected by the last statement
    fn affected_rows(&self) -> u64;

    /// Key generated by the last INSERT, if any
    fn last_inserted_id(&self) -> Option<Value>;

    /// Driver name, e.g. `mysql`, `pgsql`, `sqlite`
    fn driver_name(&self) -> &str;
}

/// SQL dialect families, told apart by driver name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    MySql,
    PostgreSql,
    Oracle,
    SqlServer,
    Db2,
    Firebird,
    Informix,
    Sqlite,
    Other(String),
}

impl Dialect {
    pub fn from_driver_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "mysql" => Dialect::MySql,
            "pgsql" | "postgres" | "postgresql" => Dialect::PostgreSql,
            "oci" | "oracle" => Dialect::Oracle,
            "mssql" | "sqlsrv" => Dialect::SqlServer,
            "db2" | "ibm" | "ibm-db2" => Dialect::Db2,
            "firebird" => Dialect::Firebird,
            "informix" => Dialect::Informix,
            "sqlite" => Dialect::Sqlite,
            other => Dialect::Other(other.to_string()),
        }
    }

    /// SQL expression yielding the current timestamp.
    ///
    /// Unknown drivers get a quoted local timestamp literal.
    pub fn now_expression(&self) -> String {
        match self {
            Dialect::MySql | Dialect::PostgreSql | Dialect::Oracle => "NOW()".to_string(),
            Dialect::SqlServer => "GETDATE()".to_string(),
            Dialect::Db2 | Dialect::Firebird => "CURRENT_TIMESTAMP".to_string(),
            Dialect::Informix => "CURRENT".to_string(),
            Dialect::Sqlite => "datetime('now')".to_string(),
            Dialect::Other(_) => {
                format!("'{}'", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }

    /// Whether `SQL_CALC_FOUND_ROWS` / `FOUND_ROWS()` is available
    pub fn supports_found_rows(&self) -> bool {
        matches!(self, Dialect::MySql)
    }
}
