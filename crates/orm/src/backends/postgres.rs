//! PostgreSQL executor
//!
//! Runs statements on a single sqlx connection, translating `?` placeholders
//! into `$n` and buffering result rows as JSON maps.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgConnection, PgRow};
use sqlx::{Column, Connection, Postgres, Row as SqlxRow, TypeInfo};

use super::core::{ResultRow, SqlExecutor};
use crate::config::OrmConfig;
use crate::error::{OrmError, OrmResult};

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// [`SqlExecutor`] over one PostgreSQL connection
pub struct PgExecutor {
    conn: PgConnection,
    buffered: VecDeque<ResultRow>,
    affected: u64,
    last_id: Option<Value>,
}

impl std::fmt::Debug for PgExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgExecutor")
            .field("buffered", &self.buffered.len())
            .field("affected", &self.affected)
            .field("last_id", &self.last_id)
            .finish()
    }
}

impl PgExecutor {
    pub async fn connect(database_url: &str) -> OrmResult<Self> {
        let conn = PgConnection::connect(database_url)
            .await
            .map_err(|e| OrmError::Connection(format!("Failed to connect to PostgreSQL: {}", e)))?;
        tracing::info!("Connected to PostgreSQL");
        Ok(Self::from_connection(conn))
    }

    pub async fn from_config(config: &OrmConfig) -> OrmResult<Self> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| OrmError::Configuration("DATABASE_URL is not set".to_string()))?;
        Self::connect(url).await
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        Self {
            conn,
            buffered: VecDeque::new(),
            affected: 0,
            last_id: None,
        }
    }

    pub fn into_connection(self) -> PgConnection {
        self.conn
    }
}

#[async_trait]
impl SqlExecutor for PgExecutor {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<()> {
        let statement = numbered_placeholders(sql);
        self.buffered.clear();
        self.affected = 0;
        self.last_id = None;

        let mut query = sqlx::query(&statement);
        for param in params {
            query = bind_json_value(query, param);
        }

        if returns_rows(&statement) {
            let rows = query.fetch_all(&mut self.conn).await?;
            self.affected = rows.len() as u64;
            for row in &rows {
                self.buffered.push_back(row_to_map(row)?);
            }
        } else {
            let result = query.execute(&mut self.conn).await?;
            self.affected = result.rows_affected();
        }

        if first_keyword(&statement).eq_ignore_ascii_case("insert") {
            self.last_id = returned_key(self.buffered.front());
        }

        Ok(())
    }

    async fn fetch_all(&mut self) -> OrmResult<Vec<ResultRow>> {
        Ok(self.buffered.drain(..).collect())
    }

    async fn fetch_next(&mut self) -> OrmResult<Option<ResultRow>> {
        Ok(self.buffered.pop_front())
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn last_inserted_id(&self) -> Option<Value> {
        self.last_id.clone()
    }

    fn driver_name(&self) -> &str {
        "pgsql"
    }
}

/// Rewrite `?` markers outside quoted literals into `$1`, `$2`, ...
pub fn numbered_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut index = 0;
    let mut quote: Option<char> = None;

    for ch in sql.chars() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
                out.push(ch);
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    out.push(ch);
                }
                '?' => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
                _ => out.push(ch),
            },
        }
    }

    out
}

fn first_keyword(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or("")
}

/// First column of the row produced by `INSERT ... RETURNING`
fn returned_key(row: Option<&ResultRow>) -> Option<Value> {
    row.and_then(|columns| columns.values().next())
        .filter(|value| !value.is_null())
        .cloned()
}

fn returns_rows(sql: &str) -> bool {
    let keyword = first_keyword(sql);
    keyword.eq_ignore_ascii_case("select")
        || keyword.eq_ignore_ascii_case("with")
        || keyword.eq_ignore_ascii_case("show")
        || sql.to_lowercase().contains(" returning ")
}

fn bind_json_value<'q>(query: PgQuery<'q>, value: &Value) -> PgQuery<'q> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => query.bind(s.clone()),
        Value::Array(_) | Value::Object(_) => query.bind(sqlx::types::Json(value.clone())),
    }
}

fn row_to_map(row: &PgRow) -> OrmResult<ResultRow> {
    let mut map = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = column_to_json(row, index, column.type_info().name())?;
        map.insert(column.name().to_string(), value);
    }
    Ok(map)
}

fn column_to_json(row: &PgRow, index: usize, type_name: &str) -> OrmResult<Value> {
    let value = match type_name {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::from),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::from),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::from),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::from),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| Value::from(f64::from(v))),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::from),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)?
            .map(|v| Value::from(v.to_string())),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map(|v| Value::from(v.to_rfc3339())),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map(|v| Value::from(v.format("%Y-%m-%d %H:%M:%S").to_string())),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(|v| Value::from(v.to_string())),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(index)?
            .map(|v| Value::from(v.to_string())),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(index)?,
        _ => match row.try_get::<Option<String>, _>(index) {
            Ok(value) => value.map(Value::from),
            Err(e) => {
                tracing::warn!("Unsupported column type '{}' decoded as null: {}", type_name, e);
                None
            }
        },
    };
    Ok(value.unwrap_or(Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_placeholders() {
        assert_eq!(
            numbered_placeholders("SELECT * FROM t WHERE a = ? AND b IN (?,?)"),
            "SELECT * FROM t WHERE a = $1 AND b IN ($2,$3)"
        );
    }

    #[test]
    fn test_placeholders_inside_literals_are_kept() {
        assert_eq!(
            numbered_placeholders("SELECT '?' AS q, \"we?ird\" FROM t WHERE a = ?"),
            "SELECT '?' AS q, \"we?ird\" FROM t WHERE a = $1"
        );
    }

    #[test]
    fn test_statement_kind() {
        assert!(returns_rows("SELECT COUNT(0) AS rowscount FROM t"));
        assert!(returns_rows("  select 1"));
        assert!(returns_rows("INSERT INTO t (a) VALUES ($1) RETURNING id"));
        assert!(!returns_rows("UPDATE t SET a = $1"));
        assert_eq!(first_keyword("\n INSERT INTO t"), "INSERT");
    }

    #[test]
    fn test_returned_key_comes_from_the_statement() {
        let mut row = ResultRow::new();
        row.insert("id".to_string(), Value::from(42));
        assert_eq!(returned_key(Some(&row)), Some(Value::from(42)));

        row.insert("id".to_string(), Value::Null);
        assert_eq!(returned_key(Some(&row)), None);
        assert_eq!(returned_key(None), None);
    }
}
