//! Recording executor for tests
//!
//! [`FakeExecutor`] records every statement with its parameters and answers
//! from a queue of canned responses, one response per `execute` call. When
//! the queue runs dry, statements return no rows and affect nothing.

use std::collections::VecDeque;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::backends::{ResultRow, SqlExecutor};
use crate::error::{OrmError, OrmResult};

/// A statement as the executor received it
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedStatement {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Canned answer for one `execute` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FakeResponse {
    pub rows: Vec<ResultRow>,
    pub affected: u64,
    pub insert_id: Option<Value>,
}

#[derive(Debug)]
pub struct FakeExecutor {
    driver: String,
    statements: Vec<ExecutedStatement>,
    responses: VecDeque<FakeResponse>,
    current: VecDeque<ResultRow>,
    affected: u64,
    last_id: Option<Value>,
    fail_on: Option<String>,
}

impl Default for FakeExecutor {
    fn default() -> Self {
        Self::new("pgsql")
    }
}

impl FakeExecutor {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            statements: Vec::new(),
            responses: VecDeque::new(),
            current: VecDeque::new(),
            affected: 0,
            last_id: None,
            fail_on: None,
        }
    }

    /// Queue a result set; the affected count is the number of rows
    pub fn push_rows(&mut self, rows: Vec<Value>) -> &mut Self {
        let rows: Vec<ResultRow> = rows.into_iter().map(into_row).collect();
        let affected = rows.len() as u64;
        self.responses.push_back(FakeResponse {
            rows,
            affected,
            insert_id: None,
        });
        self
    }

    /// Queue an affected-row count for a write
    pub fn push_affected(&mut self, affected: u64) -> &mut Self {
        self.responses.push_back(FakeResponse {
            affected,
            ..Default::default()
        });
        self
    }

    /// Queue the outcome of an INSERT
    pub fn push_insert(&mut self, affected: u64, insert_id: impl Into<Value>) -> &mut Self {
        self.responses.push_back(FakeResponse {
            rows: Vec::new(),
            affected,
            insert_id: Some(insert_id.into()),
        });
        self
    }

    pub fn push_response(&mut self, response: FakeResponse) -> &mut Self {
        self.responses.push_back(response);
        self
    }

    /// Fail any statement containing `fragment`
    pub fn fail_when(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fail_on = Some(fragment.into());
        self
    }

    pub fn statements(&self) -> &[ExecutedStatement] {
        &self.statements
    }

    pub fn sql_log(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.sql.as_str()).collect()
    }

    pub fn execute_count(&self) -> usize {
        self.statements.len()
    }

    pub fn last_statement(&self) -> Option<&ExecutedStatement> {
        self.statements.last()
    }

    pub fn pending_responses(&self) -> usize {
        self.responses.len()
    }
}

fn into_row(value: Value) -> ResultRow {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

#[async_trait]
impl SqlExecutor for FakeExecutor {
    async fn execute(&mut self, sql: &str, params: &[Value]) -> OrmResult<()> {
        self.statements.push(ExecutedStatement {
            sql: sql.to_string(),
            params: params.to_vec(),
        });

        if let Some(fragment) = &self.fail_on {
            if sql.contains(fragment.as_str()) {
                return Err(OrmError::QueryExecution(format!("statement rejected: {}", sql)));
            }
        }

        let response = self.responses.pop_front().unwrap_or_default();
        self.current = response.rows.into();
        self.affected = response.affected;
        self.last_id = response.insert_id;
        Ok(())
    }

    async fn fetch_all(&mut self) -> OrmResult<Vec<ResultRow>> {
        Ok(self.current.drain(..).collect())
    }

    async fn fetch_next(&mut self) -> OrmResult<Option<ResultRow>> {
        Ok(self.current.pop_front())
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn last_inserted_id(&self) -> Option<Value> {
        self.last_id.clone()
    }

    fn driver_name(&self) -> &str {
        &self.driver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_replays_responses_in_order() {
        let mut fake = FakeExecutor::new("mysql");
        fake.push_rows(vec![json!({"id": 1}), json!({"id": 2})])
            .push_insert(1, 42);

        fake.execute("SELECT id FROM t", &[]).await.unwrap();
        assert_eq!(fake.affected_rows(), 2);
        assert_eq!(fake.fetch_next().await.unwrap().unwrap()["id"], json!(1));
        assert_eq!(fake.fetch_all().await.unwrap().len(), 1);

        fake.execute("INSERT INTO t (a) VALUES (?)", &[json!("x")]).await.unwrap();
        assert_eq!(fake.last_inserted_id(), Some(json!(42)));

        fake.execute("DELETE FROM t", &[]).await.unwrap();
        assert_eq!(fake.affected_rows(), 0);
        assert!(fake.fetch_all().await.unwrap().is_empty());

        assert_eq!(fake.execute_count(), 3);
        assert_eq!(fake.statements()[1].params, vec![json!("x")]);
        assert_eq!(fake.driver_name(), "mysql");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let mut fake = FakeExecutor::default();
        fake.fail_when("DELETE");

        let err = fake.execute("DELETE FROM t", &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::QueryExecution(_)));
        assert_eq!(fake.execute_count(), 1);
    }
}
