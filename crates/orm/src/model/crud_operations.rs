//! CRUD operations - writing the current row back, deleting and bulk
//! updating.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::backends::{Dialect, SqlExecutor};
use crate::error::{OrmError, OrmResult};
use crate::model::record_set::RecordSet;
use crate::query::where_clause::{Filter, Where};

/// Produces raw SQL for a bulk update assignment
pub type SqlExpression = Arc<dyn Fn() -> String + Send + Sync>;

/// Right-hand side of `column = ...` in a bulk update
#[derive(Clone)]
pub enum Assignment {
    /// Bound as a parameter
    Value(Value),
    /// Rendered into the statement as-is, e.g. `counter + 1`
    Expr(SqlExpression),
}

impl Assignment {
    pub fn expr<F>(expression: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Assignment::Expr(Arc::new(expression))
    }
}

impl fmt::Debug for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assignment::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Assignment::Expr(expression) => f.debug_tuple("Expr").field(&expression()).finish(),
        }
    }
}

impl From<Value> for Assignment {
    fn from(value: Value) -> Self {
        Assignment::Value(value)
    }
}

impl From<&str> for Assignment {
    fn from(value: &str) -> Self {
        Assignment::Value(Value::from(value))
    }
}

impl From<String> for Assignment {
    fn from(value: String) -> Self {
        Assignment::Value(Value::from(value))
    }
}

impl From<i64> for Assignment {
    fn from(value: i64) -> Self {
        Assignment::Value(Value::from(value))
    }
}

impl From<i32> for Assignment {
    fn from(value: i32) -> Self {
        Assignment::Value(Value::from(value))
    }
}

impl From<f64> for Assignment {
    fn from(value: f64) -> Self {
        Assignment::Value(Value::from(value))
    }
}

impl From<bool> for Assignment {
    fn from(value: bool) -> Self {
        Assignment::Value(Value::from(value))
    }
}

impl RecordSet {
    /// Write the changed columns of the current row.
    ///
    /// Returns false without executing anything when validation fails, when
    /// nothing changed, when an existing row has no primary key values or
    /// when an observer vetoes the write. New rows are re-loaded after the
    /// INSERT to pick up database defaults.
    pub async fn save(&mut self, conn: &mut dyn SqlExecutor, validate_first: bool) -> OrmResult<bool> {
        if validate_first {
            match self.validate().await {
                Ok(()) => {}
                Err(OrmError::ValidationFailed(errors)) => {
                    tracing::debug!(
                        "Not saving '{}': {} validation error(s)",
                        self.schema.table(),
                        errors.total_errors()
                    );
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }

        let Some(row) = self.rows.get(self.cursor) else {
            return Ok(false);
        };
        if row.changed_columns().is_empty() {
            return Ok(false);
        }

        if row.is_new() {
            self.insert_current(conn).await
        } else {
            self.update_current(conn).await
        }
    }

    async fn update_current(&mut self, conn: &mut dyn SqlExecutor) -> OrmResult<bool> {
        let filter = match self.primary_key_filter() {
            Ok(filter) => filter,
            Err(e @ OrmError::PrimaryKeyUndefined { .. }) => {
                tracing::warn!("Not saving: {}", e);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let lifecycle = self.schema.lifecycle().clone();
        let table = self.schema.table().to_string();
        let Some(row) = self.rows.get_mut(self.cursor) else {
            return Ok(false);
        };

        if !lifecycle.trigger_updating(row).await {
            tracing::debug!("Update of '{}' vetoed by observer", table);
            return Ok(false);
        }

        let columns = row.changed_columns().to_vec();
        let mut params: Vec<Value> = columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        params.extend(filter.params());

        let assignments: Vec<String> = columns.iter().map(|c| format!("{} = ?", c)).collect();
        let sql = format!("UPDATE {} SET {}{}", table, assignments.join(", "), filter.render());

        tracing::debug!("Executing update: {} ({} params)", sql, params.len());
        conn.execute(&sql, &params).await?;
        let affected = conn.affected_rows();

        lifecycle.trigger_updated(row).await;
        row.clear_changed();
        Ok(affected > 0)
    }

    async fn insert_current(&mut self, conn: &mut dyn SqlExecutor) -> OrmResult<bool> {
        let lifecycle = self.schema.lifecycle().clone();
        let schema = self.schema.clone();
        let dialect = Dialect::from_driver_name(conn.driver_name());
        let cursor = self.cursor;

        let Some(row) = self.rows.get_mut(cursor) else {
            return Ok(false);
        };

        if !lifecycle.trigger_creating(row).await {
            tracing::debug!("Insert into '{}' vetoed by observer", schema.table());
            return Ok(false);
        }

        let mut columns = row.changed_columns().to_vec();
        let params: Vec<Value> = columns
            .iter()
            .map(|column| row.get(column).cloned().unwrap_or(Value::Null))
            .collect();
        let mut values = vec!["?".to_string(); params.len()];

        if let Some(insert_date) = schema.insert_date_column() {
            columns.push(insert_date.to_string());
            values.push(dialect.now_expression());
        }

        // Postgres hands back the generated key through RETURNING
        let returning = match schema.primary_key() {
            [column]
                if dialect == Dialect::PostgreSql && row.get(column).map_or(true, is_empty_key) =>
            {
                format!(" RETURNING {}", column)
            }
            _ => String::new(),
        };

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}){}",
            schema.table(),
            columns.join(", "),
            values.join(", "),
            returning
        );

        tracing::debug!("Executing insert: {} ({} params)", sql, params.len());
        conn.execute(&sql, &params).await?;
        let affected = conn.affected_rows();
        let inserted_id = conn.last_inserted_id();

        row.mark_persisted();
        row.clear_changed();
        let inserted = row.clone();

        if affected == 1 {
            if let Some(reload) = self.reload_filter(inserted_id)? {
                self.load(&mut *conn, reload).await?;
            }
        }

        // a reload that found nothing still reports the insert
        let created = self.rows.get(self.cursor).unwrap_or(&inserted);
        lifecycle.trigger_created(created).await;

        Ok(affected > 0)
    }

    /// Filter that finds the row just inserted: the generated id for a
    /// single-column key left empty, otherwise the key values already set.
    fn reload_filter(&self, inserted_id: Option<Value>) -> OrmResult<Option<Where>> {
        let primary_key = self.schema.primary_key();
        let Some(row) = self.current_row() else {
            return Ok(None);
        };

        if let ([column], Some(id)) = (primary_key, inserted_id) {
            if row.get(column).map_or(true, is_empty_key) {
                let mut filter = Where::new();
                filter.condition(column.as_str(), id)?;
                return Ok(Some(filter));
            }
        }

        match self.primary_key_filter() {
            Ok(filter) => Ok(Some(filter)),
            Err(OrmError::PrimaryKeyUndefined { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete rows.
    ///
    /// With an explicit or ambient filter, every match is deleted and no
    /// observer runs; an empty filter is refused. Otherwise the current row
    /// is deleted by primary key with observers. With a soft-delete column
    /// the rows are flagged instead. Returns the affected row count, or
    /// `None` when there was nothing to delete. The ambient filter is
    /// always cleared.
    pub async fn delete(&mut self, conn: &mut dyn SqlExecutor, filter: Option<Filter>) -> OrmResult<Option<u64>> {
        let result = self.run_delete(conn, filter).await;
        self.filter.clear();
        result
    }

    async fn run_delete(&mut self, conn: &mut dyn SqlExecutor, filter: Option<Filter>) -> OrmResult<Option<u64>> {
        if filter.is_some() || !self.filter.is_empty() {
            let filter = match filter {
                Some(filter) => filter.into_where()?,
                None => self.filter.clone(),
            };
            if filter.is_empty() {
                tracing::warn!(
                    "Refusing to delete from '{}' without filter conditions",
                    self.schema.table()
                );
                return Err(OrmError::AbortedEmptyFilter);
            }
            return self.execute_delete(conn, filter).await.map(Some);
        }

        if !self.valid() {
            return Ok(None);
        }

        let filter = match self.primary_key_filter() {
            Ok(filter) => filter,
            Err(e @ OrmError::PrimaryKeyUndefined { .. }) => {
                tracing::warn!("Not deleting: {}", e);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let lifecycle = self.schema.lifecycle().clone();
        if let Some(row) = self.current_row() {
            if !lifecycle.trigger_deleting(row).await {
                tracing::debug!("Delete from '{}' vetoed by observer", self.schema.table());
                return Ok(None);
            }
        }

        let affected = self.execute_delete(conn, filter).await?;

        if let Some(row) = self.current_row() {
            lifecycle.trigger_deleted(row).await;
        }
        Ok(Some(affected))
    }

    async fn execute_delete(&self, conn: &mut dyn SqlExecutor, mut filter: Where) -> OrmResult<u64> {
        let sql = match self.schema.deleted_column() {
            Some(deleted) => {
                self.exclude_deleted(&mut filter, false)?;
                format!("UPDATE {} SET {} = 1{}", self.schema.table(), deleted, filter.render())
            }
            None => format!("DELETE FROM {}{}", self.schema.table(), filter.render()),
        };
        let params = filter.params();

        tracing::debug!("Executing delete: {} ({} params)", sql, params.len());
        conn.execute(&sql, &params).await?;
        Ok(conn.affected_rows())
    }

    /// Bulk `UPDATE ... SET` on the rows matching `conditions`.
    ///
    /// Only writable columns are assigned; values go through the column
    /// hooks. `None` conditions are rejected, as is a filter with no
    /// conditions. Returns the affected row count.
    pub async fn update<I, K, A>(
        &mut self,
        conn: &mut dyn SqlExecutor,
        values: I,
        conditions: Option<Filter>,
    ) -> OrmResult<u64>
    where
        I: IntoIterator<Item = (K, A)>,
        K: Into<String>,
        A: Into<Assignment>,
    {
        let assignments: Vec<(String, Assignment)> = values
            .into_iter()
            .map(|(column, value)| (column.into(), value.into()))
            .collect();
        let result = self.run_update(conn, assignments, conditions).await;
        self.filter.clear();
        result
    }

    async fn run_update(
        &mut self,
        conn: &mut dyn SqlExecutor,
        values: Vec<(String, Assignment)>,
        conditions: Option<Filter>,
    ) -> OrmResult<u64> {
        let Some(conditions) = conditions else {
            return Err(OrmError::UnsupportedConditionType(
                "update requires explicit conditions".to_string(),
            ));
        };

        let mut filter = conditions.into_where()?;
        if filter.is_empty() {
            tracing::warn!(
                "Refusing to update '{}' without filter conditions",
                self.schema.table()
            );
            return Err(OrmError::AbortedEmptyFilter);
        }

        let mut assignments = Vec::new();
        let mut params = Vec::new();
        for (column, value) in values {
            if !self.schema.is_writable(&column) {
                tracing::debug!("Skipping non-writable column '{}.{}'", self.schema.table(), column);
                continue;
            }
            match value {
                Assignment::Value(value) => {
                    assignments.push(format!("{} = ?", column));
                    params.push(self.schema.apply_hook(&column, value));
                }
                Assignment::Expr(expression) => {
                    let sql = match self.schema.apply_hook(&column, Value::String(expression())) {
                        Value::String(sql) => sql,
                        other => other.to_string(),
                    };
                    assignments.push(format!("{} = {}", column, sql));
                }
            }
        }

        if assignments.is_empty() {
            tracing::debug!("Nothing to update in '{}'", self.schema.table());
            return Ok(0);
        }

        self.exclude_deleted(&mut filter, false)?;
        params.extend(filter.params());
        let sql = format!(
            "UPDATE {} SET {}{}",
            self.schema.table(),
            assignments.join(", "),
            filter.render()
        );

        tracing::debug!("Executing bulk update: {} ({} params)", sql, params.len());
        conn.execute(&sql, &params).await?;
        Ok(conn.affected_rows())
    }
}

fn is_empty_key(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}
