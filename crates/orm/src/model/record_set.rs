//! The record set: rows of the last query plus the state needed to write
//! them back.

use std::sync::Arc;

use serde_json::{Map, Value};
use springy_validation::ValidationErrors;

use crate::conditions::Conditions;
use crate::config::OrmConfig;
use crate::error::{OrmError, OrmResult};
use crate::model::row::Row;
use crate::model::schema::{qualify_column, TableSchema};
use crate::query::where_clause::{Filter, Where};
use crate::relationships::EmbeddedRelation;

/// Rows of one table with a cursor over them.
///
/// A record set starts empty. `query`/`load` replace its rows, `set` edits
/// the current row (creating a new one when the set is empty) and `save`
/// writes the current row back. The executor is handed in per call.
#[derive(Debug, Clone)]
pub struct RecordSet {
    pub(crate) schema: Arc<TableSchema>,
    pub(crate) rows: Vec<Row>,
    pub(crate) cursor: usize,
    pub(crate) found_rows: u64,
    pub(crate) loaded: bool,
    pub(crate) filter: Where,
    pub(crate) columns: Option<Vec<String>>,
    pub(crate) group_by: Vec<String>,
    pub(crate) having: Conditions,
    pub(crate) embedded: Vec<EmbeddedRelation>,
    pub(crate) abort_on_empty_filter: bool,
    pub(crate) max_embed_depth: Option<u32>,
    pub(crate) validation_errors: ValidationErrors,
}

impl RecordSet {
    pub fn new(schema: Arc<TableSchema>) -> Self {
        Self {
            abort_on_empty_filter: schema.abort_on_empty_filter(),
            embedded: schema.embedded().to_vec(),
            schema,
            rows: Vec::new(),
            cursor: 0,
            found_rows: 0,
            loaded: false,
            filter: Where::new(),
            columns: None,
            group_by: Vec::new(),
            having: Conditions::new(),
            max_embed_depth: None,
            validation_errors: ValidationErrors::new(),
        }
    }

    /// Apply the empty-filter guard and embed depth limit from `config`
    pub fn with_config(schema: Arc<TableSchema>, config: &OrmConfig) -> Self {
        let mut record_set = Self::new(schema);
        record_set.abort_on_empty_filter = config.abort_on_empty_filter;
        record_set.max_embed_depth = Some(config.max_embed_depth);
        record_set
    }

    pub fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        self.schema.table()
    }

    /// Ambient filter used when an operation gets no explicit one
    pub fn where_mut(&mut self) -> &mut Where {
        &mut self.filter
    }

    pub fn ambient_filter(&self) -> &Where {
        &self.filter
    }

    /// Override the select list; bare names get table-qualified
    pub fn set_columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = self.schema.table();
        let columns: Vec<String> = columns
            .into_iter()
            .map(|c| qualify_column(table, c.as_ref()))
            .collect();
        self.columns = if columns.is_empty() { None } else { Some(columns) };
        self
    }

    pub fn group_by<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let table = self.schema.table();
        self.group_by = columns
            .into_iter()
            .map(|c| qualify_column(table, c.as_ref()))
            .collect();
        self
    }

    pub fn having(&mut self, conditions: impl Into<Filter>) -> OrmResult<&mut Self> {
        self.having = conditions.into().into_where()?.conditions().clone();
        Ok(self)
    }

    /// Replace the embedded relations used by `Embed::Depth`
    pub fn set_embedded_obj(&mut self, relations: Vec<EmbeddedRelation>) -> &mut Self {
        self.embedded = relations;
        self
    }

    pub fn set_abort_on_empty_filter(&mut self, abort: bool) -> &mut Self {
        self.abort_on_empty_filter = abort;
        self
    }

    pub(crate) fn select_list(&self) -> String {
        match &self.columns {
            Some(columns) => columns.join(", "),
            None => self.schema.select_columns().join(", "),
        }
    }

    /// True only after `load` matched exactly one row
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Matches of the last query, ignoring its limit
    pub fn found_rows(&self) -> u64 {
        self.found_rows
    }

    /// Rows held in memory
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    /// Every row as a JSON object
    pub fn all(&self) -> Vec<Value> {
        self.rows.iter().map(Row::to_value).collect()
    }

    /// One column across all rows; rows lacking it are skipped
    pub fn get_all_column(&self, column: &str) -> Vec<Value> {
        self.rows
            .iter()
            .filter_map(|row| row.get(column).cloned())
            .collect()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.current_row().and_then(|row| row.get(column))
    }

    pub fn get_row(&self) -> Option<&Row> {
        self.current_row()
    }

    /// Assign a writable column of the current row.
    ///
    /// Creates a new row when the set is empty. The stored value goes through
    /// the column hook. Returns false for non-writable columns or when the
    /// cursor is past the end.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> bool {
        if !self.schema.is_writable(column) {
            tracing::debug!("Column '{}.{}' is not writable", self.schema.table(), column);
            return false;
        }

        if self.rows.is_empty() {
            self.rows.push(Row::new());
            self.cursor = 0;
        }

        let value = value.into();
        let stored = self.schema.apply_hook(column, value.clone());
        let Some(row) = self.rows.get_mut(self.cursor) else {
            return false;
        };

        let previous = row.get(column).cloned().unwrap_or(Value::Null);
        row.insert(column, stored);
        if row.is_new() || previous != value {
            row.mark_changed(column);
        }
        true
    }

    /// `set` for every entry; true when all columns were written
    pub fn set_many(&mut self, values: &Map<String, Value>) -> bool {
        let mut all_set = true;
        for (column, value) in values {
            all_set &= self.set(column, value.clone());
        }
        all_set
    }

    /// Changed columns of the current row
    pub fn changed_columns(&self) -> Vec<String> {
        self.current_row()
            .map(|row| row.changed_columns().to_vec())
            .unwrap_or_default()
    }

    pub fn clear_changed_columns(&mut self) {
        if let Some(row) = self.rows.get_mut(self.cursor) {
            row.clear_changed();
        }
    }

    pub fn pk_columns(&self) -> &[String] {
        self.schema.primary_key()
    }

    /// Errors from the last `validate`
    pub fn validation_errors(&self) -> &ValidationErrors {
        &self.validation_errors
    }

    /// Check the current row against the schema's validator.
    ///
    /// Errors are kept for [`validation_errors`](Self::validation_errors).
    pub async fn validate(&mut self) -> OrmResult<()> {
        self.validation_errors = ValidationErrors::new();

        let Some(validator) = self.schema.validator().cloned() else {
            return Ok(());
        };
        let Some(row) = self.rows.get(self.cursor) else {
            return Ok(());
        };

        match validator.validate(row.columns()).await {
            Ok(()) => Ok(()),
            Err(errors) => {
                self.validation_errors = errors.clone();
                Err(OrmError::ValidationFailed(errors))
            }
        }
    }

    /// Equality filter on the current row's primary key values
    pub(crate) fn primary_key_filter(&self) -> OrmResult<Where> {
        let undefined = || OrmError::PrimaryKeyUndefined {
            table: self.schema.table().to_string(),
        };

        let row = self.current_row().ok_or_else(undefined)?;
        let primary_key = self.schema.primary_key();
        if primary_key.is_empty() {
            return Err(undefined());
        }

        let mut filter = Where::new();
        for column in primary_key {
            match row.get(column) {
                Some(value) if !value.is_null() => {
                    filter.condition(column.as_str(), value.clone())?;
                }
                _ => return Err(undefined()),
            }
        }
        Ok(filter)
    }

    /// Constrain `filter` to rows not flagged deleted, unless it already
    /// mentions the flag column.
    pub(crate) fn exclude_deleted(&self, filter: &mut Where, qualified: bool) -> OrmResult<()> {
        let Some(deleted) = self.schema.deleted_column() else {
            return Ok(());
        };

        let qualified_name = qualify_column(self.schema.table(), deleted);
        if filter.get(deleted).is_some() || filter.get(&qualified_name).is_some() {
            return Ok(());
        }

        let column = if qualified { qualified_name } else { deleted.to_string() };
        filter.prepend_condition(column, 0)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users() -> Arc<TableSchema> {
        TableSchema::builder("users")
            .writable(["name", "email"])
            .hook("email", |v| match v {
                Value::String(s) => Value::String(s.to_lowercase()),
                other => other,
            })
            .soft_delete("deleted")
            .build()
            .unwrap()
    }

    fn loaded(schema: Arc<TableSchema>, row: Value) -> RecordSet {
        let mut record_set = RecordSet::new(schema);
        record_set.rows = vec![Row::from_columns(row.as_object().cloned().unwrap())];
        record_set
    }

    #[test]
    fn test_set_creates_new_row() {
        let mut users = RecordSet::new(users());
        assert!(users.get_row().is_none());

        assert!(users.set("name", "Ann"));
        assert_eq!(users.row_count(), 1);
        assert!(users.get_row().unwrap().is_new());
        assert_eq!(users.changed_columns(), vec!["name"]);
    }

    #[test]
    fn test_set_rejects_non_writable_columns() {
        let mut users = RecordSet::new(users());
        assert!(!users.set("id", 5));
        assert!(users.get_row().is_none());
    }

    #[test]
    fn test_change_tracking_on_loaded_row() {
        let mut users = loaded(users(), json!({"id": 1, "name": "A"}));

        assert!(users.set("name", "A"));
        assert!(users.changed_columns().is_empty());

        users.set("name", "B");
        users.set("name", "B");
        users.set("name", "C");
        assert_eq!(users.changed_columns(), vec!["name"]);

        users.clear_changed_columns();
        assert!(users.changed_columns().is_empty());
    }

    #[test]
    fn test_hook_applies_to_stored_value() {
        let mut users = RecordSet::new(users());
        users.set("email", "ANN@EXAMPLE.COM");
        assert_eq!(users.get("email"), Some(&json!("ann@example.com")));
    }

    #[test]
    fn test_set_many() {
        let mut users = RecordSet::new(users());
        let values = json!({"name": "Ann", "email": "a@b.c", "id": 3});
        assert!(!users.set_many(values.as_object().unwrap()));
        assert_eq!(users.changed_columns(), vec!["name", "email"]);
    }

    #[test]
    fn test_select_list_overrides() {
        let mut users = RecordSet::new(users());
        assert_eq!(users.select_list(), "users.*");

        users.set_columns(["id", "COUNT(posts.id) AS posts", "teams.name"]);
        assert_eq!(users.select_list(), "users.id, COUNT(posts.id) AS posts, teams.name");

        users.group_by(["id"]);
        assert_eq!(users.group_by, vec!["users.id"]);
    }

    #[test]
    fn test_primary_key_filter() {
        let users_schema = users();
        let users = loaded(users_schema.clone(), json!({"id": 7, "name": "A"}));
        assert_eq!(users.primary_key_filter().unwrap().render(), " WHERE id = ?");

        let missing = loaded(users_schema, json!({"id": null}));
        assert!(matches!(
            missing.primary_key_filter(),
            Err(OrmError::PrimaryKeyUndefined { .. })
        ));

        let keyless = TableSchema::builder("logs").primary_key(Vec::<String>::new()).build().unwrap();
        let logs = loaded(keyless, json!({"id": 1}));
        assert!(logs.primary_key_filter().is_err());
    }

    #[test]
    fn test_exclude_deleted() {
        let users = RecordSet::new(users());

        let mut filter = Where::try_from(json!({"name": "A"})).unwrap();
        users.exclude_deleted(&mut filter, true).unwrap();
        assert_eq!(filter.render(), " WHERE users.deleted = ? AND name = ?");

        let mut explicit = Where::try_from(json!({"deleted": 1})).unwrap();
        users.exclude_deleted(&mut explicit, false).unwrap();
        assert_eq!(explicit.render(), " WHERE deleted = ?");
        assert_eq!(explicit.params(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_validate_stores_errors() {
        use springy_validation::Rules;

        let schema = TableSchema::builder("users")
            .writable(["name"])
            .validator(Arc::new(Rules::new().required_string("name", Some(3), None)))
            .build()
            .unwrap();

        let mut users = RecordSet::new(schema);
        users.set("name", "Al");
        assert!(matches!(users.validate().await, Err(OrmError::ValidationFailed(_))));
        assert!(users.validation_errors().has_field_errors("name"));

        users.set("name", "Alice");
        assert!(users.validate().await.is_ok());
        assert!(users.validation_errors().is_empty());
    }
}
