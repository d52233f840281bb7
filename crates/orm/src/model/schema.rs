//! Table configuration shared by record sets

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use springy_validation::Validate;

use crate::error::{OrmError, OrmResult};
use crate::model::lifecycle::{Lifecycle, RecordObserver};
use crate::model::row::Row;
use crate::relationships::EmbeddedRelation;

/// Transforms a value before it is stored in a row or bound in an update
pub type ColumnHook = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Derives a value from a fetched row
pub type CalculatedColumn = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// Qualify a bare column name with its table.
///
/// Names that already contain `.` or `(` are left alone.
pub fn qualify_column(table: &str, column: &str) -> String {
    if column.contains('.') || column.contains('(') {
        column.to_string()
    } else {
        format!("{}.{}", table, column)
    }
}

/// Immutable description of one table: keys, writable columns, hooks,
/// calculated columns, soft delete, embedded relations, observers and
/// validation rules.
#[derive(Clone)]
pub struct TableSchema {
    table: String,
    columns: Vec<String>,
    primary_key: Vec<String>,
    writable_columns: Vec<String>,
    hooks: HashMap<String, ColumnHook>,
    calculated: Vec<(String, CalculatedColumn)>,
    insert_date_column: Option<String>,
    deleted_column: Option<String>,
    abort_on_empty_filter: bool,
    embedded: Vec<EmbeddedRelation>,
    lifecycle: Lifecycle,
    validator: Option<Arc<dyn Validate>>,
}

impl std::fmt::Debug for TableSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSchema")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("primary_key", &self.primary_key)
            .field("writable_columns", &self.writable_columns)
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field(
                "calculated",
                &self.calculated.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("insert_date_column", &self.insert_date_column)
            .field("deleted_column", &self.deleted_column)
            .field("abort_on_empty_filter", &self.abort_on_empty_filter)
            .field("embedded", &self.embedded)
            .field("lifecycle", &self.lifecycle)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl TableSchema {
    pub fn builder(table: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder::new(table)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Select list with every entry table-qualified
    pub fn select_columns(&self) -> Vec<String> {
        if self.columns.is_empty() {
            vec![format!("{}.*", self.table)]
        } else {
            self.columns
                .iter()
                .map(|c| qualify_column(&self.table, c))
                .collect()
        }
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn writable_columns(&self) -> &[String] {
        &self.writable_columns
    }

    pub fn is_writable(&self, column: &str) -> bool {
        self.writable_columns.iter().any(|c| c == column)
    }

    pub fn has_hook(&self, column: &str) -> bool {
        self.hooks.contains_key(column)
    }

    /// Run the column hook, or return the value unchanged
    pub fn apply_hook(&self, column: &str, value: Value) -> Value {
        match self.hooks.get(column) {
            Some(hook) => hook(value),
            None => value,
        }
    }

    pub fn calculated_columns(&self) -> &[(String, CalculatedColumn)] {
        &self.calculated
    }

    pub fn insert_date_column(&self) -> Option<&str> {
        self.insert_date_column.as_deref()
    }

    pub fn deleted_column(&self) -> Option<&str> {
        self.deleted_column.as_deref()
    }

    pub fn abort_on_empty_filter(&self) -> bool {
        self.abort_on_empty_filter
    }

    pub fn embedded(&self) -> &[EmbeddedRelation] {
        &self.embedded
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn validator(&self) -> Option<&Arc<dyn Validate>> {
        self.validator.as_ref()
    }
}

/// Builder for [`TableSchema`]; `build` checks the configuration
pub struct TableSchemaBuilder {
    schema: TableSchema,
}

impl TableSchemaBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            schema: TableSchema {
                table: table.into(),
                columns: Vec::new(),
                primary_key: vec!["id".to_string()],
                writable_columns: Vec::new(),
                hooks: HashMap::new(),
                calculated: Vec::new(),
                insert_date_column: None,
                deleted_column: None,
                abort_on_empty_filter: true,
                embedded: Vec::new(),
                lifecycle: Lifecycle::default(),
                validator: None,
            },
        }
    }

    /// Default select list; bare names get table-qualified
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Primary key columns, `["id"]` unless set; may be empty
    pub fn primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn writable<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schema.writable_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn hook<F>(mut self, column: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.schema.hooks.insert(column.into(), Arc::new(hook));
        self
    }

    pub fn calculated<F>(mut self, column: impl Into<String>, calculate: F) -> Self
    where
        F: Fn(&Row) -> Value + Send + Sync + 'static,
    {
        self.schema.calculated.push((column.into(), Arc::new(calculate)));
        self
    }

    /// Column filled with the dialect's current timestamp on insert
    pub fn insert_date_column(mut self, column: impl Into<String>) -> Self {
        self.schema.insert_date_column = Some(column.into());
        self
    }

    /// Flag column used for soft deletes
    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        self.schema.deleted_column = Some(column.into());
        self
    }

    pub fn abort_on_empty_filter(mut self, abort: bool) -> Self {
        self.schema.abort_on_empty_filter = abort;
        self
    }

    pub fn embed(mut self, relation: EmbeddedRelation) -> Self {
        self.schema.embedded.push(relation);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RecordObserver>) -> Self {
        self.schema.lifecycle.register(observer);
        self
    }

    pub fn validator(mut self, validator: Arc<dyn Validate>) -> Self {
        self.schema.validator = Some(validator);
        self
    }

    pub fn build(self) -> OrmResult<Arc<TableSchema>> {
        let schema = self.schema;

        if schema.table.trim().is_empty() {
            return Err(OrmError::Configuration("table name cannot be empty".to_string()));
        }

        let mut unknown_hooks: Vec<&String> = schema
            .hooks
            .keys()
            .filter(|column| !schema.is_writable(column))
            .collect();
        if !unknown_hooks.is_empty() {
            unknown_hooks.sort();
            return Err(OrmError::Configuration(format!(
                "hooks registered for non-writable columns of '{}': {:?}",
                schema.table, unknown_hooks
            )));
        }

        let mut seen = Vec::new();
        for relation in &schema.embedded {
            if seen.contains(&relation.attr_name.as_str()) {
                return Err(OrmError::Configuration(format!(
                    "embedded attribute '{}' declared twice on '{}'",
                    relation.attr_name, schema.table
                )));
            }
            seen.push(relation.attr_name.as_str());
        }

        Ok(Arc::new(schema))
    }
}
