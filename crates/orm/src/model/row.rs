//! In-memory rows with change tracking

use serde::Serialize;
use serde_json::{Map, Value};

/// One row of a record set.
///
/// Columns keep their fetch/assignment order. Whether the row is new and
/// which columns changed is tracked beside the columns, never inside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Row {
    #[serde(flatten)]
    columns: Map<String, Value>,
    #[serde(skip)]
    is_new: bool,
    #[serde(skip)]
    changed: Vec<String>,
}

impl Row {
    /// A row that does not exist in the database yet
    pub fn new() -> Self {
        Self {
            columns: Map::new(),
            is_new: true,
            changed: Vec::new(),
        }
    }

    /// A row as fetched from the database
    pub fn from_columns(columns: Map<String, Value>) -> Self {
        Self {
            columns,
            is_new: false,
            changed: Vec::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn get_mut(&mut self, column: &str) -> Option<&mut Value> {
        self.columns.get_mut(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Store a value without touching change tracking
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        self.columns.insert(column.into(), value);
    }

    pub fn columns(&self) -> &Map<String, Value> {
        &self.columns
    }

    pub fn into_columns(self) -> Map<String, Value> {
        self.columns
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
    }

    pub fn changed_columns(&self) -> &[String] {
        &self.changed
    }

    /// Record `column` as changed; recording it twice is a no-op
    pub fn mark_changed(&mut self, column: &str) {
        if !self.changed.iter().any(|c| c == column) {
            self.changed.push(column.to_string());
        }
    }

    pub fn clear_changed(&mut self) {
        self.changed.clear();
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.columns.clone())
    }
}

impl From<Map<String, Value>> for Row {
    fn from(columns: Map<String, Value>) -> Self {
        Self::from_columns(columns)
    }
}
