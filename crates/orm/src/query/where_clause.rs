//! WHERE clause builder and filter maps

use std::fmt;

use serde_json::{Map, Value};

use crate::conditions::{Condition, Conditions};
use crate::error::{OrmError, OrmResult};
use crate::query::types::Operator;

/// Accumulating filter that renders a full `WHERE ...` clause.
///
/// An empty filter renders to the empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    conditions: Conditions,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a filter map such as `{"status": "active", "age": {">=": 18}}`
    pub fn from_map(map: &Map<String, Value>) -> OrmResult<Self> {
        let mut filter = Self::new();
        filter.filter(map)?;
        Ok(filter)
    }

    /// Add `column = value`; arrays become `IN`, null becomes `IS NULL`
    pub fn condition(&mut self, column: impl Into<String>, value: impl Into<Value>) -> OrmResult<&mut Self> {
        self.conditions.condition(column, value, Operator::Equal)?;
        Ok(self)
    }

    pub fn condition_op(
        &mut self,
        column: impl Into<String>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> OrmResult<&mut Self> {
        self.conditions.condition(column, value, operator)?;
        Ok(self)
    }

    /// Add a comparison ahead of the existing ones
    pub fn prepend_condition(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
    ) -> OrmResult<&mut Self> {
        self.conditions.prepend(column, value, Operator::Equal)?;
        Ok(self)
    }

    pub fn raw(&mut self, sql: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.conditions.raw(sql, params);
        self
    }

    /// Add a parenthesised group, usually built with [`Conditions::any`]
    pub fn or_group(&mut self, group: Conditions) -> &mut Self {
        self.conditions.group(group);
        self
    }

    /// Append the conditions of another filter
    pub fn merge(&mut self, other: Where) -> &mut Self {
        self.conditions.extend(other.conditions);
        self
    }

    /// Merge a filter map.
    ///
    /// Each entry is either `column => value` or `column => {op: operand}`.
    /// An operator map with several keys adds one condition per key.
    pub fn filter(&mut self, map: &Map<String, Value>) -> OrmResult<&mut Self> {
        for (column, value) in map {
            match value {
                Value::Object(operators) => {
                    if operators.is_empty() {
                        return Err(OrmError::invalid_value(
                            column.as_str(),
                            "operator map is empty",
                        ));
                    }
                    for (key, operand) in operators {
                        let operator: Operator = key.parse()?;
                        self.conditions.condition(column.as_str(), operand.clone(), operator)?;
                    }
                }
                other => {
                    self.conditions
                        .condition(column.as_str(), other.clone(), Operator::Equal)?;
                }
            }
        }
        Ok(self)
    }

    /// First top-level comparison on `column`
    pub fn get(&self, column: &str) -> Option<&Condition> {
        self.conditions.get(column)
    }

    /// Number of top-level conditions
    pub fn count(&self) -> usize {
        self.conditions.len()
    }

    /// True when nothing would render, including only empty groups
    pub fn is_empty(&self) -> bool {
        self.conditions.to_sql().is_empty()
    }

    pub fn clear(&mut self) {
        self.conditions.clear();
    }

    pub fn conditions(&self) -> &Conditions {
        &self.conditions
    }

    /// `" WHERE ..."`, or `""` when nothing renders
    pub fn render(&self) -> String {
        let sql = self.conditions.to_sql();
        if sql.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", sql)
        }
    }

    pub fn params(&self) -> Vec<Value> {
        self.conditions.params()
    }
}

impl fmt::Display for Where {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl From<Conditions> for Where {
    fn from(conditions: Conditions) -> Self {
        Self { conditions }
    }
}

impl TryFrom<Value> for Where {
    type Error = OrmError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Filter::from(value).into_where()
    }
}

/// A filter argument: a built [`Where`] or a JSON filter map
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Where(Where),
    Json(Value),
}

impl Filter {
    pub fn into_where(self) -> OrmResult<Where> {
        match self {
            Filter::Where(filter) => Ok(filter),
            Filter::Json(Value::Object(map)) => Where::from_map(&map),
            Filter::Json(other) => Err(OrmError::UnsupportedConditionType(format!(
                "expected a filter object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

impl From<Where> for Filter {
    fn from(filter: Where) -> Self {
        Filter::Where(filter)
    }
}

impl From<Conditions> for Filter {
    fn from(conditions: Conditions) -> Self {
        Filter::Where(conditions.into())
    }
}

impl From<Value> for Filter {
    fn from(value: Value) -> Self {
        Filter::Json(value)
    }
}

impl From<Map<String, Value>> for Filter {
    fn from(map: Map<String, Value>) -> Self {
        Filter::Json(Value::Object(map))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
