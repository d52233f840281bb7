//! Condition expressions
//!
//! A [`Conditions`] value is an ordered list of clauses joined by one
//! connective. Each clause carries its bound values in the order their
//! placeholders appear in the rendered text, so `render()` always returns as
//! many parameters as there are `?` markers.

use std::fmt;

use serde_json::Value;

use crate::error::{OrmError, OrmResult};
use crate::query::types::Operator;

/// Connective used between the clauses of one group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connective {
    #[default]
    And,
    Or,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connective::And => write!(f, " AND "),
            Connective::Or => write!(f, " OR "),
        }
    }
}

/// A single `column OP value` comparison
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl Condition {
    /// Build a comparison, inferring `IN`/`NOT IN` from array operands and
    /// `IS NULL`/`IS NOT NULL` from null operands of `=`/`<>`.
    pub fn new(column: impl Into<String>, operator: Operator, value: Value) -> OrmResult<Self> {
        let column = column.into();

        let (operator, values) = match (operator, value) {
            (Operator::Equal, Value::Null) => (Operator::IsNull, Vec::new()),
            (Operator::NotEqual, Value::Null) => (Operator::IsNotNull, Vec::new()),
            (Operator::Equal, Value::Array(items)) => (Operator::In, items),
            (Operator::NotEqual, Value::Array(items)) => (Operator::NotIn, items),
            (op, _) if op.is_unary() => (op, Vec::new()),
            (op @ (Operator::In | Operator::NotIn), Value::Array(items)) => (op, items),
            (op @ (Operator::In | Operator::NotIn), single) => (op, vec![single]),
            (Operator::Between, Value::Array(items)) if items.len() == 2 => {
                (Operator::Between, items)
            }
            (Operator::Between, _) => {
                return Err(OrmError::invalid_value(
                    column,
                    "BETWEEN expects exactly two values",
                ))
            }
            (op, value) => (op, vec![value]),
        };

        if let Some(bad) = values.iter().find(|v| v.is_array() || v.is_object()) {
            return Err(OrmError::invalid_value(
                column,
                format!("{} expects scalar operands, got {}", operator, bad),
            ));
        }

        Ok(Self {
            column,
            operator,
            values,
        })
    }

    fn render_into(&self, sql: &mut String, params: &mut Vec<Value>) {
        match self.operator {
            Operator::IsNull | Operator::IsNotNull => {
                sql.push_str(&format!("{} {}", self.column, self.operator));
            }
            Operator::In if self.values.is_empty() => sql.push_str("1 = 0"),
            Operator::NotIn if self.values.is_empty() => sql.push_str("1 = 1"),
            Operator::In | Operator::NotIn => {
                let placeholders = vec!["?"; self.values.len()].join(",");
                sql.push_str(&format!("{} {} ({})", self.column, self.operator, placeholders));
                params.extend(self.values.iter().cloned());
            }
            Operator::Between => {
                sql.push_str(&format!("{} BETWEEN ? AND ?", self.column));
                params.extend(self.values.iter().cloned());
            }
            _ => {
                sql.push_str(&format!("{} {} ?", self.column, self.operator));
                params.extend(self.values.iter().cloned());
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Compare(Condition),
    Raw { sql: String, params: Vec<Value> },
    Group(Conditions),
}

/// Ordered clauses joined by AND (or OR for an explicit group)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    connective: Connective,
    clauses: Vec<Clause>,
}

impl Conditions {
    /// Clauses joined by AND
    pub fn new() -> Self {
        Self::default()
    }

    /// Clauses joined by OR
    pub fn any() -> Self {
        Self {
            connective: Connective::Or,
            clauses: Vec::new(),
        }
    }

    pub fn connective(&self) -> Connective {
        self.connective
    }

    /// Append a comparison
    pub fn condition(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
        operator: Operator,
    ) -> OrmResult<&mut Self> {
        let condition = Condition::new(column, operator, value.into())?;
        self.clauses.push(Clause::Compare(condition));
        Ok(self)
    }

    /// Insert a comparison ahead of every existing clause
    pub fn prepend(
        &mut self,
        column: impl Into<String>,
        value: impl Into<Value>,
        operator: Operator,
    ) -> OrmResult<&mut Self> {
        let condition = Condition::new(column, operator, value.into())?;
        self.clauses.insert(0, Clause::Compare(condition));
        Ok(self)
    }

    /// Append a pre-rendered fragment with its own bound values
    pub fn raw(&mut self, sql: impl Into<String>, params: Vec<Value>) -> &mut Self {
        self.clauses.push(Clause::Raw {
            sql: sql.into(),
            params,
        });
        self
    }

    /// Append a parenthesised sub-group
    pub fn group(&mut self, group: Conditions) -> &mut Self {
        self.clauses.push(Clause::Group(group));
        self
    }

    /// Append the clauses of `other`; an OR list is added as one group
    pub fn extend(&mut self, other: Conditions) -> &mut Self {
        if other.is_empty() {
            return self;
        }
        match other.connective {
            Connective::And => self.clauses.extend(other.clauses),
            Connective::Or => self.clauses.push(Clause::Group(other)),
        }
        self
    }

    /// First top-level comparison on `column`
    pub fn get(&self, column: &str) -> Option<&Condition> {
        self.clauses.iter().find_map(|clause| match clause {
            Clause::Compare(condition) if condition.column == column => Some(condition),
            _ => None,
        })
    }

    /// Number of top-level clauses
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clear(&mut self) {
        self.clauses.clear();
    }

    /// SQL text plus bound values, in placeholder order
    pub fn render(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render_into(&mut sql, &mut params);
        (sql, params)
    }

    pub fn to_sql(&self) -> String {
        self.render().0
    }

    pub fn params(&self) -> Vec<Value> {
        self.render().1
    }

    fn render_into(&self, sql: &mut String, params: &mut Vec<Value>) {
        let mut first = true;
        for clause in &self.clauses {
            if let Clause::Group(group) = clause {
                if group.is_empty() {
                    continue;
                }
            }
            if !first {
                sql.push_str(&self.connective.to_string());
            }
            first = false;

            match clause {
                Clause::Compare(condition) => condition.render_into(sql, params),
                Clause::Raw { sql: fragment, params: bound } => {
                    sql.push_str(fragment);
                    params.extend(bound.iter().cloned());
                }
                Clause::Group(group) => {
                    sql.push('(');
                    group.render_into(sql, params);
                    sql.push(')');
                }
            }
        }
    }
}

impl fmt::Display for Conditions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}
