//! Explicit SQL joins added to a SELECT

use crate::query::types::JoinType;

/// One joined table.
///
/// `columns` is appended verbatim to the select list when set.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub join_type: JoinType,
    pub table: String,
    pub on: String,
    pub columns: Option<String>,
}

impl Join {
    pub fn new(join_type: JoinType, table: impl Into<String>, on: impl Into<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            on: on.into(),
            columns: None,
        }
    }

    pub fn inner(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, table, on)
    }

    pub fn left(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::new(JoinType::Left, table, on)
    }

    pub fn right(table: impl Into<String>, on: impl Into<String>) -> Self {
        Self::new(JoinType::Right, table, on)
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = Some(columns.into());
        self
    }

    /// ` LEFT JOIN table ON ...`
    pub fn to_sql(&self) -> String {
        format!(" {} {} ON {}", self.join_type, self.table, self.on)
    }
}

/// Append join columns to `columns` and join clauses to `from`
pub(crate) fn apply_joins(joins: &[Join], columns: &mut String, from: &mut String) {
    for join in joins {
        if let Some(extra) = join.columns.as_deref().filter(|c| !c.trim().is_empty()) {
            columns.push_str(", ");
            columns.push_str(extra);
        }
        from.push_str(&join.to_sql());
    }
}
