//! SELECT statement assembly

use serde_json::Value;

use crate::conditions::Conditions;
use crate::query::joins::{apply_joins, Join};
use crate::query::types::OrderDirection;
use crate::query::where_clause::Where;

/// Assembles `SELECT cols FROM table [JOINs] WHERE ... GROUP BY ... HAVING ...
/// ORDER BY ... LIMIT n OFFSET m` from parts.
#[derive(Debug, Clone, Default)]
pub struct SelectBuilder {
    columns: String,
    from: String,
    calc_found_rows: bool,
    filter: Where,
    group_by: Vec<String>,
    having: Conditions,
    order_by: Vec<(String, OrderDirection)>,
    limit: u64,
    offset: u64,
}

impl SelectBuilder {
    pub fn new(table: impl Into<String>, columns: impl Into<String>) -> Self {
        Self {
            columns: columns.into(),
            from: table.into(),
            ..Default::default()
        }
    }

    pub fn joins(mut self, joins: &[Join]) -> Self {
        apply_joins(joins, &mut self.columns, &mut self.from);
        self
    }

    /// Prefix the column list with `SQL_CALC_FOUND_ROWS`
    pub fn calc_found_rows(mut self, enabled: bool) -> Self {
        self.calc_found_rows = enabled;
        self
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = filter;
        self
    }

    pub fn group_by(mut self, columns: &[String]) -> Self {
        self.group_by = columns.to_vec();
        self
    }

    pub fn having(mut self, having: Conditions) -> Self {
        self.having = having;
        self
    }

    pub fn order_by(mut self, order: &[(String, OrderDirection)]) -> Self {
        self.order_by = order.to_vec();
        self
    }

    /// Zero means no limit
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// `FROM` target including joins, reused by count queries
    pub fn from_clause(&self) -> &str {
        &self.from
    }

    pub fn where_clause(&self) -> &Where {
        &self.filter
    }

    pub fn build(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("SELECT ");
        if self.calc_found_rows {
            sql.push_str("SQL_CALC_FOUND_ROWS ");
        }
        sql.push_str(&self.columns);
        sql.push_str(" FROM ");
        sql.push_str(&self.from);

        sql.push_str(&self.filter.render());
        let mut params = self.filter.params();

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.having.is_empty() {
            let (having_sql, having_params) = self.having.render();
            sql.push_str(" HAVING ");
            sql.push_str(&having_sql);
            params.extend(having_params);
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| format!("{} {}", column, direction))
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if self.limit > 0 {
            sql.push_str(&format!(" LIMIT {}", self.limit));
            if self.offset > 0 {
                sql.push_str(&format!(" OFFSET {}", self.offset));
            }
        }

        (sql, params)
    }
}
