//! Query methods - loading rows into a record set and counting matches

use serde_json::Value;

use crate::backends::{Dialect, SqlExecutor};
use crate::error::OrmResult;
use crate::model::record_set::RecordSet;
use crate::model::row::Row;
use crate::query::joins::Join;
use crate::query::select::SelectBuilder;
use crate::query::types::OrderDirection;
use crate::query::where_clause::{Filter, Where};

/// What to attach to fetched rows
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Embed {
    #[default]
    None,
    /// Resolve embedded relations this many levels deep
    Depth(u32),
    /// Join these tables into the SELECT itself
    Joins(Vec<Join>),
}

/// Arguments of [`RecordSet::query`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryArgs {
    pub filter: Option<Filter>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub offset: u64,
    /// Zero means no limit
    pub limit: u64,
    pub embed: Embed,
}

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: OrderDirection) -> Self {
        self.order_by.push((column.into(), direction));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    pub fn embed(mut self, depth: u32) -> Self {
        self.embed = Embed::Depth(depth);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        match &mut self.embed {
            Embed::Joins(joins) => joins.push(join),
            _ => self.embed = Embed::Joins(vec![join]),
        }
        self
    }
}

impl RecordSet {
    /// Replace the rows with the matches of a SELECT.
    ///
    /// Without an explicit filter the ambient one is used. When neither
    /// yields a condition and the empty-filter guard is on, nothing is
    /// executed, the ambient filter is kept and `false` is returned.
    /// Otherwise the ambient filter is cleared afterwards.
    ///
    /// With a limit, `found_rows` counts the filtered rows before any
    /// GROUP BY or HAVING is applied.
    pub async fn query(&mut self, conn: &mut dyn SqlExecutor, args: QueryArgs) -> OrmResult<bool> {
        let QueryArgs {
            filter,
            order_by,
            offset,
            limit,
            embed,
        } = args;

        let filter = match filter {
            Some(filter) => match filter.into_where() {
                Ok(filter) => filter,
                Err(e) => {
                    self.filter.clear();
                    return Err(e);
                }
            },
            None => self.filter.clone(),
        };

        if filter.is_empty() && self.abort_on_empty_filter {
            tracing::warn!(
                "Refusing to query '{}' without filter conditions",
                self.schema.table()
            );
            return Ok(false);
        }

        let result = self
            .select(conn, filter, &order_by, offset, limit, &embed)
            .await;
        self.filter.clear();
        result.map(|_| true)
    }

    /// Load the single row matching `filter`.
    ///
    /// Any other number of matches, or a refused empty filter, discards the
    /// rows held so far.
    pub async fn load(&mut self, conn: &mut dyn SqlExecutor, filter: impl Into<Filter>) -> OrmResult<bool> {
        let queried = self
            .query(conn, QueryArgs::new().filter(filter))
            .await?;

        if queried && self.found_rows == 1 {
            self.loaded = true;
            Ok(true)
        } else {
            self.rows.clear();
            self.cursor = 0;
            self.loaded = false;
            Ok(false)
        }
    }

    /// `SELECT COUNT(0)` for `filter` (or the ambient filter), honouring the
    /// soft-delete flag and any joins. The ambient filter is left in place.
    pub async fn count(
        &mut self,
        conn: &mut dyn SqlExecutor,
        filter: Option<Filter>,
        joins: &[Join],
    ) -> OrmResult<u64> {
        let mut filter = match filter {
            Some(filter) => filter.into_where()?,
            None => self.filter.clone(),
        };
        self.exclude_deleted(&mut filter, true)?;

        let mut columns = "COUNT(0) AS rowscount".to_string();
        let mut from = self.schema.table().to_string();
        crate::query::joins::apply_joins(joins, &mut columns, &mut from);

        let sql = format!("SELECT {} FROM {}{}", columns, from, filter.render());
        let params = filter.params();
        tracing::debug!("Executing count query: {} ({} params)", sql, params.len());

        conn.execute(&sql, &params).await?;
        let row = conn.fetch_next().await?;
        Ok(row.and_then(|r| r.get("rowscount").and_then(as_count)).unwrap_or(0))
    }

    pub(crate) async fn select(
        &mut self,
        conn: &mut dyn SqlExecutor,
        mut filter: Where,
        order_by: &[(String, OrderDirection)],
        offset: u64,
        limit: u64,
        embed: &Embed,
    ) -> OrmResult<()> {
        let dialect = Dialect::from_driver_name(conn.driver_name());
        self.exclude_deleted(&mut filter, true)?;

        let joins: &[Join] = match embed {
            Embed::Joins(joins) => joins,
            _ => &[],
        };
        let fast_found_rows = limit > 0 && dialect.supports_found_rows();

        let builder = SelectBuilder::new(self.schema.table(), self.select_list())
            .joins(joins)
            .calc_found_rows(fast_found_rows)
            .filter(filter)
            .group_by(&self.group_by)
            .having(self.having.clone())
            .order_by(order_by)
            .limit(limit)
            .offset(offset);
        let (sql, params) = builder.build();

        self.loaded = false;
        tracing::debug!("Executing query: {} ({} params)", sql, params.len());
        conn.execute(&sql, &params).await?;
        let fetched = conn.fetch_all().await?;
        self.rows = fetched.into_iter().map(Row::from_columns).collect();
        self.cursor = 0;

        self.found_rows = if limit == 0 {
            self.rows.len() as u64
        } else if fast_found_rows {
            conn.execute("SELECT FOUND_ROWS() AS found_rows", &[]).await?;
            found_rows_of(conn).await?
        } else {
            let filter = builder.where_clause();
            let sql = format!(
                "SELECT COUNT(0) AS found_rows FROM {}{}",
                builder.from_clause(),
                filter.render()
            );
            tracing::debug!("Executing found rows query: {}", sql);
            conn.execute(&sql, &filter.params()).await?;
            found_rows_of(conn).await?
        };

        if let Embed::Depth(depth) = embed {
            let depth = match self.max_embed_depth {
                Some(max) => (*depth).min(max),
                None => *depth,
            };
            self.resolve_embedded(&mut *conn, depth).await?;
        }

        self.populate_calculated();
        Ok(())
    }

    fn populate_calculated(&mut self) {
        let calculated = self.schema.calculated_columns();
        if calculated.is_empty() {
            return;
        }
        for row in self.rows.iter_mut() {
            for (column, calculate) in calculated {
                let value = calculate(row);
                row.insert(column.as_str(), value);
            }
        }
    }
}

async fn found_rows_of(conn: &mut dyn SqlExecutor) -> OrmResult<u64> {
    let row = conn.fetch_next().await?;
    Ok(row.and_then(|r| r.get("found_rows").and_then(as_count)).unwrap_or(0))
}

/// Counts come back as numbers or numeric strings depending on the driver
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_args_builder() {
        let args = QueryArgs::new()
            .filter(json!({"id": 1}))
            .order_by("name", OrderDirection::Asc)
            .limit(10)
            .offset(5)
            .join(Join::inner("roles", "roles.id = users.role_id"))
            .join(Join::left("teams", "teams.id = users.team_id"));

        assert_eq!(args.limit, 10);
        assert_eq!(args.offset, 5);
        assert!(matches!(&args.embed, Embed::Joins(joins) if joins.len() == 2));
        assert_eq!(args.filter, Some(Filter::Json(json!({"id": 1}))));
    }

    #[test]
    fn test_counts_from_any_representation() {
        assert_eq!(as_count(&json!(12)), Some(12));
        assert_eq!(as_count(&json!("34")), Some(34));
        assert_eq!(as_count(&json!(5.0)), Some(5));
        assert_eq!(as_count(&json!(null)), None);
    }
}
