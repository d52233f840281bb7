//! Embedded relations: related rows fetched with one extra query per
//! relation and spliced into an attribute of each parent row.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::backends::SqlExecutor;
use crate::error::OrmResult;
use crate::model::{Embed, RecordSet, Row, TableSchema};
use crate::query::types::{Operator, OrderDirection};
use crate::query::where_clause::Where;

/// How many related rows end up in the parent attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Array of every match
    List,
    /// The last match, or null
    Single,
}

/// Declares that rows of `schema` whose `found_by` column equals the
/// parent's `column` are embedded under `attr_name`.
#[derive(Debug, Clone)]
pub struct EmbeddedRelation {
    pub attr_name: String,
    pub schema: Arc<TableSchema>,
    pub column: String,
    pub found_by: String,
    pub cardinality: Cardinality,
    pub columns: Option<Vec<String>>,
    pub filter: Option<Where>,
    pub group_by: Vec<String>,
    pub order_by: Vec<(String, OrderDirection)>,
    pub offset: u64,
    pub limit: u64,
    /// Relations of the related rows; the related schema's own when `None`
    pub embedded: Option<Vec<EmbeddedRelation>>,
}

impl EmbeddedRelation {
    pub fn new(
        attr_name: impl Into<String>,
        schema: Arc<TableSchema>,
        column: impl Into<String>,
        found_by: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            attr_name: attr_name.into(),
            schema,
            column: column.into(),
            found_by: found_by.into(),
            cardinality,
            columns: None,
            filter: None,
            group_by: Vec::new(),
            order_by: Vec::new(),
            offset: 0,
            limit: 0,
            embedded: None,
        }
    }

    pub fn list(
        attr_name: impl Into<String>,
        schema: Arc<TableSchema>,
        column: impl Into<String>,
        found_by: impl Into<String>,
    ) -> Self {
        Self::new(attr_name, schema, column, found_by, Cardinality::List)
    }

    pub fn single(
        attr_name: impl Into<String>,
        schema: Arc<TableSchema>,
        column: impl Into<String>,
        found_by: impl Into<String>,
    ) -> Self {
        Self::new(attr_name, schema, column, found_by, Cardinality::Single)
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = columns.into_iter().map(Into::into).collect();
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

    pub fn nested(mut self, relations: Vec<EmbeddedRelation>) -> Self {
        self.embedded = Some(relations);
        self
    }

    fn empty_attribute(&self) -> Value {
        match self.cardinality {
            Cardinality::List => Value::Array(Vec::new()),
            Cardinality::Single => Value::Null,
        }
    }

    /// Record set over the related table, configured from this relation
    fn related_set(&self, parent: &RecordSet) -> RecordSet {
        let mut related = RecordSet::new(self.schema.clone());
        related.abort_on_empty_filter = false;
        related.max_embed_depth = parent.max_embed_depth;
        if let Some(relations) = &self.embedded {
            related.embedded = relations.clone();
        }
        if let Some(columns) = &self.columns {
            related.set_columns(columns);
        }
        if !self.group_by.is_empty() {
            related.group_by(&self.group_by);
        }
        related
    }

    fn related_filter(&self, keys: Vec<Value>) -> OrmResult<Where> {
        let mut filter = Where::new();
        filter.condition_op(self.found_by.as_str(), Operator::In, Value::Array(keys))?;
        if let Some(extra) = &self.filter {
            filter.merge(extra.clone());
        }
        Ok(filter)
    }

    /// Distinct non-null join values of the parent rows
    fn parent_keys(&self, rows: &[Row]) -> Vec<Value> {
        let mut keys: Vec<Value> = Vec::new();
        for value in rows.iter().filter_map(|row| row.get(&self.column)) {
            if !value.is_null() && !keys.iter().any(|k| keys_match(k, value)) {
                keys.push(value.clone());
            }
        }
        keys
    }

    fn splice(&self, parents: &mut [Row], related: &[Row]) {
        for parent in parents.iter_mut() {
            parent.insert(self.attr_name.as_str(), self.empty_attribute());

            let Some(key) = parent.get(&self.column).cloned() else {
                continue;
            };

            for child in related {
                if !child.get(&self.found_by).is_some_and(|v| keys_match(v, &key)) {
                    continue;
                }
                match self.cardinality {
                    Cardinality::List => {
                        if let Some(Value::Array(items)) = parent.get_mut(&self.attr_name) {
                            items.push(child.to_value());
                        }
                    }
                    Cardinality::Single => {
                        parent.insert(self.attr_name.as_str(), child.to_value());
                    }
                }
            }
        }
    }
}

/// Join values compare equal across numeric representations, so `1`,
/// `1.0` and `"1"` all match.
pub(crate) fn keys_match(left: &Value, right: &Value) -> bool {
    if left == right {
        return true;
    }
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        _ => false,
    }
}

impl RecordSet {
    /// Fetch and splice the embedded relations of the current rows.
    ///
    /// Related rows are resolved `depth - 1` levels further down. Depth is
    /// the only bound on recursion.
    pub(crate) fn resolve_embedded<'a>(
        &'a mut self,
        conn: &'a mut dyn SqlExecutor,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = OrmResult<()>> + Send + 'a>> {
        Box::pin(async move {
            if depth == 0 || self.embedded.is_empty() || self.rows.is_empty() {
                return Ok(());
            }

            let relations = self.embedded.clone();
            for relation in &relations {
                let keys = relation.parent_keys(&self.rows);
                tracing::trace!(
                    "Embedding '{}' into '{}' from '{}' ({} keys, depth {})",
                    relation.attr_name,
                    self.schema.table(),
                    relation.schema.table(),
                    keys.len(),
                    depth
                );

                if keys.is_empty() {
                    relation.splice(&mut self.rows, &[]);
                    continue;
                }

                let mut related = relation.related_set(self);
                let filter = relation.related_filter(keys)?;
                related
                    .select(
                        &mut *conn,
                        filter,
                        &relation.order_by,
                        relation.offset,
                        relation.limit,
                        &Embed::Depth(depth - 1),
                    )
                    .await?;

                relation.splice(&mut self.rows, &related.rows);
            }

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Vec<Value>) -> Vec<Row> {
        values
            .into_iter()
            .map(|v| Row::from_columns(v.as_object().cloned().unwrap()))
            .collect()
    }

    fn posts() -> Arc<TableSchema> {
        TableSchema::builder("posts").build().unwrap()
    }

    #[test]
    fn test_keys_match_across_representations() {
        assert!(keys_match(&json!(1), &json!(1)));
        assert!(keys_match(&json!(1), &json!(1.0)));
        assert!(keys_match(&json!("1"), &json!(1)));
        assert!(!keys_match(&json!("a"), &json!(1)));
        assert!(!keys_match(&json!(null), &json!(0)));
    }

    #[test]
    fn test_parent_keys_are_distinct_and_non_null() {
        let relation = EmbeddedRelation::list("posts", posts(), "id", "user_id");
        let parents = rows(vec![
            json!({"id": 1}),
            json!({"id": 2}),
            json!({"id": 1}),
            json!({"id": null}),
            json!({"name": "no id"}),
        ]);
        assert_eq!(relation.parent_keys(&parents), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_list_splice_appends() {
        let relation = EmbeddedRelation::list("posts", posts(), "id", "user_id");
        let mut parents = rows(vec![json!({"id": 1}), json!({"id": 2})]);
        let related = rows(vec![
            json!({"id": 10, "user_id": 1}),
            json!({"id": 11, "user_id": 1}),
        ]);

        relation.splice(&mut parents, &related);

        assert_eq!(
            parents[0].get("posts"),
            Some(&json!([{"id": 10, "user_id": 1}, {"id": 11, "user_id": 1}]))
        );
        assert_eq!(parents[1].get("posts"), Some(&json!([])));
    }

    #[test]
    fn test_single_splice_overwrites() {
        let relation = EmbeddedRelation::single("author", posts(), "author_id", "id");
        let mut parents = rows(vec![json!({"author_id": 5}), json!({"author_id": 6})]);
        let related = rows(vec![json!({"id": 5, "name": "first"}), json!({"id": 5, "name": "second"})]);

        relation.splice(&mut parents, &related);

        assert_eq!(parents[0].get("author"), Some(&json!({"id": 5, "name": "second"})));
        assert_eq!(parents[1].get("author"), Some(&Value::Null));
    }

    #[test]
    fn test_related_filter_merges_extra_conditions() {
        let mut published = Where::new();
        published.condition("published", true).unwrap();
        let relation =
            EmbeddedRelation::list("posts", posts(), "id", "user_id").filter(published);

        let filter = relation.related_filter(vec![json!(1), json!(2)]).unwrap();
        assert_eq!(filter.render(), " WHERE user_id IN (?,?) AND published = ?");
        assert_eq!(filter.params(), vec![json!(1), json!(2), json!(true)]);
    }
}
