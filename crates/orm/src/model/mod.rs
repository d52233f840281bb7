//! Record sets - table rows in memory with change tracking
//!
//! - `schema`: table configuration shared by record sets
//! - `row`: one row and its change tracking
//! - `record_set`: the record set and its row accessors
//! - `cursor`: cursor movement over the rows
//! - `query_methods`: query, load and count
//! - `crud_operations`: save, delete and bulk update
//! - `lifecycle`: before/after observers of writes

pub mod crud_operations;
pub mod cursor;
pub mod lifecycle;
pub mod query_methods;
pub mod record_set;
pub mod row;
pub mod schema;

pub use crud_operations::{Assignment, SqlExpression};
pub use lifecycle::{Lifecycle, RecordObserver};
pub use query_methods::{Embed, QueryArgs};
pub use record_set::RecordSet;
pub use row::Row;
pub use schema::{qualify_column, CalculatedColumn, ColumnHook, TableSchema, TableSchemaBuilder};
