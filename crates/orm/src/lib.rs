//! # springy-orm: record-set data access
//!
//! Tables are described once with a [`TableSchema`] and accessed through a
//! [`RecordSet`], which holds the rows of the last query, tracks changes to
//! them and writes them back. Filters are built with [`Where`] or given as
//! JSON filter maps. All SQL goes through a [`SqlExecutor`] handed in per
//! call: [`PgExecutor`] for PostgreSQL, [`FakeExecutor`] in tests.

pub mod backends;
pub mod conditions;
pub mod config;
pub mod error;
pub mod fake;
pub mod model;
pub mod query;
pub mod relationships;


pub use backends::{Dialect, PgExecutor, ResultRow, SqlExecutor};
pub use conditions::{Condition, Conditions, Connective};
pub use config::{ConfigError, OrmConfig};
pub use error::{OrmError, OrmResult};
pub use fake::FakeExecutor;
pub use model::{
    Assignment, Embed, QueryArgs, RecordObserver, RecordSet, Row, TableSchema, TableSchemaBuilder,
};
pub use query::{Filter, Join, JoinType, Operator, OrderDirection, Where};
pub use relationships::{Cardinality, EmbeddedRelation};
