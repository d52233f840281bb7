//! Query building blocks: operators, WHERE filters, joins and SELECT assembly

pub mod joins;
pub mod select;
pub mod types;
pub mod where_clause;

pub use joins::Join;
pub use select::SelectBuilder;
pub use types::{JoinType, Operator, OrderDirection};
pub use where_clause::{Filter, Where};
