//! Related rows embedded into parent rows

pub mod embedded;

pub use embedded::{Cardinality, EmbeddedRelation};
